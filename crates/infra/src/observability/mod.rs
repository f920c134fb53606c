//! Observability wiring for embedding applications

pub mod logging;

pub use logging::{build_filter, init_tracing};
