//! Async coordination primitives
//!
//! - [`SingleFlight`]: concurrent callers share one in-flight operation
//! - [`Cooldown`]: suppresses repeats of an operation that recently succeeded

pub mod cooldown;
pub mod single_flight;

pub use cooldown::Cooldown;
pub use single_flight::{FlightFuture, SingleFlight};
