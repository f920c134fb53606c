//! HTTP transport port and response classification

pub mod classify;
pub mod ports;

pub use classify::{classify_response, resolve_url};
