//! Response cache keyed by request signature

pub mod response_cache;

pub use response_cache::{signature, CachedResponse, ResponseCache};
