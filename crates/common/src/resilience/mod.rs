//! Time and retry primitives
//!
//! - **Clock**: wall and monotonic time behind a trait so tests can drive
//!   expiry, cool-downs and token lifetimes with [`MockClock`]
//! - **Backoff**: exponential delay schedule for retryable failures

pub mod backoff;
pub mod clock;

pub use backoff::ExponentialBackoff;
pub use clock::{Clock, MockClock, SystemClock};
