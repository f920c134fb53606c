//! Exponential backoff schedule
//!
//! Delay before retry `n` (zero-based) is `base * 2^n`, so a 100ms base
//! yields 100ms, 200ms, 400ms. The retry count, not a delay cap, bounds the
//! schedule.

use std::time::Duration;

/// Backoff configuration for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    base: Duration,
    max_retries: u32,
}

impl ExponentialBackoff {
    pub const fn new(base: Duration, max_retries: u32) -> Self {
        Self { base, max_retries }
    }

    /// A schedule that never retries
    pub const fn none() -> Self {
        Self { base: Duration::ZERO, max_retries: 0 }
    }

    pub const fn base(&self) -> Duration {
        self.base
    }

    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Whether another retry is allowed after `retries_done` retries
    pub const fn should_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }

    /// Delay before the retry numbered `retry` (zero-based), saturating
    pub fn delay_for(&self, retry: u32) -> Duration {
        let Some(factor) = 2u32.checked_pow(retry) else {
            return Duration::MAX;
        };
        self.base.checked_mul(factor).unwrap_or(Duration::MAX)
    }

    /// Iterate over every delay in the schedule
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries).map(move |retry| self.delay_for(retry))
    }
}
