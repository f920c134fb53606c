//! Success cool-down window

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::resilience::{Clock, SystemClock};

/// Remembers when an operation last succeeded
///
/// While the window is active, callers skip the operation and reuse its
/// previous outcome.
#[derive(Debug)]
pub struct Cooldown<C: Clock = SystemClock> {
    window: Duration,
    last_success: Mutex<Option<Instant>>,
    clock: C,
}

impl Cooldown<SystemClock> {
    pub fn new(window: Duration) -> Self {
        Self::with_clock(window, SystemClock)
    }
}

impl<C: Clock> Cooldown<C> {
    pub fn with_clock(window: Duration, clock: C) -> Self {
        Self { window, last_success: Mutex::new(None), clock }
    }

    /// Record a success at the current instant
    pub fn mark(&self) {
        *self.last_success.lock() = Some(self.clock.now());
    }

    pub fn reset(&self) {
        *self.last_success.lock() = None;
    }

    /// True while the last success is younger than the window
    pub fn is_active(&self) -> bool {
        self.remaining().is_some()
    }

    /// Time left in the window, if it is active
    pub fn remaining(&self) -> Option<Duration> {
        let last = (*self.last_success.lock())?;
        let elapsed = self.clock.now().saturating_duration_since(last);
        (elapsed < self.window).then(|| self.window - elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::MockClock;

    #[test]
    fn test_window_lifecycle() {
        let clock = MockClock::new();
        let cooldown = Cooldown::with_clock(Duration::from_secs(10), clock.clone());
        assert!(!cooldown.is_active());

        cooldown.mark();
        assert!(cooldown.is_active());
        clock.advance(Duration::from_secs(4));
        assert_eq!(cooldown.remaining(), Some(Duration::from_secs(6)));

        clock.advance(Duration::from_secs(6));
        assert!(!cooldown.is_active());
    }

    #[test]
    fn test_reset_clears_window() {
        let cooldown = Cooldown::new(Duration::from_secs(60));
        cooldown.mark();
        cooldown.reset();
        assert!(!cooldown.is_active());
    }
}
