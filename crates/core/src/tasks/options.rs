//! Per-task polling options

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use courier_domain::PollingConfig;

/// Invoked with the server-reported progress on every non-terminal tick
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

#[derive(Clone)]
pub struct PollOptions {
    /// Delay between ticks; doubled after a transport failure
    pub interval: Duration,
    /// Non-terminal ticks allowed before the task times out
    pub max_attempts: u32,
    pub on_progress: Option<ProgressCallback>,
}

impl PollOptions {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self { interval, max_attempts, on_progress: None }
    }

    /// Quick jobs: 1s × 30
    pub fn short_job() -> Self {
        Self::new(Duration::from_secs(1), 30)
    }

    /// Generation jobs: 2s × 60
    pub fn long_job() -> Self {
        Self::new(Duration::from_secs(2), 60)
    }

    pub fn with_progress(mut self, callback: impl Fn(f64) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::short_job()
    }
}

impl From<&PollingConfig> for PollOptions {
    fn from(config: &PollingConfig) -> Self {
        Self::new(config.interval(), config.max_attempts)
    }
}

impl fmt::Debug for PollOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollOptions")
            .field("interval", &self.interval)
            .field("max_attempts", &self.max_attempts)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}
