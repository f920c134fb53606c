//! Tracing subscriber setup
//!
//! The library itself only emits `tracing` events; applications call
//! [`init_tracing`] once at startup to install a subscriber. `RUST_LOG`
//! takes precedence over the configured level.

use courier_domain::{CourierError, LoggingConfig, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter from `RUST_LOG`, falling back to `config.level`
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            CourierError::Config(format!("invalid log filter '{}': {e}", config.level))
        }),
    }
}

/// Install the global subscriber, as JSON lines or human-readable text
///
/// # Errors
/// Fails if the filter is invalid or a global subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json {
        registry.with(fmt::layer().json().with_current_span(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    installed.map_err(|e| CourierError::Internal(format!("tracing already initialised: {e}")))?;
    tracing::debug!(level = %config.level, json = config.json, "tracing initialised");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_rejects_garbage_level() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LoggingConfig { level: "courier=notalevel".to_string(), json: false };
        assert!(matches!(build_filter(&config), Err(CourierError::Config(_))));
    }

    #[test]
    fn test_second_init_fails() {
        let config = LoggingConfig { level: "debug".to_string(), json: true };
        // Another test binary thread may already have installed one.
        let _ = init_tracing(&config);
        assert!(init_tracing(&config).is_err());
    }
}
