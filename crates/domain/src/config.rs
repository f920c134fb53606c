//! Configuration structures
//!
//! Every section has defaults, so a config file only needs the keys it wants
//! to change. Durations are stored as integer seconds or milliseconds with the
//! unit in the field name and exposed as [`Duration`] through accessors.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CACHE_TTL_SECS, DEFAULT_LOGIN_COOLDOWN_SECS, DEFAULT_MAX_CONCURRENT,
    DEFAULT_MAX_RETRIES, DEFAULT_REFRESH_COOLDOWN_SECS, DEFAULT_REFRESH_WINDOW_SECS,
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_RETRY_BASE_DELAY_MS, HEADER_LEGACY_USER_ID, PATH_HEALTH,
};
use crate::errors::{CourierError, Result};

/// Root configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub auth: AuthConfig,
    pub polling: PollingConfig,
    pub network: NetworkConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values that would make the client unusable
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(CourierError::Config("api.base_url must not be empty".into()));
        }
        if self.api.max_concurrent == 0 {
            return Err(CourierError::Config("api.max_concurrent must be at least 1".into()));
        }
        if self.api.timeout_ms == 0 {
            return Err(CourierError::Config("api.timeout_ms must be positive".into()));
        }
        if self.polling.interval_ms == 0 || self.polling.max_attempts == 0 {
            return Err(CourierError::Config(
                "polling.interval_ms and polling.max_attempts must be positive".into(),
            ));
        }
        if self.storage.backend == StorageBackend::File && self.storage.path.is_none() {
            return Err(CourierError::Config("storage.path is required for the file backend".into()));
        }
        Ok(())
    }
}

/// Remote API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Hard per-attempt timeout
    pub timeout_ms: u64,
    pub max_concurrent: usize,
    pub client_version: String,
    pub user_agent: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            user_agent: None,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Retry policy for retryable failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: DEFAULT_MAX_RETRIES, base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// Response cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub default_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub max_entries: usize,
    /// Save live entries to durable storage on sweep and restore at start
    pub persist: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            sweep_interval_secs: 60,
            max_entries: 512,
            persist: true,
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// Token lifecycle settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Refresh proactively when the token expires within this window
    pub refresh_window_secs: u64,
    /// At most one refresh per cool-down window
    pub refresh_cooldown_secs: u64,
    /// Repeated logins inside this window return the last identity
    pub login_cooldown_secs: u64,
    /// Period of the proactive refresh check
    pub check_interval_secs: u64,
    /// Header carrying the stable identity in legacy mode
    pub legacy_identity_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_window_secs: DEFAULT_REFRESH_WINDOW_SECS,
            refresh_cooldown_secs: DEFAULT_REFRESH_COOLDOWN_SECS,
            login_cooldown_secs: DEFAULT_LOGIN_COOLDOWN_SECS,
            check_interval_secs: 60,
            legacy_identity_header: HEADER_LEGACY_USER_ID.to_string(),
        }
    }
}

impl AuthConfig {
    pub fn refresh_window(&self) -> Duration {
        Duration::from_secs(self.refresh_window_secs)
    }

    pub fn refresh_cooldown(&self) -> Duration {
        Duration::from_secs(self.refresh_cooldown_secs)
    }

    pub fn login_cooldown(&self) -> Duration {
        Duration::from_secs(self.login_cooldown_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }
}

/// Default job polling cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_ms: 1_000, max_attempts: 30 }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Connectivity probe settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub probe_enabled: bool,
    /// Absolute URL or path relative to `api.base_url`
    pub probe_path: String,
    pub probe_interval_secs: u64,
    pub probe_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe_enabled: true,
            probe_path: PATH_HEALTH.to_string(),
            probe_interval_secs: 15,
            probe_timeout_ms: 3_000,
        }
    }
}

impl NetworkConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Where durable state lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    File,
    Keychain,
}

crate::impl_status_conversions!(StorageBackend {
    Memory => "memory",
    File => "file",
    Keychain => "keychain",
});

/// Durable storage settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// File path for the file backend
    pub path: Option<String>,
    /// Keychain service name for the keychain backend
    pub service_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { backend: StorageBackend::Memory, path: None, service_name: "courier".to_string() }
    }
}

/// Tracing subscriber settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}
