//! Configuration loader
//!
//! Loads client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file into the environment, if one exists
//! 2. If `COURIER_API_BASE_URL` is set, builds the config from environment
//!    variables on top of the defaults
//! 3. Otherwise probes well-known paths for a config file
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `COURIER_API_BASE_URL`: API base URL (required for env loading)
//! - `COURIER_API_TIMEOUT_MS`: Per-attempt timeout in milliseconds
//! - `COURIER_MAX_CONCURRENT`: Concurrent request limit
//! - `COURIER_MAX_RETRIES`: Retries for retryable failures
//! - `COURIER_RETRY_BASE_DELAY_MS`: First backoff delay in milliseconds
//! - `COURIER_CACHE_ENABLED`: Whether the response cache is on (true/false)
//! - `COURIER_CACHE_TTL_SECS`: Default cache TTL in seconds
//! - `COURIER_POLL_INTERVAL_MS`: Default job polling interval
//! - `COURIER_POLL_MAX_ATTEMPTS`: Default job polling attempt budget
//! - `COURIER_PROBE_ENABLED`: Whether the health probe runs (true/false)
//! - `COURIER_STORAGE_BACKEND`: `memory`, `file` or `keychain`
//! - `COURIER_STORAGE_PATH`: State file for the file backend
//! - `COURIER_LOG_LEVEL`: Default tracing filter
//! - `COURIER_LOG_JSON`: Emit JSON logs (true/false)
//!
//! ## File Locations
//! The loader probes `courier.{toml,json}` and `config.{toml,json}` in the
//! current directory, its two parents and the executable's directory.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use courier_domain::{Config, CourierError, Result, StorageBackend};

const FILE_NAMES: [&str; 4] = ["courier.toml", "courier.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `CourierError::Config` if no source is available, a source is
/// malformed, or the result fails validation.
pub fn load() -> Result<Config> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "loaded .env file");
    }

    let config = if std::env::var_os("COURIER_API_BASE_URL").is_some() {
        let config = load_from_env()?;
        tracing::info!("Configuration loaded from environment variables");
        config
    } else {
        tracing::debug!("COURIER_API_BASE_URL not set, trying config file");
        load_from_file(None)?
    };

    config.validate()?;
    Ok(config)
}

/// Load configuration from environment variables
///
/// `COURIER_API_BASE_URL` is required; every other variable overrides the
/// corresponding default when present.
///
/// # Errors
/// Returns `CourierError::Config` if the base URL is missing or a variable
/// has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();
    config.api.base_url = env_var("COURIER_API_BASE_URL")?;

    if let Some(timeout) = env_parse("COURIER_API_TIMEOUT_MS")? {
        config.api.timeout_ms = timeout;
    }
    if let Some(max) = env_parse("COURIER_MAX_CONCURRENT")? {
        config.api.max_concurrent = max;
    }
    if let Some(retries) = env_parse("COURIER_MAX_RETRIES")? {
        config.retry.max_retries = retries;
    }
    if let Some(delay) = env_parse("COURIER_RETRY_BASE_DELAY_MS")? {
        config.retry.base_delay_ms = delay;
    }
    config.cache.enabled = env_bool("COURIER_CACHE_ENABLED", config.cache.enabled);
    if let Some(ttl) = env_parse("COURIER_CACHE_TTL_SECS")? {
        config.cache.default_ttl_secs = ttl;
    }
    if let Some(interval) = env_parse("COURIER_POLL_INTERVAL_MS")? {
        config.polling.interval_ms = interval;
    }
    if let Some(attempts) = env_parse("COURIER_POLL_MAX_ATTEMPTS")? {
        config.polling.max_attempts = attempts;
    }
    config.network.probe_enabled = env_bool("COURIER_PROBE_ENABLED", config.network.probe_enabled);
    if let Some(backend) = env_parse::<StorageBackend>("COURIER_STORAGE_BACKEND")? {
        config.storage.backend = backend;
    }
    if let Ok(path) = std::env::var("COURIER_STORAGE_PATH") {
        config.storage.path = Some(path);
    }
    if let Ok(level) = std::env::var("COURIER_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("COURIER_LOG_JSON", config.logging.json);

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations (see
/// [`probe_config_paths`]). Format is chosen by extension.
///
/// # Errors
/// Returns `CourierError::Config` if the file is missing, unreadable or
/// malformed.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CourierError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CourierError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CourierError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration text; format is detected by extension
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CourierError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CourierError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(CourierError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing config file among the standard locations
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }
    if let Some(exe_dir) =
        std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir);
    }

    dirs.iter()
        .flat_map(|dir| FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        CourierError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Parse an optional environment variable
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| CourierError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
