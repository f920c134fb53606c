//! Integration tests for configuration loading
//!
//! Exercises file loading end to end and the environment-first strategy of
//! `config::load`.

use std::io::Write;
use std::sync::Mutex;

use courier_domain::{CourierError, StorageBackend};
use courier_infra::config;
use once_cell::sync::Lazy;
use tempfile::NamedTempFile;

static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn temp_config(contents: &str, extension: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(&format!(".{extension}"))
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(contents.as_bytes()).expect("Failed to write to temp file");
    file
}

#[test]
fn test_load_config_from_toml_file() {
    let file = temp_config(
        r#"
[api]
base_url = "https://api.example.com/v2"
timeout_ms = 5000
max_concurrent = 8

[retry]
max_retries = 5
base_delay_ms = 250

[storage]
backend = "file"
path = "/var/lib/courier/state.json"

[logging]
level = "courier=debug"
json = true
"#,
        "toml",
    );

    let config = config::load_from_file(Some(file.path().to_path_buf()))
        .expect("Failed to load config from TOML file");

    assert_eq!(config.api.base_url, "https://api.example.com/v2");
    assert_eq!(config.api.max_concurrent, 8);
    assert_eq!(config.retry.max_retries, 5);
    assert_eq!(config.retry.base_delay_ms, 250);
    assert_eq!(config.storage.backend, StorageBackend::File);
    assert!(config.logging.json);
    assert!(config.validate().is_ok());
}

#[test]
fn test_load_config_from_json_file_keeps_defaults() {
    let file = temp_config(
        r#"{
            "api": {"base_url": "https://api.example.com"},
            "polling": {"interval_ms": 2000, "max_attempts": 60}
        }"#,
        "json",
    );

    let config = config::load_from_file(Some(file.path().to_path_buf()))
        .expect("Failed to load config from JSON file");

    assert_eq!(config.polling.interval_ms, 2000);
    assert_eq!(config.polling.max_attempts, 60);
    assert!(config.cache.enabled, "unspecified sections fall back to defaults");
    assert_eq!(config.storage.backend, StorageBackend::Memory);
}

#[test]
fn test_malformed_file_is_a_config_error() {
    let file = temp_config("[api\nbase_url = ", "toml");
    let err = config::load_from_file(Some(file.path().to_path_buf())).unwrap_err();
    assert!(matches!(err, CourierError::Config(_)));
    assert!(err.summary().contains("TOML"));
}

#[test]
fn test_load_prefers_environment_and_validates() {
    let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

    std::env::set_var("COURIER_API_BASE_URL", "https://env.example.com");
    std::env::set_var("COURIER_MAX_CONCURRENT", "2");
    let config = config::load().expect("environment config should load");
    assert_eq!(config.api.base_url, "https://env.example.com");
    assert_eq!(config.api.max_concurrent, 2);

    std::env::set_var("COURIER_STORAGE_BACKEND", "file");
    let err = config::load().unwrap_err();
    assert!(err.summary().contains("storage.path"));

    std::env::set_var("COURIER_MAX_CONCURRENT", "0");
    std::env::remove_var("COURIER_STORAGE_BACKEND");
    assert!(matches!(config::load(), Err(CourierError::Config(_))));

    std::env::remove_var("COURIER_API_BASE_URL");
    std::env::remove_var("COURIER_MAX_CONCURRENT");
}
