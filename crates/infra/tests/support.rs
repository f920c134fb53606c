//! Shared helpers for `courier-infra` integration tests.

#![allow(dead_code)]

use std::path::Path;

use courier_core::StateStore;
use courier_domain::constants::{
    KEY_ACCESS_TOKEN, KEY_EXPIRES_AT, KEY_REFRESH_TOKEN, KEY_USER_INFO,
};
use courier_domain::{Config, StorageBackend};
use courier_infra::FileStateStore;
use serde_json::{json, Value};
use wiremock::{MockServer, ResponseTemplate};

/// Far enough ahead that no refresh is attempted during a test
pub const FAR_FUTURE_MS: i64 = 4_102_444_800_000;

/// Config pointed at `server` with a file-backed store at `state_path`
pub fn config(server: &MockServer, state_path: &Path) -> Config {
    let mut config = Config::default();
    config.api.base_url = server.uri();
    config.api.timeout_ms = 2_000;
    config.retry.base_delay_ms = 10;
    config.network.probe_enabled = false;
    config.storage.backend = StorageBackend::File;
    config.storage.path = Some(state_path.display().to_string());
    config
}

/// 200 carrying a success envelope around `data`
pub fn envelope(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"code": 0, "message": "ok", "data": data}))
}

/// Write a signed-in session into the state file at `path`
pub async fn seed_session(path: &Path, access_token: &str) {
    let store = FileStateStore::open(path).await.expect("state store should open");
    store.set(KEY_ACCESS_TOKEN, access_token).await.expect("seed access token");
    store.set(KEY_REFRESH_TOKEN, "rt-1").await.expect("seed refresh token");
    store.set(KEY_EXPIRES_AT, &FAR_FUTURE_MS.to_string()).await.expect("seed expiry");
    store.set(KEY_USER_INFO, r#"{"userId":"u-1"}"#).await.expect("seed user info");
}

/// Read one key straight from the state file
pub async fn stored_value(path: &Path, key: &str) -> Option<String> {
    let store = FileStateStore::open(path).await.expect("state store should open");
    store.get(key).await.expect("state store read")
}
