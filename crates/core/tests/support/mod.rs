//! Shared helpers for `courier-core` integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use courier_common::resilience::MockClock;
use courier_core::testing::{MemoryStateStore, ScriptedTransport};
use courier_core::{AuthCoordinator, NetworkMonitor, RequestClient, ResponseCache};
use courier_domain::constants::{KEY_ACCESS_TOKEN, KEY_EXPIRES_AT, KEY_REFRESH_TOKEN, KEY_USER_INFO};
use courier_domain::{Config, NetworkStatus};

pub const BASE_URL: &str = "https://api.test";

/// Config pointed at the scripted backend with short retry delays
pub fn config() -> Config {
    let mut config = Config::default();
    config.api.base_url = BASE_URL.to_string();
    config.retry.max_retries = 3;
    config.retry.base_delay_ms = 100;
    config
}

/// Store holding a signed-in session that expires at `expires_at_ms`
pub fn signed_in_store(expires_at_ms: i64) -> Arc<MemoryStateStore> {
    Arc::new(MemoryStateStore::with_entries([
        (KEY_ACCESS_TOKEN, "at-1".to_string()),
        (KEY_REFRESH_TOKEN, "rt-1".to_string()),
        (KEY_EXPIRES_AT, expires_at_ms.to_string()),
        (KEY_USER_INFO, r#"{"userId":"u-1"}"#.to_string()),
    ]))
}

/// Fully wired client over a scripted transport
pub struct Harness {
    pub transport: Arc<ScriptedTransport>,
    pub store: Arc<MemoryStateStore>,
    pub clock: MockClock,
    pub auth: AuthCoordinator,
    pub cache: Arc<ResponseCache>,
    pub monitor: NetworkMonitor,
    pub client: Arc<RequestClient>,
}

pub struct HarnessBuilder {
    config: Config,
    store: Arc<MemoryStateStore>,
    status: NetworkStatus,
}

impl HarnessBuilder {
    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.config.api.max_concurrent = max_concurrent;
        self
    }

    pub fn store(mut self, store: Arc<MemoryStateStore>) -> Self {
        self.store = store;
        self
    }

    pub fn offline(mut self) -> Self {
        self.status = NetworkStatus::Offline;
        self
    }

    pub fn build(self) -> Harness {
        let transport = Arc::new(ScriptedTransport::new());
        let clock = MockClock::new();
        let monitor = NetworkMonitor::new(self.status);
        let auth = AuthCoordinator::builder(transport.clone(), self.store.clone())
            .config(&self.config)
            .clock(Arc::new(clock.clone()))
            .monitor(monitor.clone())
            .build();
        let cache = Arc::new(ResponseCache::new(
            Duration::from_secs(60),
            Some(128),
            Arc::new(clock.clone()),
        ));
        let client = Arc::new(
            RequestClient::builder(transport.clone())
                .config(&self.config)
                .auth(auth.clone())
                .cache(cache.clone())
                .monitor(monitor.clone())
                .build(),
        );
        Harness { transport, store: self.store, clock, auth, cache, monitor, client }
    }
}

pub fn harness() -> HarnessBuilder {
    HarnessBuilder {
        config: config(),
        store: Arc::new(MemoryStateStore::new()),
        status: NetworkStatus::Online,
    }
}
