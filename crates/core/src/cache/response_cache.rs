//! Response cache
//!
//! Maps `signature(method, url, body)` to the payload of a successful
//! response. Freshness is enforced by the underlying [`TtlCache`]: an entry
//! is never returned once its expiry has passed. Live entries can be
//! snapshotted into a [`StateStore`] and restored on the next start with
//! their original expiry.

use std::sync::{Arc, Weak};
use std::time::Duration;

use courier_common::cache::{CacheStats, TtlCache};
use courier_common::resilience::Clock;
use courier_domain::constants::KEY_CACHE_SNAPSHOT;
use courier_domain::{CourierError, Method, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::storage::ports::StateStore;

/// Deterministic key for a request
///
/// `serde_json` keeps object keys sorted, so logically equal bodies produce
/// the same signature.
pub fn signature(method: Method, url: &str, body: Option<&Value>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hasher.update(b"\n");
    if let Some(body) = body {
        hasher.update(body.to_string().as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Cached payload together with the URL it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub url: String,
    pub body: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry {
    key: String,
    url: String,
    body: Value,
    expires_at_ms: u64,
}

/// TTL cache of response payloads
pub struct ResponseCache {
    entries: TtlCache<String, CachedResponse, Arc<dyn Clock>>,
    default_ttl: Duration,
    store: Option<Arc<dyn StateStore>>,
}

impl ResponseCache {
    pub fn new(default_ttl: Duration, max_entries: Option<usize>, clock: Arc<dyn Clock>) -> Self {
        Self { entries: TtlCache::with_clock(max_entries, clock), default_ttl, store: None }
    }

    /// Persist snapshots to `store`
    pub fn with_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(&key.to_string()).map(|cached| cached.body)
    }

    /// Store a payload for `ttl`, or the default TTL
    pub fn put(&self, key: String, url: &str, body: Value, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        self.entries.insert(key, CachedResponse { url: url.to_string(), body }, ttl);
    }

    /// Drop every entry whose URL lies under `prefix`
    ///
    /// Matches whole path segments: `/cards` covers `/cards`, `/cards/1` and
    /// `/cards?page=2` but not `/cards-archive`.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let removed = self.entries.remove_where(|_, cached| is_under(&cached.url, prefix));
        if removed > 0 {
            debug!(prefix, removed, "invalidated cached responses");
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn sweep(&self) -> usize {
        self.entries.sweep_expired()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.entries.stats()
    }

    /// Save live entries to the state store
    pub async fn persist(&self) -> Result<()> {
        let Some(store) = &self.store else { return Ok(()) };
        let snapshot: Vec<SnapshotEntry> = self
            .entries
            .entries()
            .into_iter()
            .map(|(key, cached, expires_at_ms)| SnapshotEntry {
                key,
                url: cached.url,
                body: cached.body,
                expires_at_ms,
            })
            .collect();
        let encoded = serde_json::to_string(&snapshot)
            .map_err(|e| CourierError::Internal(format!("failed to encode cache snapshot: {e}")))?;
        store.set(KEY_CACHE_SNAPSHOT, &encoded).await
    }

    /// Load the persisted snapshot, skipping entries that already expired
    pub async fn restore(&self) -> Result<usize> {
        let Some(store) = &self.store else { return Ok(0) };
        let Some(encoded) = store.get(KEY_CACHE_SNAPSHOT).await? else { return Ok(0) };

        let snapshot: Vec<SnapshotEntry> = match serde_json::from_str(&encoded) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "discarding unreadable cache snapshot");
                store.remove(KEY_CACHE_SNAPSHOT).await?;
                return Ok(0);
            }
        };

        let now = self.entries.clock().millis_since_epoch();
        let mut restored = 0;
        for entry in snapshot.into_iter().filter(|entry| entry.expires_at_ms > now) {
            self.entries.insert_with_expiry(
                entry.key,
                CachedResponse { url: entry.url, body: entry.body },
                entry.expires_at_ms,
            );
            restored += 1;
        }
        debug!(restored, "restored cached responses");
        Ok(restored)
    }

    /// Remove the persisted snapshot
    pub async fn forget_snapshot(&self) -> Result<()> {
        match &self.store {
            Some(store) => store.remove(KEY_CACHE_SNAPSHOT).await,
            None => Ok(()),
        }
    }

    /// Periodically sweep expired entries and persist the remainder
    ///
    /// The task stops once the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(cache) = cache.upgrade() else { break };
                let swept = cache.sweep();
                if swept > 0 {
                    debug!(swept, "swept expired responses");
                }
                if let Err(e) = cache.persist().await {
                    warn!(error = %e, "failed to persist cache snapshot");
                }
            }
        })
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.entries.len())
            .field("default_ttl", &self.default_ttl)
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

fn is_under(url: &str, prefix: &str) -> bool {
    url.strip_prefix(prefix).is_some_and(|rest| {
        rest.is_empty() || prefix.ends_with('/') || rest.starts_with(['/', '?'])
    })
}

#[cfg(test)]
mod tests {
    use courier_common::resilience::MockClock;
    use serde_json::json;

    use super::*;
    use crate::storage::MemoryStateStore;

    fn cache_with_clock() -> (ResponseCache, MockClock) {
        let clock = MockClock::at_epoch_millis(1_700_000_000_000);
        (ResponseCache::new(Duration::from_secs(60), None, Arc::new(clock.clone())), clock)
    }

    #[test]
    fn test_signature_is_stable_and_discriminating() {
        let a = signature(Method::Get, "https://api.test/cards", None);
        assert_eq!(a, signature(Method::Get, "https://api.test/cards", None));
        assert_ne!(a, signature(Method::Head, "https://api.test/cards", None));
        assert_ne!(
            signature(Method::Post, "https://api.test/cards", Some(&json!({"a": 1}))),
            signature(Method::Post, "https://api.test/cards", Some(&json!({"a": 2})))
        );
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_expiry_and_prefix_invalidation() {
        let (cache, clock) = cache_with_clock();
        cache.put("k1".into(), "https://api.test/cards/1", json!(1), None);
        cache.put("k2".into(), "https://api.test/users/1", json!(2), Some(Duration::from_secs(5)));

        clock.advance(Duration::from_secs(5));
        assert_eq!(cache.get("k2"), None);
        assert_eq!(cache.get("k1"), Some(json!(1)));

        assert_eq!(cache.invalidate_prefix("https://api.test/cards"), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_prefix_invalidation_stops_at_segment_boundary() {
        let (cache, _clock) = cache_with_clock();
        cache.put("list".into(), "https://api.test/cards", json!([]), None);
        cache.put("page".into(), "https://api.test/cards?page=2", json!([]), None);
        cache.put("one".into(), "https://api.test/cards/7", json!({}), None);
        cache.put("archive".into(), "https://api.test/cards-archive", json!([]), None);

        assert_eq!(cache.invalidate_prefix("https://api.test/cards"), 3);
        assert_eq!(cache.get("archive"), Some(json!([])));
        assert_eq!(cache.invalidate_prefix("https://api.test/"), 1);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_drops_expired() {
        let store = Arc::new(MemoryStateStore::new());
        let (cache, clock) = cache_with_clock();
        let cache = cache.with_store(store.clone());
        cache.put("short".into(), "https://api.test/a", json!("a"), Some(Duration::from_secs(1)));
        cache.put("long".into(), "https://api.test/b", json!("b"), Some(Duration::from_secs(30)));
        cache.persist().await.unwrap();

        clock.advance(Duration::from_secs(2));
        let restored = ResponseCache::new(Duration::from_secs(60), None, Arc::new(clock.clone()))
            .with_store(store);
        assert_eq!(restored.restore().await.unwrap(), 1);
        assert_eq!(restored.get("long"), Some(json!("b")));

        clock.advance(Duration::from_secs(28));
        assert_eq!(restored.get("long"), None);
    }

    #[tokio::test]
    async fn test_unreadable_snapshot_is_discarded() {
        let store = Arc::new(MemoryStateStore::with_entries([(KEY_CACHE_SNAPSHOT, "not json")]));
        let (cache, _clock) = cache_with_clock();
        let cache = cache.with_store(store.clone());
        assert_eq!(cache.restore().await.unwrap(), 0);
        assert!(!store.contains(KEY_CACHE_SNAPSHOT));
    }
}
