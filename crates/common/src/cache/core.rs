//! Core TTL cache implementation

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::time::Duration;

use parking_lot::Mutex;

use super::stats::{CacheStats, MetricsCollector};
use crate::resilience::{Clock, SystemClock};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at_ms: u64,
}

#[derive(Debug)]
struct CacheStorage<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    /// Insertion order, oldest first, for FIFO eviction
    order: VecDeque<K>,
}

impl<K: Eq + Hash + Clone, V> CacheStorage<K, V> {
    fn new() -> Self {
        Self { entries: HashMap::new(), order: VecDeque::new() }
    }

    fn remove(&mut self, key: &K) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        Some(entry)
    }
}

/// Thread-safe cache where every entry has its own time-to-live
///
/// An entry is live while `now < expires_at`. Reads never return an expired
/// value.
///
/// # Example
/// ```
/// use std::time::Duration;
///
/// use courier_common::cache::TtlCache;
///
/// let cache: TtlCache<String, i32> = TtlCache::new(None);
/// cache.insert("key".to_string(), 42, Duration::from_secs(60));
/// assert_eq!(cache.get(&"key".to_string()), Some(42));
/// ```
pub struct TtlCache<K, V, C = SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    storage: Mutex<CacheStorage<K, V>>,
    max_entries: Option<usize>,
    metrics: MetricsCollector,
    clock: C,
}

impl<K, V> TtlCache<K, V, SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache using the system clock
    pub fn new(max_entries: Option<usize>) -> Self {
        Self::with_clock(max_entries, SystemClock)
    }
}

impl<K, V, C> TtlCache<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    /// Create a cache with a custom clock (useful for testing)
    pub fn with_clock(max_entries: Option<usize>, clock: C) -> Self {
        Self {
            storage: Mutex::new(CacheStorage::new()),
            max_entries,
            metrics: MetricsCollector::default(),
            clock,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Insert a value that expires `ttl` from now
    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let expires_at_ms = self.clock.millis_since_epoch().saturating_add(ttl_ms);
        self.insert_with_expiry(key, value, expires_at_ms);
    }

    /// Insert a value with an absolute expiry (epoch milliseconds)
    ///
    /// Used when restoring a persisted snapshot, where the original expiry
    /// must be kept rather than restarted.
    pub fn insert_with_expiry(&self, key: K, value: V, expires_at_ms: u64) {
        let mut storage = self.storage.lock();

        if storage.remove(&key).is_none() {
            if let Some(max) = self.max_entries {
                while storage.entries.len() >= max {
                    let Some(oldest) = storage.order.pop_front() else { break };
                    storage.entries.remove(&oldest);
                    self.metrics.record_eviction();
                }
            }
        }

        storage.entries.insert(key.clone(), CacheEntry { value, expires_at_ms });
        storage.order.push_back(key);
        self.metrics.record_insert();
    }

    /// Get a live value, dropping the entry if it has expired
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.millis_since_epoch();
        let mut storage = self.storage.lock();

        let expired = match storage.entries.get(key) {
            None => {
                self.metrics.record_miss();
                return None;
            }
            Some(entry) => now >= entry.expires_at_ms,
        };

        if expired {
            storage.remove(key);
            self.metrics.record_expirations(1);
            self.metrics.record_miss();
            return None;
        }

        self.metrics.record_hit();
        storage.entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn contains_key(&self, key: &K) -> bool {
        let now = self.clock.millis_since_epoch();
        self.storage.lock().entries.get(key).is_some_and(|entry| now < entry.expires_at_ms)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.storage.lock().remove(key).map(|entry| entry.value)
    }

    /// Remove every entry matching `predicate`, returning how many went
    pub fn remove_where<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut storage = self.storage.lock();
        let doomed: Vec<K> = storage
            .entries
            .iter()
            .filter(|(key, entry)| predicate(key, &entry.value))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            storage.remove(key);
        }
        doomed.len()
    }

    /// Drop every expired entry, returning how many were removed
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.millis_since_epoch();
        let mut storage = self.storage.lock();
        let before = storage.entries.len();
        storage.entries.retain(|_, entry| now < entry.expires_at_ms);
        let removed = before - storage.entries.len();
        if removed > 0 {
            let CacheStorage { entries, order } = &mut *storage;
            order.retain(|key| entries.contains_key(key));
            self.metrics.record_expirations(removed as u64);
        }
        removed
    }

    /// Live entries with their absolute expiry, oldest insertion first
    pub fn entries(&self) -> Vec<(K, V, u64)> {
        let now = self.clock.millis_since_epoch();
        let storage = self.storage.lock();
        storage
            .order
            .iter()
            .filter_map(|key| {
                let entry = storage.entries.get(key)?;
                (now < entry.expires_at_ms).then(|| {
                    (key.clone(), entry.value.clone(), entry.expires_at_ms)
                })
            })
            .collect()
    }

    pub fn clear(&self) {
        let mut storage = self.storage.lock();
        storage.entries.clear();
        storage.order.clear();
    }

    pub fn len(&self) -> usize {
        self.storage.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.len(), self.max_entries)
    }

    pub fn reset_stats(&self) {
        self.metrics.reset();
    }
}
