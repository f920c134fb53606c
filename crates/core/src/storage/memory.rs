//! In-process state store

use std::collections::HashMap;

use async_trait::async_trait;
use courier_domain::Result;
use parking_lot::Mutex;

use super::ports::StateStore;

/// State store backed by a map; contents vanish with the process
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate entries, e.g. to simulate state left by a previous run
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { values: Mutex::new(values) }
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.values.lock().clone()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.lock().contains_key(key)
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.lock().remove(key);
        Ok(())
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let mut values = self.values.lock();
        for key in keys {
            values.remove(*key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_and_bulk_remove() {
        let store = MemoryStateStore::with_entries([("a", "1"), ("b", "2"), ("c", "3")]);
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));

        store.set("a", "10").await.unwrap();
        store.remove_many(&["b", "c", "missing"]).await.unwrap();

        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("10"));
        assert!(!store.contains("b"));
        assert!(!store.contains("c"));
    }
}
