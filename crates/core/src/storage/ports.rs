//! Port interface for durable local state
//!
//! Values are opaque strings; callers serialize structured values to JSON.

use async_trait::async_trait;
use courier_domain::Result;

/// String key/value store that survives process restarts
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removing an absent key is not an error
    async fn remove(&self, key: &str) -> Result<()>;

    /// Remove several keys as one operation
    ///
    /// Adapters that can commit atomically override this; the default removes
    /// keys one at a time.
    async fn remove_many(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.remove(key).await?;
        }
        Ok(())
    }
}
