//! JSON-file state store
//!
//! The whole key space lives in one JSON object. Every mutation rewrites the
//! document to a sibling temp file and renames it over the original, so a
//! crash mid-write leaves the previous document intact.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use courier_core::StateStore;
use courier_domain::Result;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::errors::InfraError;

/// [`StateStore`] persisted as a single JSON document
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    // Held across the write so commits never interleave.
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStateStore {
    /// Open the document at `path`, creating parent directories as needed
    ///
    /// A missing file starts an empty store. An unreadable document is logged
    /// and replaced on the next write.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(InfraError::from)?;
        }

        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "state document is corrupt; starting empty");
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(InfraError::from(err).into()),
        };

        debug!(path = %path.display(), keys = entries.len(), "state store opened");
        Ok(Self { path, entries: Mutex::new(entries) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn commit(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let document = serde_json::to_vec_pretty(entries).map_err(InfraError::from)?;
        let staging = self.path.with_extension("tmp");
        tokio::fs::write(&staging, document).await.map_err(InfraError::from)?;
        tokio::fs::rename(&staging, &self.path).await.map_err(InfraError::from)?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.commit(&next).await?;
        *entries = next;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.remove_many(&[key]).await
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if !keys.iter().any(|key| entries.contains_key(*key)) {
            return Ok(());
        }
        let mut next = entries.clone();
        for key in keys {
            next.remove(*key);
        }
        self.commit(&next).await?;
        *entries = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let store = FileStateStore::open(&path).await.unwrap();
        store.set("courier.auth.access_token", "at-1").await.unwrap();
        store.set("courier.auth.user_id", "u-1").await.unwrap();
        drop(store);

        let reopened = FileStateStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.get("courier.auth.access_token").await.unwrap().as_deref(),
            Some("at-1")
        );
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_remove_many_commits_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = FileStateStore::open(&path).await.unwrap();
        store.set("a", "1").await.unwrap();
        store.set("b", "2").await.unwrap();
        store.set("c", "3").await.unwrap();

        store.remove_many(&["a", "b", "missing"]).await.unwrap();

        let on_disk: BTreeMap<String, String> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk.keys().collect::<Vec<_>>(), vec!["c"]);
    }

    #[tokio::test]
    async fn test_removing_absent_key_is_ok() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::open(dir.path().join("state.json")).await.unwrap();
        store.remove("never-set").await.unwrap();
        assert_eq!(store.get("never-set").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_document_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = FileStateStore::open(&path).await.unwrap();
        assert_eq!(store.get("anything").await.unwrap(), None);

        store.set("k", "v").await.unwrap();
        let reopened = FileStateStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
