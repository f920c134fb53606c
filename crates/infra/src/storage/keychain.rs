//! OS keychain state store
//!
//! Each key maps to one keychain entry under the configured service name.
//! Keychain calls block, so they run on the blocking pool.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use courier_core::StateStore;
use courier_domain::{CourierError, Result};
use keyring::Entry;
use parking_lot::Mutex;
use tracing::debug;

use crate::errors::InfraError;

/// [`StateStore`] backed by the platform credential store
pub struct KeychainStateStore {
    service: String,
    entries: Mutex<HashMap<String, Arc<Entry>>>,
}

impl KeychainStateStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self { service: service.into(), entries: Mutex::default() }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, key: &str) -> Result<Arc<Entry>> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(key) {
            return Ok(Arc::clone(entry));
        }
        let entry = Arc::new(Entry::new(&self.service, key).map_err(InfraError::from)?);
        entries.insert(key.to_string(), Arc::clone(&entry));
        Ok(entry)
    }

    async fn blocking<T, F>(&self, key: &str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Entry) -> Result<T> + Send + 'static,
    {
        let entry = self.entry(key)?;
        tokio::task::spawn_blocking(move || op(&entry))
            .await
            .map_err(|e| CourierError::Internal(format!("keychain task failed: {e}")))?
    }
}

impl std::fmt::Debug for KeychainStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeychainStateStore").field("service", &self.service).finish()
    }
}

#[async_trait]
impl StateStore for KeychainStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.blocking(key, |entry| match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(InfraError::from(err).into()),
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let value = value.to_string();
        self.blocking(key, move |entry| {
            entry.set_password(&value).map_err(|e| InfraError::from(e).into())
        })
        .await?;
        debug!(service = %self.service, key, "keychain entry written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.blocking(key, |entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(InfraError::from(err).into()),
        })
        .await
    }
}
