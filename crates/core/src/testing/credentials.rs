//! Credential source double

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use courier_domain::{CourierError, LoginCredential, Result};
use serde_json::Value;

use crate::auth::ports::CredentialSource;

/// Hands out the same login code every time
#[derive(Debug)]
pub struct StaticCredentialSource {
    code: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticCredentialSource {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: Some(code.into()), delay: None, calls: AtomicUsize::new(0) }
    }

    /// A source whose platform login step always fails
    pub fn failing() -> Self {
        Self { code: None, delay: None, calls: AtomicUsize::new(0) }
    }

    /// Sleep before answering, to widen race windows in tests
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialSource for StaticCredentialSource {
    async fn obtain(&self) -> Result<LoginCredential> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.code {
            Some(code) => Ok(LoginCredential { code: code.clone(), profile: Value::Null }),
            None => Err(CourierError::auth("platform login declined")),
        }
    }
}
