//! Port interface for the HTTP transport
//!
//! Both `RequestClient` and `AuthCoordinator` send through this trait, which
//! keeps them independent of each other and of any concrete HTTP stack.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use courier_domain::{CourierError, Method};
use thiserror::Error;

/// One wire-level HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute URL
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
    /// Hard limit for this attempt
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>, timeout: Duration) -> Self {
        Self { method, url: url.into(), headers: BTreeMap::new(), body: None, timeout }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Serialize `body` as the JSON payload
    pub fn json(mut self, body: &serde_json::Value) -> Result<Self, CourierError> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| CourierError::Internal(format!("failed to encode request body: {e}")))?;
        self.body = Some(bytes);
        Ok(self)
    }
}

/// One wire-level HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, headers: BTreeMap::new(), body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as lossy UTF-8, for diagnostics
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Failure below HTTP: nothing usable came back
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport failure: {0}")]
    Other(String),
}

impl From<TransportError> for CourierError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(_) => CourierError::timeout(err.to_string()),
            TransportError::Connect(_) | TransportError::Other(_) => {
                CourierError::network(err.to_string())
            }
        }
    }
}

/// Sends HTTP requests
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform exactly one network call
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use courier_domain::ErrorKind;

    use super::*;

    #[test]
    fn test_transport_errors_classify_as_retryable() {
        let timeout: CourierError = TransportError::Timeout(Duration::from_secs(10)).into();
        assert_eq!(timeout.kind(), ErrorKind::Timeout);
        assert!(timeout.is_retryable());

        let reset: CourierError = TransportError::Connect("connection reset".into()).into();
        assert_eq!(reset.kind(), ErrorKind::Network);
        assert!(reset.is_retryable());
        assert_eq!(reset.status(), None);
    }
}
