//! Classified error taxonomy used throughout Courier
//!
//! Every failure that leaves the request layer is one of these variants, so
//! callers branch on [`ErrorKind`] instead of matching on message strings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// HTTP statuses that are worth retrying with backoff.
pub const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Coarse classification of a [`CourierError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transport or HTTP-level failure
    Network,
    /// Credential rejected (401) or refresh failed
    Auth,
    /// Envelope carried `code != 0`
    Business,
    /// Per-attempt or per-poll budget exhausted
    Timeout,
    /// Explicitly stopped by the caller
    Cancelled,
    /// Invalid or missing configuration
    Config,
    /// Durable storage failure
    Storage,
    /// Broken invariant or malformed data
    Internal,
}

/// Main error type for Courier
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum CourierError {
    #[error("Network error: {message}")]
    Network { message: String, status: Option<u16>, retryable: bool },

    #[error("Authentication error: {message}")]
    Auth { message: String, status: Option<u16> },

    #[error("Business error {code}: {message}")]
    Business { code: i64, message: String },

    #[error("Timeout: {message}")]
    Timeout { message: String },

    #[error("Cancelled: {message}")]
    Cancelled { message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CourierError {
    /// Transport-level failure (connection reset, DNS, TLS); always retryable.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into(), status: None, retryable: true }
    }

    /// Non-2xx HTTP response other than 401.
    ///
    /// Retryability follows [`RETRYABLE_STATUSES`].
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            status: Some(status),
            retryable: RETRYABLE_STATUSES.contains(&status),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth { message: message.into(), status: None }
    }

    /// 401 returned by the server.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Auth { message: message.into(), status: Some(401) }
    }

    pub fn business(code: i64, message: impl Into<String>) -> Self {
        Self::Business { code, message: message.into() }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout { message: message.into() }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled { message: message.into() }
    }

    /// Get the error kind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::Business { .. } => ErrorKind::Business,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Config(_) => ErrorKind::Config,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Human-readable summary without the kind prefix
    pub fn summary(&self) -> &str {
        match self {
            Self::Network { message, .. }
            | Self::Auth { message, .. }
            | Self::Business { message, .. }
            | Self::Timeout { message }
            | Self::Cancelled { message } => message,
            Self::Config(message) | Self::Storage(message) | Self::Internal(message) => message,
        }
    }

    /// HTTP status associated with the failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Network { status, .. } | Self::Auth { status, .. } => *status,
            _ => None,
        }
    }

    /// Envelope `code` for business errors
    pub fn business_code(&self) -> Option<i64> {
        match self {
            Self::Business { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Check if this error should be retried with backoff
    ///
    /// Per-attempt timeouts are retryable; auth errors are recovered through
    /// refresh-and-replay instead and are not retryable here.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { retryable, .. } => *retryable,
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

/// Result type alias for Courier operations
pub type Result<T> = std::result::Result<T, CourierError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_retryability() {
        for status in [408, 429, 500, 502, 503, 504] {
            assert!(CourierError::http_status(status, "x").is_retryable(), "{status}");
        }
        for status in [400, 403, 404, 409, 501] {
            assert!(!CourierError::http_status(status, "x").is_retryable(), "{status}");
        }
    }

    #[test]
    fn test_kinds_and_metadata() {
        let err = CourierError::unauthorized("token expired");
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert_eq!(err.status(), Some(401));
        assert!(!err.is_retryable());

        let err = CourierError::business(4001, "card quota reached");
        assert_eq!(err.kind(), ErrorKind::Business);
        assert_eq!(err.business_code(), Some(4001));
        assert_eq!(err.summary(), "card quota reached");
        assert_eq!(err.to_string(), "Business error 4001: card quota reached");

        assert!(CourierError::network("connection reset").is_retryable());
        assert!(CourierError::timeout("attempt exceeded 10s").is_retryable());
        assert!(!CourierError::cancelled("stopped").is_retryable());
    }

    #[test]
    fn test_serialization_is_tagged() {
        let err = CourierError::Config("missing base url".into());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "Config");
        assert_eq!(json["detail"], "missing base url");

        let back: CourierError = serde_json::from_value(json).unwrap();
        assert_eq!(back, err);
    }
}
