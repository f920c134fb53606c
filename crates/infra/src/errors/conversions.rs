//! Conversions from external infrastructure errors into domain errors.
//!
//! Adapters convert library errors through [`InfraError`] so that the mapping
//! lives in one place and the domain crate stays free of I/O dependencies.

use courier_domain::CourierError;
use keyring::Error as KeyringError;
use reqwest::Error as HttpError;
use thiserror::Error;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct InfraError(#[from] pub CourierError);

impl From<InfraError> for CourierError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

trait IntoCourierError {
    fn into_courier(self) -> CourierError;
}

/* -------------------------------------------------------------------------- */
/* keyring::Error → CourierError */
/* -------------------------------------------------------------------------- */

impl IntoCourierError for KeyringError {
    fn into_courier(self) -> CourierError {
        use KeyringError::{Ambiguous, BadEncoding, Invalid, NoStorageAccess, PlatformFailure, TooLong};

        let description = self.to_string();

        match self {
            BadEncoding(_) => CourierError::Storage("keychain value is not valid UTF-8".into()),
            TooLong(name, limit) => CourierError::Storage(format!(
                "keychain attribute '{name}' exceeds platform limit ({limit})"
            )),
            Invalid(attr, reason) => {
                CourierError::Storage(format!("keychain attribute '{attr}' is invalid: {reason}"))
            }
            Ambiguous(entries) => CourierError::Storage(format!(
                "multiple keychain entries matched request ({} results)",
                entries.len()
            )),
            PlatformFailure(err) => CourierError::Storage(format!("keychain platform error: {err}")),
            NoStorageAccess(err) => {
                CourierError::Storage(format!("unable to access secure storage: {err}"))
            }
            _ => CourierError::Storage(description),
        }
    }
}

impl From<KeyringError> for InfraError {
    fn from(value: KeyringError) -> Self {
        InfraError(value.into_courier())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → CourierError */
/* -------------------------------------------------------------------------- */

impl IntoCourierError for HttpError {
    fn into_courier(self) -> CourierError {
        if self.is_timeout() {
            return CourierError::timeout("HTTP request timed out");
        }

        if self.is_connect() {
            return CourierError::network("HTTP connection failure");
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));
            return match code {
                401 => CourierError::unauthorized(message),
                _ => CourierError::http_status(code, message),
            };
        }

        if self.is_builder() {
            return CourierError::Config(format!("invalid HTTP request: {self}"));
        }

        CourierError::network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_courier())
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error / serde_json::Error → CourierError */
/* -------------------------------------------------------------------------- */

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        InfraError(CourierError::Storage(format!("I/O failure: {value}")))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(CourierError::Storage(format!("corrupt state document: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
