//! Uniform response envelope `{ code, data, message }`

use serde::{Deserialize, Serialize};

use crate::constants::ENVELOPE_SUCCESS_CODE;
use crate::errors::CourierError;

/// Response wrapper used by every API endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub code: i64,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    pub fn ok(data: serde_json::Value) -> Self {
        Self { code: ENVELOPE_SUCCESS_CODE, data, message: None }
    }

    pub fn error(code: i64, message: impl Into<String>) -> Self {
        Self { code, data: serde_json::Value::Null, message: Some(message.into()) }
    }

    pub fn is_success(&self) -> bool {
        self.code == ENVELOPE_SUCCESS_CODE
    }

    /// Unwrap the payload or turn the envelope into a business error
    pub fn into_result(self) -> Result<serde_json::Value, CourierError> {
        if self.is_success() {
            Ok(self.data)
        } else {
            let message =
                self.message.unwrap_or_else(|| format!("request failed with code {}", self.code));
            Err(CourierError::business(self.code, message))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_success_envelope_yields_data() {
        let env: Envelope = serde_json::from_value(json!({"code": 0, "data": {"id": 7}})).unwrap();
        assert_eq!(env.into_result().unwrap(), json!({"id": 7}));
    }

    #[test]
    fn test_missing_data_is_null() {
        let env: Envelope = serde_json::from_value(json!({"code": 0})).unwrap();
        assert_eq!(env.into_result().unwrap(), serde_json::Value::Null);
    }

    #[test]
    fn test_non_zero_code_is_business_error() {
        let env: Envelope =
            serde_json::from_value(json!({"code": 1003, "message": "daily limit"})).unwrap();
        let err = env.into_result().unwrap_err();
        assert_eq!(err.business_code(), Some(1003));
        assert_eq!(err.summary(), "daily limit");
    }
}
