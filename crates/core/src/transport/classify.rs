//! Response classification
//!
//! Maps a raw HTTP response onto the error taxonomy:
//!
//! | Response                        | Outcome                      |
//! |---------------------------------|------------------------------|
//! | 2xx, envelope `code == 0`       | `Ok(data)`                   |
//! | 2xx, envelope `code != 0`       | `Business`                   |
//! | 2xx, not an envelope            | terminal `Network`           |
//! | 401                             | `Auth`                       |
//! | 408, 429, 500, 502, 503, 504    | retryable `Network`          |
//! | anything else                   | terminal `Network`           |

use courier_domain::{CourierError, Envelope};
use serde_json::Value;

use super::ports::HttpResponse;

/// Classify a response into its payload or a typed error
pub fn classify_response(response: &HttpResponse) -> Result<Value, CourierError> {
    if response.status == 401 {
        return Err(CourierError::unauthorized(
            server_message(response).unwrap_or_else(|| "unauthorized".to_string()),
        ));
    }

    if !response.is_success() {
        let message = server_message(response)
            .unwrap_or_else(|| format!("request failed with HTTP {}", response.status));
        return Err(CourierError::http_status(response.status, message));
    }

    if response.status == 204 || response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }

    let envelope: Envelope = serde_json::from_slice(&response.body).map_err(|e| {
        CourierError::Network {
            message: format!("malformed response envelope: {e}"),
            status: Some(response.status),
            retryable: false,
        }
    })?;
    envelope.into_result()
}

/// `message` field of an error body, if the server sent one
fn server_message(response: &HttpResponse) -> Option<String> {
    let body: Value = serde_json::from_slice(&response.body).ok()?;
    body.get("message").and_then(Value::as_str).map(str::to_owned)
}

/// Join a request URL onto the API base unless it is already absolute
pub fn resolve_url(base_url: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    let base = base_url.trim_end_matches('/');
    if url.starts_with('/') {
        format!("{base}{url}")
    } else {
        format!("{base}/{url}")
    }
}
