//! Interceptor pipeline
//!
//! Request interceptors run in registration order on a fresh copy of the
//! descriptor for every attempt, so headers such as the bearer token and the
//! request id are recomputed on retry and replay. Response interceptors run in
//! registration order and may reject a response before classification.

use async_trait::async_trait;
use courier_domain::constants::{
    CONTENT_TYPE_JSON, HEADER_CLIENT_VERSION, HEADER_CONTENT_TYPE, HEADER_REQUEST_ID,
};
use courier_domain::{RequestDescriptor, Result};
use tracing::debug;
use uuid::Uuid;

use crate::auth::AuthCoordinator;
use crate::transport::ports::HttpResponse;

/// Mutates an outgoing descriptor
#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    async fn intercept(&self, request: &mut RequestDescriptor) -> Result<()>;
}

/// Inspects a response; an `Err` rejects it
pub trait ResponseInterceptor: Send + Sync {
    fn on_response(&self, request: &RequestDescriptor, response: &HttpResponse) -> Result<()>;
}

/// Attaches credentials from the coordinator
pub struct AuthHeaderInterceptor {
    auth: AuthCoordinator,
}

impl AuthHeaderInterceptor {
    pub fn new(auth: AuthCoordinator) -> Self {
        Self { auth }
    }
}

#[async_trait]
impl RequestInterceptor for AuthHeaderInterceptor {
    async fn intercept(&self, request: &mut RequestDescriptor) -> Result<()> {
        if request.skip_auth {
            return Ok(());
        }
        if !self.auth.ensure_fresh_token().await {
            debug!(url = %request.url, "sending without a usable credential");
        }
        for (name, value) in self.auth.get_auth_headers().await? {
            request.headers.insert(name, value);
        }
        Ok(())
    }
}

/// Adds a correlation id unless the caller supplied one
pub struct RequestIdInterceptor;

#[async_trait]
impl RequestInterceptor for RequestIdInterceptor {
    async fn intercept(&self, request: &mut RequestDescriptor) -> Result<()> {
        if request.header_value(HEADER_REQUEST_ID).is_none() {
            request.headers.insert(HEADER_REQUEST_ID.to_string(), Uuid::new_v4().to_string());
        }
        Ok(())
    }
}

pub struct ClientVersionInterceptor {
    version: String,
}

impl ClientVersionInterceptor {
    pub fn new(version: impl Into<String>) -> Self {
        Self { version: version.into() }
    }
}

#[async_trait]
impl RequestInterceptor for ClientVersionInterceptor {
    async fn intercept(&self, request: &mut RequestDescriptor) -> Result<()> {
        request.headers.insert(HEADER_CLIENT_VERSION.to_string(), self.version.clone());
        Ok(())
    }
}

/// Normalizes body and content type by method
///
/// Methods without body semantics lose their body and any content type.
pub struct ContentTypeInterceptor;

#[async_trait]
impl RequestInterceptor for ContentTypeInterceptor {
    async fn intercept(&self, request: &mut RequestDescriptor) -> Result<()> {
        if request.method.allows_body() && request.body.is_some() {
            if request.header_value(HEADER_CONTENT_TYPE).is_none() {
                request.headers.insert(HEADER_CONTENT_TYPE.to_string(), CONTENT_TYPE_JSON.into());
            }
        } else {
            if request.body.take().is_some() {
                debug!(method = %request.method, url = %request.url, "stripped request body");
            }
            request.headers.retain(|name, _| !name.eq_ignore_ascii_case(HEADER_CONTENT_TYPE));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_body_stripped_for_get() {
        let mut request = RequestDescriptor::get("/cards")
            .body(json!({"ignored": true}))
            .header("content-type", "application/json");
        ContentTypeInterceptor.intercept(&mut request).await.unwrap();
        assert!(request.body.is_none());
        assert!(request.header_value(HEADER_CONTENT_TYPE).is_none());
    }

    #[tokio::test]
    async fn test_json_content_type_for_post() {
        let mut request = RequestDescriptor::post("/cards", json!({"mood": "calm"}));
        ContentTypeInterceptor.intercept(&mut request).await.unwrap();
        assert_eq!(request.header_value(HEADER_CONTENT_TYPE), Some(CONTENT_TYPE_JSON));
        assert!(request.body.is_some());
    }

    #[tokio::test]
    async fn test_request_id_respects_caller_value() {
        let mut supplied = RequestDescriptor::get("/x").header(HEADER_REQUEST_ID, "fixed");
        RequestIdInterceptor.intercept(&mut supplied).await.unwrap();
        assert_eq!(supplied.header_value(HEADER_REQUEST_ID), Some("fixed"));

        let mut generated = RequestDescriptor::get("/x");
        RequestIdInterceptor.intercept(&mut generated).await.unwrap();
        assert_eq!(generated.header_value(HEADER_REQUEST_ID).map(str::len), Some(36));
    }
}
