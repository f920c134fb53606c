//! HTTP health probe
//!
//! Connectivity is judged by reachability: any HTTP response, whatever its
//! status, means the backend can be reached. Only connect failures and
//! timeouts report offline.

use std::time::Duration;

use async_trait::async_trait;
use courier_core::ConnectivitySource;
use courier_domain::{Config, CourierError, NetworkStatus, Result};
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::errors::InfraError;

/// [`ConnectivitySource`] that issues a GET against a health endpoint
#[derive(Debug, Clone)]
pub struct HealthProbe {
    client: Client,
    url: Url,
}

impl HealthProbe {
    pub fn new(url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(InfraError::from)?;
        Ok(Self { client, url })
    }

    /// Probe built from the API and network sections of `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let url = resolve_probe_url(&config.api.base_url, &config.network.probe_path)?;
        Self::new(url, config.network.probe_timeout())
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl ConnectivitySource for HealthProbe {
    async fn probe(&self) -> NetworkStatus {
        match self.client.get(self.url.clone()).send().await {
            Ok(response) => {
                debug!(url = %self.url, status = response.status().as_u16(), "health probe answered");
                NetworkStatus::Online
            }
            Err(err) => {
                debug!(url = %self.url, error = %err, "health probe failed");
                NetworkStatus::Offline
            }
        }
    }
}

/// Absolute `probe_path` as-is; otherwise appended to the base URL's path
fn resolve_probe_url(base_url: &str, probe_path: &str) -> Result<Url> {
    if let Ok(absolute) = Url::parse(probe_path) {
        return Ok(absolute);
    }

    let mut base = Url::parse(base_url)
        .map_err(|e| CourierError::Config(format!("invalid api.base_url '{base_url}': {e}")))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(probe_path.trim_start_matches('/'))
        .map_err(|e| CourierError::Config(format!("invalid network.probe_path '{probe_path}': {e}")))
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn test_resolve_probe_url_keeps_base_path() {
        let url = resolve_probe_url("https://api.example.com/v1", "/health").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/health");

        let url = resolve_probe_url("https://api.example.com/", "health").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/health");
    }

    #[test]
    fn test_resolve_probe_url_absolute_override() {
        let url = resolve_probe_url("https://api.example.com", "https://status.example.com/ping")
            .unwrap();
        assert_eq!(url.host_str(), Some("status.example.com"));
    }

    #[test]
    fn test_resolve_probe_url_rejects_bad_base() {
        let err = resolve_probe_url("not a url", "/health").unwrap_err();
        assert!(matches!(err, CourierError::Config(_)));
    }

    #[tokio::test]
    async fn test_any_response_counts_as_online() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let url = resolve_probe_url(&server.uri(), "/health").unwrap();
        let probe = HealthProbe::new(url, Duration::from_secs(2)).unwrap();
        assert_eq!(probe.probe().await, NetworkStatus::Online);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_offline() {
        let url = Url::parse("http://127.0.0.1:9/health").unwrap();
        let probe = HealthProbe::new(url, Duration::from_millis(500)).unwrap();
        assert_eq!(probe.probe().await, NetworkStatus::Offline);
    }

    #[tokio::test]
    async fn test_slow_endpoint_is_offline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let url = resolve_probe_url(&server.uri(), "/health").unwrap();
        let probe = HealthProbe::new(url, Duration::from_millis(50)).unwrap();
        assert_eq!(probe.probe().await, NetworkStatus::Offline);
    }
}
