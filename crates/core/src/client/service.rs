//! Request client - executes logical requests
//!
//! Per request: cache lookup → offline hold → FIFO admission → interceptors →
//! transport → response interceptors → classification → retry with backoff,
//! with a single refresh-and-replay on 401.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use courier_common::resilience::ExponentialBackoff;
use courier_domain::{
    Config, CourierError, ErrorKind, RequestDescriptor, Result, RetryConfig,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::admission::{redeem, AdmissionPermit, AdmissionQueue, PendingRequestRecord};
use super::interceptors::{
    AuthHeaderInterceptor, ClientVersionInterceptor, ContentTypeInterceptor, RequestIdInterceptor,
    RequestInterceptor, ResponseInterceptor,
};
use super::offline::OfflineHold;
use crate::auth::AuthCoordinator;
use crate::cache::{signature, ResponseCache};
use crate::network::NetworkMonitor;
use crate::transport::ports::{HttpRequest, Transport};
use crate::transport::{classify_response, resolve_url};

/// Point-in-time request statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClientStats {
    /// Requests holding an admission slot
    pub active: usize,
    /// Requests waiting for a slot
    pub queued: usize,
    /// Requests parked until connectivity returns
    pub held: usize,
    pub completed: u64,
    pub failed: u64,
    pub retries: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

#[derive(Debug, Default)]
struct ClientCounters {
    completed: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl ClientCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Builder for [`RequestClient`]
pub struct RequestClientBuilder {
    transport: Arc<dyn Transport>,
    base_url: String,
    timeout: Duration,
    max_concurrent: usize,
    client_version: String,
    retry: RetryConfig,
    auth: Option<AuthCoordinator>,
    cache: Option<Arc<ResponseCache>>,
    monitor: Option<NetworkMonitor>,
    request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
}

impl RequestClientBuilder {
    fn new(transport: Arc<dyn Transport>) -> Self {
        let defaults = Config::default();
        let timeout = defaults.api.timeout();
        Self {
            transport,
            base_url: defaults.api.base_url,
            timeout,
            max_concurrent: defaults.api.max_concurrent,
            client_version: defaults.api.client_version,
            retry: defaults.retry,
            auth: None,
            cache: None,
            monitor: None,
            request_interceptors: Vec::new(),
            response_interceptors: Vec::new(),
        }
    }

    /// Take API and retry settings from `config`
    pub fn config(mut self, config: &Config) -> Self {
        self.base_url = config.api.base_url.clone();
        self.timeout = config.api.timeout();
        self.max_concurrent = config.api.max_concurrent;
        self.client_version = config.api.client_version.clone();
        self.retry = config.retry;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Default per-attempt timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn auth(mut self, auth: AuthCoordinator) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn monitor(mut self, monitor: NetworkMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Runs after the built-in request interceptors
    pub fn request_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.request_interceptors.push(interceptor);
        self
    }

    pub fn response_interceptor(mut self, interceptor: Arc<dyn ResponseInterceptor>) -> Self {
        self.response_interceptors.push(interceptor);
        self
    }

    pub fn build(self) -> RequestClient {
        let mut request_interceptors: Vec<Arc<dyn RequestInterceptor>> = Vec::new();
        if let Some(auth) = &self.auth {
            request_interceptors.push(Arc::new(AuthHeaderInterceptor::new(auth.clone())));
        }
        request_interceptors.push(Arc::new(RequestIdInterceptor));
        request_interceptors.push(Arc::new(ClientVersionInterceptor::new(self.client_version)));
        request_interceptors.push(Arc::new(ContentTypeInterceptor));
        request_interceptors.extend(self.request_interceptors);

        RequestClient {
            transport: self.transport,
            auth: self.auth,
            cache: self.cache,
            monitor: self.monitor,
            admission: AdmissionQueue::new(self.max_concurrent),
            offline: OfflineHold::new(),
            request_interceptors,
            response_interceptors: self.response_interceptors,
            base_url: self.base_url,
            timeout: self.timeout,
            retry: self.retry,
            counters: ClientCounters::default(),
            next_id: AtomicU64::new(1),
        }
    }
}

/// Executes logical requests against the remote API
pub struct RequestClient {
    transport: Arc<dyn Transport>,
    auth: Option<AuthCoordinator>,
    cache: Option<Arc<ResponseCache>>,
    monitor: Option<NetworkMonitor>,
    admission: AdmissionQueue,
    offline: OfflineHold,
    request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
    base_url: String,
    timeout: Duration,
    retry: RetryConfig,
    counters: ClientCounters,
    next_id: AtomicU64,
}

impl RequestClient {
    pub fn builder(transport: Arc<dyn Transport>) -> RequestClientBuilder {
        RequestClientBuilder::new(transport)
    }

    /// Execute one logical request and return the envelope payload
    #[instrument(skip(self, descriptor), fields(method = %descriptor.method, url = %descriptor.url))]
    pub async fn execute(&self, descriptor: RequestDescriptor) -> Result<Value> {
        let url = resolve_url(&self.base_url, &descriptor.url);

        let cache_key = match &self.cache {
            Some(_) if descriptor.is_cache_eligible() => {
                Some(signature(descriptor.method, &url, descriptor.body.as_ref()))
            }
            _ => None,
        };
        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(body) = cache.get(key) {
                ClientCounters::bump(&self.counters.cache_hits);
                debug!("served from cache");
                return Ok(body);
            }
            ClientCounters::bump(&self.counters.cache_misses);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut record = PendingRequestRecord::new(id, descriptor.method, url.clone());
        let result = self.run(&descriptor, &url, &mut record).await;

        match &result {
            Ok(body) => {
                ClientCounters::bump(&self.counters.completed);
                if let Some(cache) = &self.cache {
                    match cache_key {
                        Some(key) => cache.put(key, &url, body.clone(), descriptor.cache_ttl),
                        None if !descriptor.method.is_read() => {
                            cache.invalidate_prefix(without_query(&url));
                        }
                        None => {}
                    }
                }
            }
            Err(e) => {
                ClientCounters::bump(&self.counters.failed);
                warn!(
                    request_id = id,
                    kind = ?e.kind(),
                    retries = record.retry_count,
                    error = %e,
                    "request failed"
                );
            }
        }
        result
    }

    /// GET `url` and decode the payload
    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        decode(self.execute(RequestDescriptor::get(url)).await?)
    }

    pub async fn post<B, T>(&self, url: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        decode(self.execute(RequestDescriptor::post(url, encode(body)?)).await?)
    }

    pub async fn put<B, T>(&self, url: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        decode(self.execute(RequestDescriptor::put(url, encode(body)?)).await?)
    }

    pub async fn delete<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        decode(self.execute(RequestDescriptor::delete(url)).await?)
    }

    /// Drop cached responses whose URL starts with `prefix`
    pub fn invalidate_cache(&self, prefix: &str) -> usize {
        let prefix = resolve_url(&self.base_url, prefix);
        self.cache.as_ref().map_or(0, |cache| cache.invalidate_prefix(&prefix))
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    pub fn stats(&self) -> ClientStats {
        ClientStats {
            active: self.admission.active_count(),
            queued: self.admission.waiting_count(),
            held: self.offline.len(),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.counters.cache_misses.load(Ordering::Relaxed),
        }
    }

    pub fn active_requests(&self) -> Vec<PendingRequestRecord> {
        self.admission.active_records()
    }

    pub fn queued_requests(&self) -> Vec<PendingRequestRecord> {
        self.admission.waiting_records()
    }

    pub fn held_requests(&self) -> Vec<PendingRequestRecord> {
        self.offline.records()
    }

    pub fn auth(&self) -> Option<&AuthCoordinator> {
        self.auth.as_ref()
    }

    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    pub fn monitor(&self) -> Option<&NetworkMonitor> {
        self.monitor.as_ref()
    }

    /// Resume requests held while offline, in submission order
    pub fn flush_offline(&self) -> usize {
        self.offline.flush(&self.admission)
    }

    /// Flush the offline hold on every offline→online transition
    ///
    /// Returns `None` when the client has no monitor. The task ends when the
    /// client is dropped.
    pub fn attach_network_listener(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let monitor = self.monitor.as_ref()?;
        let mut events = monitor.subscribe();
        let client: Weak<Self> = Arc::downgrade(self);

        Some(tokio::spawn(async move {
            loop {
                let came_online = match events.recv().await {
                    Ok(event) => event.came_online(),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "network events lagged");
                        true
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(client) = client.upgrade() else { break };
                if came_online && client.monitor.as_ref().is_some_and(NetworkMonitor::is_online) {
                    client.flush_offline();
                }
            }
        }))
    }

    async fn run(
        &self,
        descriptor: &RequestDescriptor,
        url: &str,
        record: &mut PendingRequestRecord,
    ) -> Result<Value> {
        let backoff = self.backoff_for(descriptor);
        let mut permit = self.admit(record.clone()).await?;
        let mut replayed = false;

        loop {
            let error = match self.attempt(descriptor, url, &permit).await {
                Ok(body) => return Ok(body),
                Err(error) => error,
            };

            if error.kind() == ErrorKind::Auth && !replayed && !descriptor.skip_auth {
                if let Some(auth) = &self.auth {
                    replayed = true;
                    info!(request_id = record.id, "credential rejected; refreshing before replay");
                    auth.refresh().await?;
                    continue;
                }
            }

            if !error.is_retryable() || !backoff.should_retry(record.retry_count) {
                return Err(error);
            }

            let delay = backoff.delay_for(record.retry_count);
            record.retry_count += 1;
            ClientCounters::bump(&self.counters.retries);
            warn!(
                request_id = record.id,
                retry = record.retry_count,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "retrying request"
            );
            tokio::time::sleep(delay).await;

            if self.is_offline() {
                drop(permit);
                permit = self.admit(record.clone()).await?;
            }
        }
    }

    /// Wait for connectivity if needed, then for an admission slot
    async fn admit(&self, record: PendingRequestRecord) -> Result<AdmissionPermit> {
        if !self.is_offline() {
            return self.admission.acquire(record).await;
        }

        let wake = self.offline.hold(record);
        // Connectivity may have returned before the hold was registered.
        if !self.is_offline() {
            self.flush_offline();
        }
        let ticket =
            wake.await.map_err(|_| CourierError::cancelled("offline hold dropped"))?;
        redeem(ticket).await
    }

    async fn attempt(
        &self,
        descriptor: &RequestDescriptor,
        url: &str,
        permit: &AdmissionPermit,
    ) -> Result<Value> {
        let mut prepared = descriptor.clone();
        for interceptor in &self.request_interceptors {
            interceptor.intercept(&mut prepared).await?;
        }

        let timeout = prepared.timeout.unwrap_or(self.timeout);
        let mut request = HttpRequest::new(prepared.method, url, timeout);
        request.headers = prepared.headers.clone();
        if let Some(body) = &prepared.body {
            request = request.json(body)?;
        }

        debug!(request_id = permit.request_id(), method = %prepared.method, url, "sending request");
        let response = match tokio::time::timeout(timeout, self.transport.send(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(CourierError::timeout(format!("no response within {timeout:?}")))
            }
        };

        for interceptor in &self.response_interceptors {
            interceptor.on_response(&prepared, &response)?;
        }
        classify_response(&response)
    }

    fn backoff_for(&self, descriptor: &RequestDescriptor) -> ExponentialBackoff {
        let retry = descriptor.retry.unwrap_or_default();
        ExponentialBackoff::new(
            retry.base_delay.unwrap_or_else(|| self.retry.base_delay()),
            retry.max_retries.unwrap_or(self.retry.max_retries),
        )
    }

    fn is_offline(&self) -> bool {
        self.monitor.as_ref().is_some_and(|monitor| !monitor.is_online())
    }
}

impl std::fmt::Debug for RequestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestClient")
            .field("base_url", &self.base_url)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

fn without_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Value> {
    serde_json::to_value(body)
        .map_err(|e| CourierError::Internal(format!("failed to encode request body: {e}")))
}

fn decode<T: DeserializeOwned>(payload: Value) -> Result<T> {
    serde_json::from_value(payload)
        .map_err(|e| CourierError::Internal(format!("unexpected response payload: {e}")))
}

#[cfg(test)]
mod tests {
    use courier_domain::{Method, RetryOverride};
    use serde_json::json;

    use super::*;
    use crate::testing::{ScriptedReply, ScriptedTransport};

    fn client(transport: &Arc<ScriptedTransport>) -> RequestClient {
        RequestClient::builder(transport.clone())
            .base_url("https://api.test")
            .retry(RetryConfig { max_retries: 2, base_delay_ms: 10 })
            .build()
    }

    #[tokio::test]
    async fn test_business_error_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::Get, "/cards", ScriptedReply::business(1003, "daily limit"));

        let err = client(&transport).execute(RequestDescriptor::get("/cards")).await.unwrap_err();
        assert_eq!(err.business_code(), Some(1003));
        assert_eq!(transport.call_count(Method::Get, "/cards"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_status_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::Get, "/missing", ScriptedReply::status(404));

        let err = client(&transport).execute(RequestDescriptor::get("/missing")).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_override_disables_retries() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::Get, "/flaky", ScriptedReply::status(503));

        let client = client(&transport);
        let descriptor = RequestDescriptor::get("/flaky").retry(RetryOverride::none());
        assert!(client.execute(descriptor).await.is_err());
        assert_eq!(transport.calls().len(), 1);
        assert_eq!(client.stats().retries, 0);
    }

    #[tokio::test]
    async fn test_default_headers_and_typed_helpers() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::Post, "/cards", ScriptedReply::envelope(json!({"id": 9})));

        #[derive(serde::Deserialize)]
        struct Created {
            id: u32,
        }

        let created: Created =
            client(&transport).post("/cards", &json!({"mood": "calm"})).await.unwrap();
        assert_eq!(created.id, 9);

        let call = &transport.calls()[0];
        assert_eq!(call.url, "https://api.test/cards");
        assert!(call.headers.contains_key("X-Request-Id"));
        assert!(call.headers.contains_key("X-Client-Version"));
        assert_eq!(call.headers.get("Content-Type").map(String::as_str), Some("application/json"));
        assert_eq!(call.body, Some(json!({"mood": "calm"})));
    }

    struct RejectTeapot;

    impl ResponseInterceptor for RejectTeapot {
        fn on_response(
            &self,
            _request: &RequestDescriptor,
            response: &crate::transport::ports::HttpResponse,
        ) -> Result<()> {
            if response.headers.contains_key("x-teapot") {
                return Err(CourierError::business(418, "teapot"));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_response_interceptor_short_circuits() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(
            Method::Get,
            "/brew",
            ScriptedReply::envelope(json!("coffee")).with_header("x-teapot", "1"),
        );
        let client = RequestClient::builder(transport.clone())
            .base_url("https://api.test")
            .response_interceptor(Arc::new(RejectTeapot))
            .build();

        let err = client.execute(RequestDescriptor::get("/brew")).await.unwrap_err();
        assert_eq!(err.business_code(), Some(418));
    }

    #[test]
    fn test_without_query() {
        assert_eq!(without_query("https://api.test/cards?page=2"), "https://api.test/cards");
        assert_eq!(without_query("https://api.test/cards"), "https://api.test/cards");
    }
}
