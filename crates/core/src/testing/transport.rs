//! Scripted transport double
//!
//! Replies are keyed by method and path (scheme, host and query are ignored)
//! and consumed in order; the last reply for a route repeats forever.
//! Unscripted routes answer 404.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use courier_domain::Method;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::transport::ports::{HttpRequest, HttpResponse, Transport, TransportError};

/// One scripted outcome
#[derive(Debug, Clone)]
pub struct ScriptedReply {
    outcome: Result<HttpResponse, TransportError>,
    delay: Option<Duration>,
}

impl ScriptedReply {
    /// 200 with a success envelope around `data`
    pub fn envelope(data: Value) -> Self {
        Self::json(200, json!({"code": 0, "message": "ok", "data": data}))
    }

    /// 200 with a business-failure envelope
    pub fn business(code: i64, message: &str) -> Self {
        Self::json(200, json!({"code": code, "message": message}))
    }

    /// Bare status with an empty body
    pub fn status(status: u16) -> Self {
        Self::response(HttpResponse::new(status, Vec::new()))
    }

    pub fn json(status: u16, body: Value) -> Self {
        let bytes = serde_json::to_vec(&body).unwrap_or_default();
        Self::response(HttpResponse::new(status, bytes))
    }

    pub fn response(response: HttpResponse) -> Self {
        Self { outcome: Ok(response), delay: None }
    }

    pub fn transport_error(error: TransportError) -> Self {
        Self { outcome: Err(error), delay: None }
    }

    /// Hold the reply back for `delay` (tokio time, so pausable)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let Ok(response) = &mut self.outcome {
            response.headers.insert(name.to_string(), value.to_string());
        }
        self
    }
}

/// A request as the transport saw it
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub url: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    /// Body parsed as JSON, when there was one
    pub body: Option<Value>,
    pub at: Instant,
}

impl RecordedCall {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

type RouteKey = (Method, String);

#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<RouteKey, VecDeque<ScriptedReply>>>,
    calls: Mutex<Vec<RecordedCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a reply for `method` + `path`
    pub fn on(&self, method: Method, path: &str, reply: ScriptedReply) -> &Self {
        self.routes.lock().entry((method, path.to_string())).or_default().push_back(reply);
        self
    }

    /// Replace everything scripted for `method` + `path`
    pub fn replace(&self, method: Method, path: &str, reply: ScriptedReply) {
        self.routes.lock().insert((method, path.to_string()), VecDeque::from([reply]));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, method: Method, path: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.method == method && call.path == path)
            .cloned()
            .collect()
    }

    pub fn call_count(&self, method: Method, path: &str) -> usize {
        self.calls.lock().iter().filter(|call| call.method == method && call.path == path).count()
    }

    /// Highest number of sends that were outstanding at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, method: Method, path: &str) -> ScriptedReply {
        let mut routes = self.routes.lock();
        match routes.get_mut(&(method, path.to_string())) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(not_found),
            Some(queue) => queue.front().cloned().unwrap_or_else(not_found),
            None => not_found(),
        }
    }
}

fn not_found() -> ScriptedReply {
    ScriptedReply::status(404)
}

/// Path component of an absolute or relative URL, without query or fragment
fn path_of(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = if url.contains("://") {
        rest.find('/').map_or("/", |index| &rest[index..])
    } else {
        rest
    };
    path.split(['?', '#']).next().unwrap_or(path).to_string()
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let path = path_of(&request.url);
        let body = request.body.as_deref().and_then(|bytes| serde_json::from_slice(bytes).ok());
        self.calls.lock().push(RecordedCall {
            method: request.method,
            url: request.url.clone(),
            path: path.clone(),
            headers: request.headers.clone(),
            body,
            at: Instant::now(),
        });

        let reply = self.next_reply(request.method, &path);

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        reply.outcome
    }
}
