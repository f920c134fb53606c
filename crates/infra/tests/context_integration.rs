//! End-to-end behaviour of `CourierContext` over real HTTP

mod support;

use std::sync::Arc;
use std::time::Duration;

use courier_core::testing::StaticCredentialSource;
use courier_core::{ConnectivitySource, PollOptions};
use courier_domain::constants::{KEY_ACCESS_TOKEN, KEY_CACHE_SNAPSHOT};
use courier_domain::{NetworkStatus, RequestDescriptor};
use courier_infra::{CourierContext, HealthProbe};
use parking_lot::Mutex;
use serde_json::json;
use support::{config, envelope, seed_session, stored_value};
use tempfile::tempdir;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer};

#[tokio::test]
async fn restored_session_is_validated_and_sent_as_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/userinfo"))
        .and(header("authorization", "Bearer at-1"))
        .respond_with(envelope(json!({"userId": "u-1", "nickname": "Ada"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cards"))
        .and(header("authorization", "Bearer at-1"))
        .respond_with(envelope(json!([1, 2])))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let state = dir.path().join("state.json");
    seed_session(&state, "at-1").await;

    let ctx = CourierContext::from_config(config(&server, &state)).await.unwrap();
    ctx.start().await.unwrap();

    assert!(ctx.is_started());
    assert!(ctx.auth().is_authenticated());
    assert_eq!(ctx.auth().current_user().unwrap().nickname.as_deref(), Some("Ada"));

    let cards: Vec<i32> = ctx.client().get("/cards").await.unwrap();
    assert_eq!(cards, vec![1, 2]);

    ctx.shutdown().await.unwrap();
    assert!(!ctx.is_started());
}

#[tokio::test]
async fn login_persists_and_logout_clears_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"code": "code-1", "profile": null})))
        .respond_with(envelope(json!({
            "token": "at-9",
            "refreshToken": "rt-9",
            "expiresIn": 3600,
            "userInfo": {"userId": "u-9"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let state = dir.path().join("state.json");
    let ctx = CourierContext::from_config(config(&server, &state)).await.unwrap();
    ctx.start().await.unwrap();
    assert!(!ctx.auth().is_authenticated());

    let user = ctx.login(Arc::new(StaticCredentialSource::new("code-1"))).await.unwrap();
    assert_eq!(user.user_id, "u-9");
    assert_eq!(stored_value(&state, KEY_ACCESS_TOKEN).await.as_deref(), Some("at-9"));

    ctx.logout().await.unwrap();
    assert!(!ctx.auth().is_authenticated());
    assert_eq!(stored_value(&state, KEY_ACCESS_TOKEN).await, None);

    ctx.shutdown().await.unwrap();
}

#[tokio::test]
async fn cached_responses_survive_a_restart() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/catalog"))
        .respond_with(envelope(json!({"items": ["tea", "coffee"]})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let state = dir.path().join("state.json");
    let request = || RequestDescriptor::get("/catalog").cached();

    let first = CourierContext::from_config(config(&server, &state)).await.unwrap();
    first.start().await.unwrap();
    let fetched = first.client().execute(request()).await.unwrap();
    first.shutdown().await.unwrap();
    drop(first);
    assert!(stored_value(&state, KEY_CACHE_SNAPSHOT).await.is_some());

    let second = CourierContext::from_config(config(&server, &state)).await.unwrap();
    second.start().await.unwrap();
    assert_eq!(second.client().execute(request()).await.unwrap(), fetched);
    assert_eq!(second.client().stats().cache_hits, 1);
    second.shutdown().await.unwrap();
}

#[tokio::test]
async fn submitted_job_is_polled_to_its_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/jobs/render"))
        .respond_with(envelope(json!({"taskId": "J1"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status/J1"))
        .respond_with(envelope(json!({"status": "processing", "progress": 50})))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status/J1"))
        .respond_with(envelope(json!({"status": "completed"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/result/J1"))
        .respond_with(envelope(json!({"url": "render.png"})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let ctx =
        CourierContext::from_config(config(&server, &dir.path().join("state.json"))).await.unwrap();
    ctx.start().await.unwrap();

    let progress = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&progress);
    let options = PollOptions::new(Duration::from_millis(20), 10)
        .with_progress(move |value| sink.lock().push(value));

    let result = ctx
        .poller()
        .submit_and_wait("/jobs/render", json!({"scene": 4}), options)
        .await
        .unwrap();

    assert_eq!(result, json!({"url": "render.png"}));
    assert_eq!(*progress.lock(), vec![50.0, 50.0]);
    assert!(ctx.poller().active_tasks().is_empty());
    ctx.shutdown().await.unwrap();
}

#[tokio::test]
async fn unreachable_health_endpoint_marks_the_network_offline() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let probe = HealthProbe::new(
        Url::parse("http://127.0.0.1:9/health").unwrap(),
        Duration::from_millis(200),
    )
    .unwrap();

    let ctx = CourierContext::builder(config(&server, &dir.path().join("state.json")))
        .connectivity(Arc::new(probe) as Arc<dyn ConnectivitySource>)
        .build()
        .await
        .unwrap();
    ctx.start().await.unwrap();

    let mut status = ctx.monitor().watch();
    tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|current| *current == NetworkStatus::Offline),
    )
    .await
    .expect("probe should report offline")
    .unwrap();
    assert_eq!(ctx.client().stats().held, 0);

    ctx.shutdown().await.unwrap();
}

#[tokio::test]
async fn file_backend_without_path_is_rejected() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let mut config = config(&server, &dir.path().join("state.json"));
    config.storage.path = None;

    let err = CourierContext::from_config(config).await.unwrap_err();
    assert!(err.summary().contains("storage.path"));
}
