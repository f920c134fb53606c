//! Task poller state machine over a scripted backend

mod support;

use std::sync::Arc;
use std::time::Duration;

use courier_core::testing::ScriptedReply;
use courier_core::{PollOptions, TaskPoller};
use courier_domain::constants::TASK_FAILED_CODE;
use courier_domain::{ErrorKind, Method, TaskState};
use futures::future::Shared;
use parking_lot::Mutex;
use serde_json::json;
use support::harness;

fn processing(progress: u32) -> ScriptedReply {
    ScriptedReply::envelope(json!({"status": "processing", "progress": progress}))
}

fn completed() -> ScriptedReply {
    ScriptedReply::envelope(json!({"status": "completed"}))
}

fn fast(max_attempts: u32) -> PollOptions {
    PollOptions::new(Duration::from_secs(1), max_attempts)
}

#[tokio::test(start_paused = true)]
async fn reports_progress_then_fetches_result_once() {
    let h = harness().build();
    h.transport
        .on(Method::Get, "/status/T1", processing(40))
        .on(Method::Get, "/status/T1", processing(40))
        .on(Method::Get, "/status/T1", processing(40))
        .on(Method::Get, "/status/T1", completed());
    h.transport.on(Method::Get, "/result/T1", ScriptedReply::envelope(json!({"url": "card.png"})));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let poller = TaskPoller::new(h.client.clone());

    let result = poller
        .start_polling("T1", fast(30).with_progress(move |p| sink.lock().push(p)))
        .await
        .unwrap();

    assert_eq!(result, json!({"url": "card.png"}));
    assert_eq!(*seen.lock(), vec![40.0, 40.0, 40.0]);
    assert_eq!(h.transport.call_count(Method::Get, "/status/T1"), 4);
    assert_eq!(h.transport.call_count(Method::Get, "/result/T1"), 1);
    assert!(!poller.is_polling("T1"));
}

#[tokio::test(start_paused = true)]
async fn never_finishing_task_times_out() {
    let h = harness().build();
    h.transport.on(Method::Get, "/status/T2", processing(10));
    let poller = TaskPoller::new(h.client.clone());

    let err = poller.start_polling("T2", fast(3)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(h.transport.call_count(Method::Get, "/status/T2"), 3);
    assert_eq!(h.transport.call_count(Method::Get, "/result/T2"), 0);
    assert!(poller.active_tasks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_task_rejects_with_server_reason() {
    let h = harness().build();
    h.transport.on(
        Method::Get,
        "/status/T3",
        ScriptedReply::envelope(json!({"status": "failed", "error": "out of credits"})),
    );
    let poller = TaskPoller::new(h.client.clone());

    let err = poller.start_polling("T3", fast(5)).await.unwrap_err();

    assert_eq!(err.business_code(), Some(TASK_FAILED_CODE));
    assert_eq!(err.summary(), "out of credits");
}

#[tokio::test(start_paused = true)]
async fn starting_twice_joins_the_running_poll() {
    let h = harness().build();
    h.transport
        .on(Method::Get, "/status/T4", processing(50))
        .on(Method::Get, "/status/T4", completed());
    h.transport.on(Method::Get, "/result/T4", ScriptedReply::envelope(json!(7)));
    let poller = TaskPoller::new(h.client.clone());

    let first = poller.start_polling("T4", fast(10));
    let second = poller.start_polling("T4", PollOptions::long_job());
    assert!(Shared::ptr_eq(&first, &second));
    assert_eq!(poller.active_tasks(), vec!["T4".to_string()]);

    let (a, b) = tokio::join!(first, second);
    assert_eq!(a.unwrap(), json!(7));
    assert_eq!(b.unwrap(), json!(7));
    assert_eq!(h.transport.call_count(Method::Get, "/status/T4"), 2);
}

#[tokio::test(start_paused = true)]
async fn stopped_task_makes_no_further_calls() {
    let h = harness().build();
    h.transport.on(Method::Get, "/status/T5", processing(5));
    let poller = TaskPoller::new(h.client.clone());

    let outcome = poller.start_polling("T5", fast(30));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(poller.snapshot("T5").unwrap().state, TaskState::Processing);

    assert!(poller.stop_polling("T5"));
    let err = outcome.await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.transport.call_count(Method::Get, "/status/T5"), 1);
    assert!(!poller.stop_polling("T5"));
}

#[tokio::test(start_paused = true)]
async fn status_arriving_after_stop_is_discarded() {
    let h = harness().build();
    h.transport.on(
        Method::Get,
        "/status/T6",
        processing(90).with_delay(Duration::from_millis(500)),
    );
    let progress_calls = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&progress_calls);
    let poller = TaskPoller::new(h.client.clone());

    let outcome =
        poller.start_polling("T6", fast(30).with_progress(move |_| *counter.lock() += 1));
    tokio::time::sleep(Duration::from_millis(100)).await;
    poller.stop_all();

    assert_eq!(outcome.await.unwrap_err().kind(), ErrorKind::Cancelled);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(*progress_calls.lock(), 0);
    assert_eq!(h.transport.call_count(Method::Get, "/status/T6"), 1);
}

#[tokio::test(start_paused = true)]
async fn transport_failure_backs_off_double_interval() {
    let h = harness().build();
    h.transport
        .on(Method::Get, "/status/T7", ScriptedReply::status(503))
        .on(Method::Get, "/status/T7", processing(20))
        .on(Method::Get, "/status/T7", completed());
    h.transport.on(Method::Get, "/result/T7", ScriptedReply::envelope(json!("done")));
    let poller = TaskPoller::new(h.client.clone());

    assert_eq!(poller.start_polling("T7", fast(10)).await.unwrap(), json!("done"));

    let ticks = h.transport.calls_to(Method::Get, "/status/T7");
    assert_eq!(ticks.len(), 3, "client-level retries are disabled for status fetches");
    assert_eq!(ticks[1].at - ticks[0].at, Duration::from_secs(2));
    assert_eq!(ticks[2].at - ticks[1].at, Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn degraded_ticks_share_the_attempt_budget() {
    let h = harness().build();
    h.transport.on(Method::Get, "/status/T8", ScriptedReply::status(502));
    let poller = TaskPoller::new(h.client.clone());

    let err = poller.start_polling("T8", fast(2)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(h.transport.call_count(Method::Get, "/status/T8"), 2);
}

#[tokio::test(start_paused = true)]
async fn submit_and_wait_polls_the_returned_task() {
    let h = harness().build();
    h.transport.on(Method::Post, "/jobs/cards", ScriptedReply::envelope(json!({"taskId": "T9"})));
    h.transport.on(Method::Get, "/status/T9", completed());
    h.transport.on(Method::Get, "/result/T9", ScriptedReply::envelope(json!({"cardId": 3})));
    let poller = TaskPoller::new(h.client.clone());

    let result = poller
        .submit_and_wait("/jobs/cards", json!({"prompt": "sunrise"}), PollOptions::short_job())
        .await
        .unwrap();

    assert_eq!(result, json!({"cardId": 3}));
    assert_eq!(
        h.transport.calls_to(Method::Post, "/jobs/cards")[0].body,
        Some(json!({"prompt": "sunrise"}))
    );
}
