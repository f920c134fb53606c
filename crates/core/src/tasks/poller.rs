//! Task poller
//!
//! Each registered task id owns one background loop and one shared outcome
//! future. The loop checks the registry before and after every status fetch:
//! once a task has been stopped (or superseded by a new registration under
//! the same id) the loop exits without issuing further calls or resolving
//! anything.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use courier_domain::constants::{PATH_TASK_RESULT, PATH_TASK_STATUS, TASK_FAILED_CODE};
use courier_domain::{
    CourierError, PollingTask, RequestDescriptor, Result, RetryOverride, TaskState,
    TaskStatusReport,
};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use super::options::PollOptions;
use crate::client::RequestClient;

/// Outcome of a polled task, shared by every caller polling the same id
pub type TaskFuture = Shared<BoxFuture<'static, Result<Value>>>;

struct TaskEntry {
    record: PollingTask,
    generation: u64,
    outcome: TaskFuture,
    resolver: Option<oneshot::Sender<Result<Value>>>,
}

type Registry = Arc<Mutex<HashMap<String, TaskEntry>>>;

/// Drives server-side jobs to a terminal state
pub struct TaskPoller {
    client: Arc<RequestClient>,
    registry: Registry,
    next_generation: AtomicU64,
}

impl TaskPoller {
    pub fn new(client: Arc<RequestClient>) -> Self {
        Self { client, registry: Arc::default(), next_generation: AtomicU64::new(1) }
    }

    /// Start polling `task_id`, or join the poll already running for it
    pub fn start_polling(&self, task_id: impl Into<String>, options: PollOptions) -> TaskFuture {
        let task_id = task_id.into();
        let mut registry = self.registry.lock();
        if let Some(entry) = registry.get(&task_id) {
            debug!(task_id = %task_id, "joining existing poll");
            return entry.outcome.clone();
        }

        let (resolver, receiver) = oneshot::channel();
        let outcome: TaskFuture = async move {
            receiver.await.unwrap_or_else(|_| Err(CourierError::cancelled("task poller dropped")))
        }
        .boxed()
        .shared();

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        registry.insert(
            task_id.clone(),
            TaskEntry {
                record: PollingTask::new(task_id.clone()),
                generation,
                outcome: outcome.clone(),
                resolver: Some(resolver),
            },
        );
        drop(registry);

        info!(
            task_id = %task_id,
            interval_ms = u64::try_from(options.interval.as_millis()).unwrap_or(u64::MAX),
            max_attempts = options.max_attempts,
            "polling started"
        );
        let poll = PollLoop {
            client: Arc::clone(&self.client),
            registry: Arc::clone(&self.registry),
            task_id,
            generation,
            options,
        };
        tokio::spawn(poll.run());
        outcome
    }

    /// Deregister `task_id`; its callers observe a cancellation
    ///
    /// A status fetch already in flight completes, but its result is
    /// discarded. Returns `false` if the task was not registered.
    pub fn stop_polling(&self, task_id: &str) -> bool {
        let Some(entry) = self.registry.lock().remove(task_id) else {
            return false;
        };
        info!(task_id, attempts = entry.record.attempts, "polling stopped");
        resolve(entry, Err(CourierError::cancelled(format!("polling of task {task_id} stopped"))));
        true
    }

    /// Stop every registered task
    pub fn stop_all(&self) -> usize {
        let drained: Vec<_> = self.registry.lock().drain().collect();
        let stopped = drained.len();
        for (task_id, entry) in drained {
            resolve(entry, Err(CourierError::cancelled(format!("polling of task {task_id} stopped"))));
        }
        if stopped > 0 {
            info!(stopped, "all polling stopped");
        }
        stopped
    }

    pub fn is_polling(&self, task_id: &str) -> bool {
        self.registry.lock().contains_key(task_id)
    }

    pub fn active_tasks(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.registry.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Current record of a registered task
    pub fn snapshot(&self, task_id: &str) -> Option<PollingTask> {
        self.registry.lock().get(task_id).map(|entry| entry.record.clone())
    }

    /// POST a job to `path` and poll the returned task id to completion
    #[instrument(skip(self, body, options))]
    pub async fn submit_and_wait(
        &self,
        path: &str,
        body: Value,
        options: PollOptions,
    ) -> Result<Value> {
        let accepted = self.client.execute(RequestDescriptor::post(path, body)).await?;
        let task_id = extract_task_id(&accepted).ok_or_else(|| {
            CourierError::Internal(format!("job submission to {path} returned no task id"))
        })?;
        self.start_polling(task_id, options).await
    }
}

impl std::fmt::Debug for TaskPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPoller").field("active_tasks", &self.active_tasks()).finish()
    }
}

fn resolve(mut entry: TaskEntry, outcome: Result<Value>) {
    if let Some(resolver) = entry.resolver.take() {
        // Nobody awaiting is fine; the outcome is simply dropped.
        let _ = resolver.send(outcome);
    }
}

/// Task id from a submission payload: a bare id or an object carrying one
fn extract_task_id(payload: &Value) -> Option<String> {
    let id = match payload {
        Value::Object(fields) => ["taskId", "task_id", "id"].iter().find_map(|key| fields.get(*key))?,
        other => other,
    };
    match id {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

struct PollLoop {
    client: Arc<RequestClient>,
    registry: Registry,
    task_id: String,
    generation: u64,
    options: PollOptions,
}

enum Tick {
    Wait(Duration),
    Finish(TaskState, Result<Value>),
}

impl PollLoop {
    async fn run(self) {
        loop {
            if !self.is_registered() {
                debug!(task_id = %self.task_id, "task deregistered; timer ignored");
                return;
            }

            let report = self.fetch_status().await;
            if !self.is_registered() {
                debug!(task_id = %self.task_id, "task deregistered; status discarded");
                return;
            }

            let tick = match report {
                Ok(report) => self.on_report(report).await,
                Err(error) if error.is_retryable() => self.on_degraded(error),
                Err(error) => Tick::Finish(TaskState::Failed, Err(error)),
            };

            match tick {
                Tick::Wait(delay) => tokio::time::sleep(delay).await,
                Tick::Finish(state, outcome) => {
                    self.finish(state, outcome);
                    return;
                }
            }
        }
    }

    async fn fetch_status(&self) -> Result<TaskStatusReport> {
        let descriptor = RequestDescriptor::get(format!("{PATH_TASK_STATUS}/{}", self.task_id))
            .retry(RetryOverride::none());
        let payload = self.client.execute(descriptor).await?;
        serde_json::from_value(payload)
            .map_err(|e| CourierError::Internal(format!("unexpected task status payload: {e}")))
    }

    async fn on_report(&self, report: TaskStatusReport) -> Tick {
        match report.status {
            TaskState::Pending | TaskState::Processing => {
                let attempts = self.update(|task| {
                    task.attempts += 1;
                    task.state = report.status;
                    if report.progress.is_some() {
                        task.last_progress = report.progress;
                    }
                });
                if let (Some(progress), Some(callback)) = (report.progress, &self.options.on_progress)
                {
                    callback(progress);
                }
                debug!(task_id = %self.task_id, attempts, progress = ?report.progress, "task not ready");
                self.next_tick(attempts, self.options.interval)
            }
            TaskState::Completed => {
                self.update(|task| task.state = TaskState::Completed);
                let descriptor =
                    RequestDescriptor::get(format!("{PATH_TASK_RESULT}/{}", self.task_id));
                let outcome = self.client.execute(descriptor).await;
                let state = if outcome.is_ok() { TaskState::Completed } else { TaskState::Failed };
                Tick::Finish(state, outcome)
            }
            TaskState::Failed => {
                let reason = report.error.unwrap_or_else(|| "task failed".to_string());
                Tick::Finish(TaskState::Failed, Err(CourierError::business(TASK_FAILED_CODE, reason)))
            }
            TaskState::TimedOut => Tick::Finish(
                TaskState::TimedOut,
                Err(CourierError::timeout(format!("server timed out task {}", self.task_id))),
            ),
            TaskState::Cancelled => Tick::Finish(
                TaskState::Cancelled,
                Err(CourierError::cancelled(format!("server cancelled task {}", self.task_id))),
            ),
        }
    }

    /// Transport failure: spend an attempt and back off to twice the interval
    fn on_degraded(&self, error: CourierError) -> Tick {
        let attempts = self.update(|task| task.attempts += 1);
        warn!(task_id = %self.task_id, attempts, error = %error, "status fetch failed");
        self.next_tick(attempts, self.options.interval.saturating_mul(2))
    }

    fn next_tick(&self, attempts: u32, delay: Duration) -> Tick {
        if attempts >= self.options.max_attempts {
            return Tick::Finish(
                TaskState::TimedOut,
                Err(CourierError::timeout(format!(
                    "task {} not finished after {attempts} attempts",
                    self.task_id
                ))),
            );
        }
        Tick::Wait(delay)
    }

    fn is_registered(&self) -> bool {
        self.registry
            .lock()
            .get(&self.task_id)
            .is_some_and(|entry| entry.generation == self.generation)
    }

    /// Mutate this task's record and return its attempt count
    fn update(&self, change: impl FnOnce(&mut PollingTask)) -> u32 {
        let mut registry = self.registry.lock();
        match registry.get_mut(&self.task_id) {
            Some(entry) if entry.generation == self.generation => {
                change(&mut entry.record);
                entry.record.attempts
            }
            _ => 0,
        }
    }

    fn finish(&self, state: TaskState, outcome: Result<Value>) {
        let entry = {
            let mut registry = self.registry.lock();
            match registry.get(&self.task_id) {
                Some(entry) if entry.generation == self.generation => {
                    registry.remove(&self.task_id)
                }
                _ => None,
            }
        };
        let Some(entry) = entry else {
            debug!(task_id = %self.task_id, "task deregistered; outcome discarded");
            return;
        };

        match &outcome {
            Ok(_) => info!(task_id = %self.task_id, attempts = entry.record.attempts, "task completed"),
            Err(error) => warn!(
                task_id = %self.task_id,
                state = %state,
                attempts = entry.record.attempts,
                error = %error,
                "task ended without a result"
            ),
        }
        resolve(entry, outcome);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_extract_task_id() {
        assert_eq!(extract_task_id(&json!({"taskId": "t-1"})), Some("t-1".to_string()));
        assert_eq!(extract_task_id(&json!({"task_id": 42})), Some("42".to_string()));
        assert_eq!(extract_task_id(&json!({"id": "x"})), Some("x".to_string()));
        assert_eq!(extract_task_id(&json!("bare")), Some("bare".to_string()));
        assert_eq!(extract_task_id(&json!({"status": "queued"})), None);
        assert_eq!(extract_task_id(&json!("")), None);
    }
}
