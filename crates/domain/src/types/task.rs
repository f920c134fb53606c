//! Asynchronous job polling types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Client-visible state of a server-side job
///
/// `pending → processing → {completed | failed | timedOut | cancelled}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskState {
    Pending,
    Processing,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

crate::impl_status_conversions!(TaskState {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
    TimedOut => "timedOut",
    Cancelled => "cancelled",
});

impl TaskState {
    /// No further automatic transition happens from a terminal state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::TimedOut | Self::Cancelled)
    }
}

/// Body of `GET /status/{taskId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusReport {
    pub status: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    /// Server-supplied failure reason
    #[serde(default, alias = "message", alias = "reason", skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Registry record for a task being polled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollingTask {
    pub task_id: String,
    pub state: TaskState,
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub last_progress: Option<f64>,
}

impl PollingTask {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            state: TaskState::Pending,
            attempts: 0,
            started_at: Utc::now(),
            last_progress: None,
        }
    }
}
