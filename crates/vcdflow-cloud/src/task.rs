//! Asynchronous remote task handles

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Handle to an operation running on the control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Task href used for polling
    pub href: String,

    /// Operation name as reported by the control plane (e.g. "vappDeploy")
    #[serde(default)]
    pub operation: String,

    pub status: TaskStatus,
}

impl Task {
    pub fn new(href: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            operation: operation.into(),
            status: TaskStatus::Queued,
        }
    }
}

/// Task lifecycle as reported by the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    /// Submitted, not yet picked up
    Queued,
    PreRunning,
    Running,
    Success,
    Error,
    Aborted,
    Canceled,
}

impl TaskStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(
            self,
            TaskStatus::Queued | TaskStatus::PreRunning | TaskStatus::Running
        )
    }

    pub fn is_success(&self) -> bool {
        *self == TaskStatus::Success
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Queued => write!(f, "queued"),
            TaskStatus::PreRunning => write!(f, "preRunning"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Success => write!(f, "success"),
            TaskStatus::Error => write!(f, "error"),
            TaskStatus::Aborted => write!(f, "aborted"),
            TaskStatus::Canceled => write!(f, "canceled"),
        }
    }
}

/// Something that can wait for a task to finish
///
/// A failed task resolves to [`CloudError::TaskFailed`](crate::CloudError::TaskFailed)
/// carrying the task's structured error, so its classification survives.
#[async_trait]
pub trait TaskWaiter: Send + Sync {
    async fn wait_task(&self, task: &Task) -> Result<()>;
}
