//! Asynchronous task handles
//!
//! Submitting a patch returns a task handle; callers poll it until the
//! operation reaches a terminal state.

use caravel_types::{OperationResult, OperationStatus, TargetIdentity, TaskId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a submitted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// The operation is still in flight
    Running,

    /// The target stabilized
    Succeeded,

    /// The patch was applied but readiness was not observed in time
    TimedOut,

    /// The operation failed (including cancellation)
    Failed,
}

impl TaskStatus {
    /// Map an operation's terminal status onto the task contract.
    pub fn from_operation(status: OperationStatus) -> Self {
        match status {
            OperationStatus::Stable => TaskStatus::Succeeded,
            OperationStatus::TimedOut => TaskStatus::TimedOut,
            OperationStatus::Failed => TaskStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Running)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Running => write!(f, "RUNNING"),
            TaskStatus::Succeeded => write!(f, "SUCCEEDED"),
            TaskStatus::TimedOut => write!(f, "TIMED_OUT"),
            TaskStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// One submitted operation as seen through the task API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    /// Handle returned at submission
    pub id: TaskId,

    /// The identity the operation acts on
    pub target: TargetIdentity,

    /// Current status
    pub status: TaskStatus,

    /// Terminal outcome, present once the task finishes
    pub result: Option<OperationResult>,

    /// Submission timestamp
    pub submitted_at: chrono::DateTime<chrono::Utc>,

    /// Completion timestamp, present once the task finishes
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TaskRecord {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            TaskStatus::from_operation(OperationStatus::Stable),
            TaskStatus::Succeeded
        );
        assert_eq!(
            TaskStatus::from_operation(OperationStatus::TimedOut),
            TaskStatus::TimedOut
        );
        assert_eq!(
            TaskStatus::from_operation(OperationStatus::Failed),
            TaskStatus::Failed
        );
    }

    #[test]
    fn test_wire_spelling() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::TimedOut).unwrap(),
            "\"TIMED_OUT\""
        );
    }
}
