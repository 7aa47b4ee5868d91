//! Operation outcomes
//!
//! The terminal result of one patch-and-stabilize run. `TimedOut` is
//! distinct from `Failed`: the mutation was applied but readiness was never
//! observed within the deadline.

use crate::manifest::Manifest;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal status of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    /// The resource reached its readiness condition
    Stable,

    /// The patch was applied but readiness was not observed in time
    TimedOut,

    /// The operation failed; when `cancelled` is set on the result the
    /// failure was caller-initiated
    Failed,
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Stable => write!(f, "STABLE"),
            OperationStatus::TimedOut => write!(f, "TIMED_OUT"),
            OperationStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Terminal outcome of one patch-and-stabilize operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    /// Terminal status
    pub status: OperationStatus,

    /// The manifest as submitted to the cluster (artifacts bound, patch
    /// merged), when the pipeline got that far
    pub resolved_manifest: Option<Manifest>,

    /// Failure detail, when not stable
    pub error: Option<String>,

    /// Cancellation marker, distinguishable from timeout
    pub cancelled: bool,

    /// When the operation reached its terminal state
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

impl OperationResult {
    pub fn stable(resolved_manifest: Manifest) -> Self {
        Self {
            status: OperationStatus::Stable,
            resolved_manifest: Some(resolved_manifest),
            error: None,
            cancelled: false,
            finished_at: chrono::Utc::now(),
        }
    }

    pub fn timed_out(resolved_manifest: Option<Manifest>, reason: impl Into<String>) -> Self {
        Self {
            status: OperationStatus::TimedOut,
            resolved_manifest,
            error: Some(reason.into()),
            cancelled: false,
            finished_at: chrono::Utc::now(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: OperationStatus::Failed,
            resolved_manifest: None,
            error: Some(reason.into()),
            cancelled: false,
            finished_at: chrono::Utc::now(),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            status: OperationStatus::Failed,
            resolved_manifest: None,
            error: Some("operation cancelled".to_string()),
            cancelled: true,
            finished_at: chrono::Utc::now(),
        }
    }

    pub fn is_stable(&self) -> bool {
        self.status == OperationStatus::Stable
    }
}
