//! Control plane error types

use caravel_deploy::PatchError;
use caravel_types::TaskId;
use thiserror::Error;

/// Errors from the control plane facade.
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("patch error: {0}")]
    Patch(#[from] PatchError),
}

/// Result type for control plane operations
pub type Result<T> = std::result::Result<T, ControlPlaneError>;
