//! Cluster transport error types

use caravel_types::TargetIdentity;
use thiserror::Error;

/// Errors from the cluster boundary.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("target not found: {0}")]
    TargetNotFound(TargetIdentity),

    #[error("transport failure: {reason}")]
    Transport { reason: String },

    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("malformed resource for {target}: {reason}")]
    MalformedResource {
        target: TargetIdentity,
        reason: String,
    },
}

impl ClusterError {
    /// Transient failures worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClusterError::Transport { .. })
    }
}

/// Result type for cluster operations
pub type Result<T> = std::result::Result<T, ClusterError>;
