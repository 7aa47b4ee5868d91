//! Stability error types

use caravel_cluster::ClusterError;
use thiserror::Error;

/// Errors from stabilization monitoring.
#[derive(Debug, Error)]
pub enum StabilityError {
    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for stability operations
pub type Result<T> = std::result::Result<T, StabilityError>;
