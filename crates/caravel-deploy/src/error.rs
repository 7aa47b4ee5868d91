//! Patch pipeline error types

use caravel_cluster::ClusterError;
use caravel_stability::StabilityError;
use thiserror::Error;

/// Errors from the patch pipeline.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("invalid artifact binding set: {0}")]
    InvalidBindingSet(String),

    #[error("required artifacts never bound: {0:?}")]
    UnresolvedRequiredArtifacts(Vec<String>),

    #[error("ambiguous required artifact '{name}': candidates {references:?}")]
    AmbiguousArtifact {
        name: String,
        references: Vec<String>,
    },

    #[error("patch conflict at '{path}': {reason}")]
    PatchConflict { path: String, reason: String },

    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("stability error: {0}")]
    Stability(#[from] StabilityError),
}

impl From<caravel_types::IdentityError> for PatchError {
    fn from(e: caravel_types::IdentityError) -> Self {
        PatchError::InvalidTarget(e.to_string())
    }
}

/// Result type for patch operations
pub type Result<T> = std::result::Result<T, PatchError>;
