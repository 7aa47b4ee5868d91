//! Cluster transport trait
//!
//! The minimal verbs this core requires from the cluster collaborator.

use crate::error::Result;
use async_trait::async_trait;
use caravel_types::{Manifest, TargetIdentity};

/// Transport to a Kubernetes-compatible API.
///
/// Implementations must be safe to share across concurrent operations on
/// distinct targets; serialization per target is the orchestrator's job.
#[async_trait]
pub trait ClusterTransport: Send + Sync {
    /// Fetch the live manifest for a target.
    async fn get(&self, identity: &TargetIdentity) -> Result<Manifest>;

    /// Apply a fully merged manifest to a target, returning the stored
    /// manifest as the cluster now sees it.
    async fn patch(&self, identity: &TargetIdentity, manifest: &Manifest) -> Result<Manifest>;

    /// Fetch the current manifest including status, for readiness polling.
    async fn get_status(&self, identity: &TargetIdentity) -> Result<Manifest>;
}
