//! Target submission with bounded retry
//!
//! Transient transport failures are retried with exponential backoff;
//! anything else is surfaced immediately.

use crate::error::{ClusterError, Result};
use crate::transport::ClusterTransport;
use caravel_types::{Manifest, TargetIdentity};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy for submissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Backoff before the first retry
    pub initial_backoff: Duration,

    /// Backoff ceiling
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// Outcome of a successful submission.
#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
    /// The manifest as stored by the cluster
    pub manifest: Manifest,

    /// `metadata.generation` after the patch, used to fence stale status
    pub generation: Option<i64>,
}

/// Sends merged manifests to the cluster.
pub struct TargetSubmitter {
    transport: Arc<dyn ClusterTransport>,
    retry: RetryConfig,
}

impl TargetSubmitter {
    pub fn new(transport: Arc<dyn ClusterTransport>) -> Self {
        Self {
            transport,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(transport: Arc<dyn ClusterTransport>, retry: RetryConfig) -> Self {
        Self { transport, retry }
    }

    /// Submit a merged manifest, retrying transient transport failures.
    pub async fn submit(
        &self,
        identity: &TargetIdentity,
        manifest: &Manifest,
    ) -> Result<SubmissionReceipt> {
        let mut backoff = self.retry.initial_backoff;
        let mut attempt = 1u32;

        loop {
            match self.transport.patch(identity, manifest).await {
                Ok(stored) => {
                    debug!(target = %identity, attempt = attempt, "Patch accepted");
                    let generation = stored.generation();
                    return Ok(SubmissionReceipt {
                        manifest: stored,
                        generation,
                    });
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    warn!(
                        target = %identity,
                        attempt = attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Transient submission failure, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.retry.max_backoff);
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    return Err(ClusterError::RetriesExhausted {
                        attempts: attempt,
                        last: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryCluster;
    use caravel_types::ResourceKind;
    use serde_json::json;

    fn identity() -> TargetIdentity {
        TargetIdentity::new("account1", "testns", ResourceKind::Deployment, "deployment1")
    }

    fn deployment() -> Manifest {
        Manifest::new(json!({
            "kind": "deployment",
            "metadata": {"name": "deployment1"},
            "spec": {"replicas": 1}
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_then_success() {
        let cluster = Arc::new(InMemoryCluster::new());
        cluster.seed(identity(), deployment());
        cluster.fail_next_patches(2);

        let submitter = TargetSubmitter::new(cluster.clone());
        let receipt = submitter.submit(&identity(), &deployment()).await.unwrap();

        assert_eq!(cluster.patch_call_count(), 3);
        assert_eq!(receipt.generation, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted() {
        let cluster = Arc::new(InMemoryCluster::new());
        cluster.seed(identity(), deployment());
        cluster.fail_next_patches(5);

        let submitter = TargetSubmitter::new(cluster.clone());
        let err = submitter.submit(&identity(), &deployment()).await.unwrap_err();

        assert!(matches!(err, ClusterError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(cluster.patch_call_count(), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let cluster = Arc::new(InMemoryCluster::new());
        let submitter = TargetSubmitter::new(cluster.clone());

        let err = submitter.submit(&identity(), &deployment()).await.unwrap_err();
        assert!(matches!(err, ClusterError::TargetNotFound(_)));
        assert_eq!(cluster.patch_call_count(), 1);
    }
}
