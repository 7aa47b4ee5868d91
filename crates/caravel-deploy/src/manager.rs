//! Patch Manager - the orchestration pipeline
//!
//! The PatchManager is the entry point for one patch-and-stabilize
//! operation. The pure transforms run first; the cluster is only touched
//! once resolution and merging have succeeded, so a doomed request never
//! mutates the target.

use crate::artifacts::resolve_artifacts;
use crate::error::{PatchError, Result};
use crate::locks::IdentityLockArena;
use crate::merge::merge;
use caravel_cluster::{ClusterTransport, RetryConfig, TargetSubmitter};
use caravel_stability::{StabilityExpectations, StabilityMonitor, StabilizationOutcome};
use caravel_types::{
    EventSource, Manifest, OperationResult, PatchEvent, PatchEventEnvelope, PatchManifestRequest,
    ResourceKind, TargetIdentity,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Orchestrates patch-manifest operations.
pub struct PatchManager {
    /// Transport for live-state reads
    transport: Arc<dyn ClusterTransport>,
    /// Submission with bounded retry
    submitter: TargetSubmitter,
    /// Readiness polling
    monitor: Arc<StabilityMonitor>,
    /// Per-target serialization
    locks: IdentityLockArena,
    /// Event channel
    event_tx: broadcast::Sender<PatchEventEnvelope>,
}

impl PatchManager {
    /// Create a new patch manager with the default retry policy.
    pub fn new(transport: Arc<dyn ClusterTransport>, monitor: Arc<StabilityMonitor>) -> Self {
        Self::with_retry(transport, monitor, RetryConfig::default())
    }

    /// Create a new patch manager with an explicit retry policy.
    pub fn with_retry(
        transport: Arc<dyn ClusterTransport>,
        monitor: Arc<StabilityMonitor>,
        retry: RetryConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        let submitter = TargetSubmitter::with_retry(transport.clone(), retry);
        Self {
            transport,
            submitter,
            monitor,
            locks: IdentityLockArena::new(),
            event_tx,
        }
    }

    /// Subscribe to operation events.
    pub fn subscribe(&self) -> broadcast::Receiver<PatchEventEnvelope> {
        self.event_tx.subscribe()
    }

    /// Run one patch-and-stabilize operation to its terminal outcome.
    #[instrument(skip(self, request, cancel), fields(account = %request.account, location = %request.location))]
    pub async fn patch_and_wait(
        &self,
        request: &PatchManifestRequest,
        cancel: CancellationToken,
    ) -> Result<OperationResult> {
        // 1. Resolve the target identity and validate the binding set
        let identity = request.target_identity()?;
        let bindings = request.binding_set();
        bindings
            .validate()
            .map_err(|e| PatchError::InvalidBindingSet(e.to_string()))?;
        if request.skip_expression_evaluation.unwrap_or(false) {
            debug!("Upstream expression evaluation was skipped; patch body applied verbatim");
        }

        // 2. Serialize against concurrent operations on the same target
        let _guard = self.locks.acquire(&identity).await;
        info!(target = %identity, "Patch operation started");
        self.emit(PatchEvent::OperationStarted {
            target: identity.clone(),
        });

        if cancel.is_cancelled() {
            return Ok(self.cancelled(&identity));
        }

        // 3. Fetch live state
        let live = self.transport.get(&identity).await?;

        // 4. Bind artifacts (pure, fails strictly before any mutation)
        let resolution = resolve_artifacts(&request.patch_body, &identity.kind, &bindings)?;
        if !resolution.unresolved_required.is_empty() {
            return Err(PatchError::UnresolvedRequiredArtifacts(
                resolution.unresolved_required,
            ));
        }
        if !resolution.bound.is_empty() {
            self.emit(PatchEvent::ArtifactsBound {
                target: identity.clone(),
                references: resolution
                    .bound
                    .iter()
                    .map(|a| a.reference.clone())
                    .collect(),
            });
        }

        // 5. Merge the patch into live state (pure, fails strictly before
        //    any mutation)
        let merged = merge(&live, &resolution.manifest, request.options.merge_strategy)?;

        if cancel.is_cancelled() {
            return Ok(self.cancelled(&identity));
        }

        // 6. Submit the merged manifest
        let receipt = self.submitter.submit(&identity, &merged).await?;
        self.emit(PatchEvent::PatchSubmitted {
            target: identity.clone(),
            generation: receipt.generation,
        });

        // 7. Wait for the target to stabilize
        self.emit(PatchEvent::StabilizationStarted {
            target: identity.clone(),
        });
        let expectations =
            expectations_for(&identity.kind, receipt.generation, &resolution.manifest);
        let report = self
            .monitor
            .await_stable(&identity, expectations, cancel)
            .await?;

        // 8. Map the stabilization outcome
        let result = match report.outcome {
            StabilizationOutcome::Stable => {
                self.emit(PatchEvent::OperationStable {
                    target: identity.clone(),
                });
                OperationResult::stable(receipt.manifest)
            }
            StabilizationOutcome::TimedOut => {
                self.emit(PatchEvent::OperationTimedOut {
                    target: identity.clone(),
                });
                OperationResult::timed_out(
                    Some(receipt.manifest),
                    format!(
                        "target did not stabilize within {}s",
                        report.elapsed.as_secs()
                    ),
                )
            }
            StabilizationOutcome::Failed { cancelled: true, .. } => self.cancelled(&identity),
            StabilizationOutcome::Failed { reason, .. } => {
                self.emit(PatchEvent::OperationFailed {
                    target: identity.clone(),
                    reason: reason.clone(),
                });
                OperationResult::failed(reason)
            }
        };

        info!(target = %identity, status = %result.status, "Patch operation finished");
        Ok(result)
    }

    fn cancelled(&self, identity: &TargetIdentity) -> OperationResult {
        info!(target = %identity, "Patch operation cancelled");
        self.emit(PatchEvent::OperationCancelled {
            target: identity.clone(),
        });
        OperationResult::cancelled()
    }

    fn emit(&self, event: PatchEvent) {
        let envelope = PatchEventEnvelope::new(event, EventSource::Manager);
        let _ = self.event_tx.send(envelope);
    }
}

/// What the monitor should expect of the target once the patch lands.
fn expectations_for(
    kind: &ResourceKind,
    generation: Option<i64>,
    resolved_patch: &Manifest,
) -> StabilityExpectations {
    match kind {
        // Replica readiness must observe the post-patch generation.
        ResourceKind::Deployment => StabilityExpectations {
            min_generation: generation,
            expected_field: None,
        },
        ResourceKind::CustomResourceDefinition => StabilityExpectations::default(),
        // Generic resources have no readiness concept beyond the patched
        // field reflecting the requested value.
        ResourceKind::Custom(_) => StabilityExpectations {
            min_generation: None,
            expected_field: resolved_patch
                .value_at("spec")
                .and_then(|spec| first_scalar_leaf("spec", spec)),
        },
    }
}

fn first_scalar_leaf(prefix: &str, value: &Value) -> Option<(String, Value)> {
    match value {
        Value::Object(map) => map
            .iter()
            .find_map(|(key, member)| first_scalar_leaf(&format!("{}.{}", prefix, key), member)),
        Value::Array(_) | Value::Null => None,
        scalar => Some((prefix.to_string(), scalar.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caravel_cluster::{ClusterError, InMemoryCluster};
    use caravel_stability::{KindPolicy, StabilityConfig};
    use caravel_types::{Artifact, OperationStatus, PatchOptions};
    use serde_json::json;
    use std::time::Duration;

    const NGINX: &str = "index.docker.io/library/nginx";

    fn fast_config() -> StabilityConfig {
        let fast = KindPolicy {
            poll_interval: Duration::from_millis(100),
            timeout: Duration::from_secs(5),
        };
        StabilityConfig::default()
            .with_policy(ResourceKind::Deployment, fast.clone())
            .with_policy(ResourceKind::CustomResourceDefinition, fast.clone())
            .with_default_policy(fast)
    }

    fn setup() -> (Arc<InMemoryCluster>, PatchManager) {
        let cluster = Arc::new(InMemoryCluster::new());
        let monitor = Arc::new(StabilityMonitor::new(cluster.clone(), fast_config()));
        let manager = PatchManager::new(cluster.clone(), monitor);
        (cluster, manager)
    }

    fn deployment_identity() -> TargetIdentity {
        TargetIdentity::new("account1", "testns", ResourceKind::Deployment, "deployment1")
    }

    fn live_deployment() -> Manifest {
        Manifest::new(json!({
            "kind": "deployment",
            "apiVersion": "apps/v1",
            "metadata": {"name": "deployment1", "namespace": "testns"},
            "spec": {
                "replicas": 1,
                "template": {
                    "metadata": {"labels": {"app": "nginx"}},
                    "spec": {"containers": [
                        {"name": "nginx", "image": format!("{}:1.14", NGINX)}
                    ]}
                }
            },
            "status": {"readyReplicas": 0, "observedGeneration": 1}
        }))
    }

    fn request(patch_body: Manifest) -> PatchManifestRequest {
        PatchManifestRequest {
            account: "account1".to_string(),
            location: "testns".to_string(),
            manifest_name: Some("deployment deployment1".to_string()),
            patch_body,
            options: PatchOptions::default(),
            all_artifacts: vec![],
            required_artifacts: vec![],
            manifests: vec![],
            traffic_management: None,
            moniker: None,
            enable_traffic: None,
            skip_expression_evaluation: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_label_patch_reaches_stable() {
        let (cluster, manager) = setup();
        cluster.seed(deployment_identity(), live_deployment());
        cluster.set_auto_ready(true);

        let patch = Manifest::new(json!({
            "spec": {"template": {"metadata": {"labels": {"testPatch": "success"}}}}
        }));

        let result = manager
            .patch_and_wait(&request(patch), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.status, OperationStatus::Stable);

        let live = cluster.manifest(&deployment_identity()).unwrap();
        assert_eq!(
            live.value_at("spec.template.metadata.labels.testPatch"),
            Some(&json!("success"))
        );
        // pre-existing labels survive the merge
        assert_eq!(
            live.value_at("spec.template.metadata.labels.app"),
            Some(&json!("nginx"))
        );
        assert_eq!(live.value_at("status.readyReplicas"), Some(&json!(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_optional_artifact_binds_into_deployed_image() {
        let (cluster, manager) = setup();
        cluster.seed(deployment_identity(), live_deployment());
        cluster.set_auto_ready(true);

        let patch = Manifest::new(json!({
            "spec": {"template": {"spec": {"containers": [
                {"name": "nginx", "image": NGINX}
            ]}}}
        }));
        let mut request = request(patch);
        request.options.merge_strategy = caravel_types::MergeStrategy::Strategic;
        request.all_artifacts = vec![Artifact::docker(NGINX, "1.18")];

        let result = manager
            .patch_and_wait(&request, CancellationToken::new())
            .await
            .unwrap();
        assert!(result.is_stable());

        let live = cluster.manifest(&deployment_identity()).unwrap();
        assert_eq!(
            live.value_at("spec.template.spec.containers[0].image"),
            Some(&json!(format!("{}:1.18", NGINX)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_required_artifact_wins_over_optional() {
        let (cluster, manager) = setup();
        cluster.seed(deployment_identity(), live_deployment());
        cluster.set_auto_ready(true);

        let patch = Manifest::new(json!({
            "spec": {"template": {"spec": {"containers": [
                {"name": "nginx", "image": NGINX}
            ]}}}
        }));
        let mut request = request(patch);
        request.options.merge_strategy = caravel_types::MergeStrategy::Strategic;
        // optional 1.19 listed first; required 1.18 must still win
        request.all_artifacts = vec![
            Artifact::docker(NGINX, "1.19"),
            Artifact::docker(NGINX, "1.18"),
        ];
        request.required_artifacts = vec![Artifact::docker(NGINX, "1.18")];

        let result = manager
            .patch_and_wait(&request, CancellationToken::new())
            .await
            .unwrap();
        assert!(result.is_stable());

        let live = cluster.manifest(&deployment_identity()).unwrap();
        assert_eq!(
            live.value_at("spec.template.spec.containers[0].image"),
            Some(&json!(format!("{}:1.18", NGINX)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresolved_required_artifact_never_mutates_cluster() {
        let (cluster, manager) = setup();
        cluster.seed(deployment_identity(), live_deployment());

        let patch = Manifest::new(json!({
            "spec": {"template": {"metadata": {"labels": {"testPatch": "success"}}}}
        }));
        let mut request = request(patch);
        let orphan = Artifact::docker("other/image", "2.0");
        request.all_artifacts = vec![orphan.clone()];
        request.required_artifacts = vec![orphan];

        let err = manager
            .patch_and_wait(&request, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PatchError::UnresolvedRequiredArtifacts(_)));
        assert_eq!(cluster.patch_call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_merge_conflict_never_mutates_cluster() {
        let (cluster, manager) = setup();
        cluster.seed(deployment_identity(), live_deployment());

        let patch = Manifest::new(json!({
            "spec": {"replicas": {"min": 1, "max": 3}}
        }));
        let err = manager
            .patch_and_wait(&request(patch), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PatchError::PatchConflict { .. }));
        assert_eq!(cluster.patch_call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_crd_short_names_patch() {
        let (cluster, manager) = setup();
        let identity = TargetIdentity::new(
            "account1",
            "testns",
            ResourceKind::CustomResourceDefinition,
            "crontabs.stable.example.com",
        );
        cluster.seed(
            identity.clone(),
            Manifest::new(json!({
                "kind": "customResourceDefinition",
                "apiVersion": "apiextensions.k8s.io/v1",
                "metadata": {"name": "crontabs.stable.example.com"},
                "spec": {
                    "group": "stable.example.com",
                    "scope": "Namespaced",
                    "names": {"kind": "CronTab", "plural": "crontabs", "shortNames": ["ct"]}
                }
            })),
        );
        cluster.set_auto_ready(true);

        let patch = Manifest::new(json!({
            "spec": {"names": {"shortNames": ["cntb"]}}
        }));
        let mut request = request(patch);
        request.manifest_name =
            Some("customResourceDefinition crontabs.stable.example.com".to_string());

        let result = manager
            .patch_and_wait(&request, CancellationToken::new())
            .await
            .unwrap();
        assert!(result.is_stable());

        let live = cluster.manifest(&identity).unwrap();
        assert_eq!(
            live.value_at("spec.names.shortNames"),
            Some(&json!(["cntb"]))
        );
        // everything else is untouched
        assert_eq!(
            live.value_at("spec.group"),
            Some(&json!("stable.example.com"))
        );
        assert_eq!(live.value_at("spec.names.kind"), Some(&json!("CronTab")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_resource_patch_settles_on_field() {
        let (cluster, manager) = setup();
        let identity = TargetIdentity::new(
            "account1",
            "testns",
            ResourceKind::Custom("crontab.stable.example.com".to_string()),
            "my-new-cron-object",
        );
        cluster.seed(
            identity.clone(),
            Manifest::new(json!({
                "kind": "crontab.stable.example.com",
                "metadata": {"name": "my-new-cron-object"},
                "spec": {"image": "my-awesome-cron-image", "cronSpec": "* * * * */5"}
            })),
        );

        let patch = Manifest::new(json!({"spec": {"image": "cron-image"}}));
        let mut request = request(patch);
        request.manifest_name =
            Some("crontab.stable.example.com my-new-cron-object".to_string());
        request.options.merge_strategy = caravel_types::MergeStrategy::Merge;

        let result = manager
            .patch_and_wait(&request, CancellationToken::new())
            .await
            .unwrap();
        assert!(result.is_stable());

        let live = cluster.manifest(&identity).unwrap();
        assert_eq!(live.value_at("spec.image"), Some(&json!("cron-image")));
        assert_eq!(
            live.value_at("spec.cronSpec"),
            Some(&json!("* * * * */5"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_timed_out_with_patch_applied() {
        let (cluster, manager) = setup();
        cluster.seed(deployment_identity(), live_deployment());
        // readiness never advances: no auto-ready, no driver

        let patch = Manifest::new(json!({
            "spec": {"template": {"metadata": {"labels": {"testPatch": "success"}}}}
        }));
        let result = manager
            .patch_and_wait(&request(patch), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.status, OperationStatus::TimedOut);
        assert!(!result.cancelled);

        // the attempted patch is still reflected in the live resource
        let live = cluster.manifest(&deployment_identity()).unwrap();
        assert_eq!(
            live.value_at("spec.template.metadata.labels.testPatch"),
            Some(&json!("success"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_reports_failed_with_marker() {
        let (cluster, manager) = setup();
        cluster.seed(deployment_identity(), live_deployment());

        let cancel = CancellationToken::new();
        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                cancel.cancel();
            })
        };

        let patch = Manifest::new(json!({
            "spec": {"template": {"metadata": {"labels": {"testPatch": "success"}}}}
        }));
        let result = manager
            .patch_and_wait(&request(patch), cancel)
            .await
            .unwrap();
        canceller.await.unwrap();

        assert_eq!(result.status, OperationStatus::Failed);
        assert!(result.cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_submission_failures_are_retried() {
        let (cluster, manager) = setup();
        cluster.seed(deployment_identity(), live_deployment());
        cluster.set_auto_ready(true);
        cluster.fail_next_patches(2);

        let patch = Manifest::new(json!({
            "spec": {"template": {"metadata": {"labels": {"testPatch": "success"}}}}
        }));
        let result = manager
            .patch_and_wait(&request(patch), CancellationToken::new())
            .await
            .unwrap();

        assert!(result.is_stable());
        assert_eq!(cluster.patch_call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_submission_failure_is_fatal() {
        let (cluster, manager) = setup();
        cluster.seed(deployment_identity(), live_deployment());
        cluster.fail_next_patches(10);

        let patch = Manifest::new(json!({
            "spec": {"template": {"metadata": {"labels": {"testPatch": "success"}}}}
        }));
        let err = manager
            .patch_and_wait(&request(patch), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PatchError::Cluster(ClusterError::RetriesExhausted { attempts: 3, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_target_is_fatal() {
        let (_cluster, manager) = setup();
        let patch = Manifest::new(json!({"spec": {}}));
        let err = manager
            .patch_and_wait(&request(patch), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PatchError::Cluster(ClusterError::TargetNotFound(_))
        ));
    }
}
