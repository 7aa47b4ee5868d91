//! Main CaravelControlPlane implementation
//!
//! The control plane owns the task table: each submitted request runs as one
//! tokio task with its own cancellation token, and its terminal outcome is
//! recorded for status polling.

use crate::error::{ControlPlaneError, Result};
use crate::task::{TaskRecord, TaskStatus};
use caravel_cluster::ClusterTransport;
use caravel_deploy::PatchManager;
use caravel_stability::{StabilityConfig, StabilityMonitor};
use caravel_types::{OperationResult, PatchEventEnvelope, PatchManifestRequest, TaskId};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

struct TaskEntry {
    record: TaskRecord,
    cancel: CancellationToken,
    finished_rx: watch::Receiver<bool>,
    handle: Option<JoinHandle<()>>,
}

/// Unified entry point for patch operations.
pub struct CaravelControlPlane {
    /// Patch pipeline
    manager: Arc<PatchManager>,

    /// Task table, shared with the per-operation tasks
    tasks: Arc<DashMap<TaskId, TaskEntry>>,
}

impl CaravelControlPlane {
    /// Build a control plane over a transport with the given policy table.
    pub fn new(transport: Arc<dyn ClusterTransport>, config: StabilityConfig) -> Self {
        let monitor = Arc::new(StabilityMonitor::new(transport.clone(), config));
        let manager = Arc::new(PatchManager::new(transport, monitor));
        Self::with_manager(manager)
    }

    /// Build a control plane around an existing manager.
    pub fn with_manager(manager: Arc<PatchManager>) -> Self {
        Self {
            manager,
            tasks: Arc::new(DashMap::new()),
        }
    }

    /// Subscribe to operation events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<PatchEventEnvelope> {
        self.manager.subscribe()
    }

    /// Submit a patch request; the operation runs in the background and the
    /// returned handle tracks it to a terminal state.
    #[instrument(skip(self, request), fields(account = %request.account))]
    pub fn submit_patch(&self, request: PatchManifestRequest) -> Result<TaskId> {
        let target = request
            .target_identity()
            .map_err(|e| ControlPlaneError::InvalidRequest(e.to_string()))?;

        let id = TaskId::generate();
        let cancel = CancellationToken::new();
        let (finished_tx, finished_rx) = watch::channel(false);

        let record = TaskRecord {
            id: id.clone(),
            target,
            status: TaskStatus::Running,
            result: None,
            submitted_at: chrono::Utc::now(),
            finished_at: None,
        };

        // The entry must exist before the operation runs, so the completion
        // update always finds it.
        self.tasks.insert(
            id.clone(),
            TaskEntry {
                record,
                cancel: cancel.clone(),
                finished_rx,
                handle: None,
            },
        );

        let manager = self.manager.clone();
        let tasks = self.tasks.clone();
        let task_id = id.clone();
        let handle = tokio::spawn(async move {
            let result = match manager.patch_and_wait(&request, cancel).await {
                Ok(result) => result,
                Err(e) => OperationResult::failed(e.to_string()),
            };
            if let Some(mut entry) = tasks.get_mut(&task_id) {
                entry.record.status = TaskStatus::from_operation(result.status);
                entry.record.finished_at = Some(result.finished_at);
                entry.record.result = Some(result);
            }
            let _ = finished_tx.send(true);
        });
        if let Some(mut entry) = self.tasks.get_mut(&id) {
            entry.handle = Some(handle);
        }

        info!(task_id = %id, "Patch operation submitted");
        Ok(id)
    }

    /// Run one patch operation inline, without task bookkeeping.
    pub async fn patch_and_wait(
        &self,
        request: &PatchManifestRequest,
        cancel: CancellationToken,
    ) -> Result<OperationResult> {
        Ok(self.manager.patch_and_wait(request, cancel).await?)
    }

    /// Current view of a task.
    pub fn task_status(&self, id: &TaskId) -> Result<TaskRecord> {
        self.tasks
            .get(id)
            .map(|entry| entry.record.clone())
            .ok_or_else(|| ControlPlaneError::TaskNotFound(id.clone()))
    }

    /// Block until a task reaches a terminal state.
    pub async fn wait(&self, id: &TaskId) -> Result<TaskRecord> {
        let mut finished_rx = self
            .tasks
            .get(id)
            .map(|entry| entry.finished_rx.clone())
            .ok_or_else(|| ControlPlaneError::TaskNotFound(id.clone()))?;

        if !*finished_rx.borrow() {
            // the sender only drops after marking completion
            let _ = finished_rx.changed().await;
        }
        self.task_status(id)
    }

    /// Request cancellation of a running task.
    pub fn cancel(&self, id: &TaskId) -> Result<()> {
        let entry = self
            .tasks
            .get(id)
            .ok_or_else(|| ControlPlaneError::TaskNotFound(id.clone()))?;
        entry.cancel.cancel();
        info!(task_id = %id, "Cancellation requested");
        Ok(())
    }

    /// All known tasks.
    pub fn tasks(&self) -> Vec<TaskRecord> {
        self.tasks.iter().map(|e| e.record.clone()).collect()
    }
}

impl Drop for CaravelControlPlane {
    fn drop(&mut self) {
        // Abort operations still in flight
        for entry in self.tasks.iter() {
            if let Some(handle) = &entry.handle {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caravel_cluster::InMemoryCluster;
    use caravel_stability::KindPolicy;
    use caravel_types::{
        Manifest, PatchEvent, PatchOptions, ResourceKind, TargetIdentity,
    };
    use serde_json::json;
    use std::time::Duration;

    fn fast_config() -> StabilityConfig {
        let fast = KindPolicy {
            poll_interval: Duration::from_millis(100),
            timeout: Duration::from_secs(5),
        };
        StabilityConfig::default()
            .with_policy(ResourceKind::Deployment, fast.clone())
            .with_default_policy(fast)
    }

    fn identity() -> TargetIdentity {
        TargetIdentity::new("account1", "testns", ResourceKind::Deployment, "deployment1")
    }

    fn live_deployment() -> Manifest {
        Manifest::new(json!({
            "kind": "deployment",
            "metadata": {"name": "deployment1", "namespace": "testns"},
            "spec": {"replicas": 1, "template": {"metadata": {"labels": {}}}},
            "status": {"readyReplicas": 0, "observedGeneration": 1}
        }))
    }

    fn label_request() -> PatchManifestRequest {
        PatchManifestRequest {
            account: "account1".to_string(),
            location: "testns".to_string(),
            manifest_name: Some("deployment deployment1".to_string()),
            patch_body: Manifest::new(json!({
                "spec": {"template": {"metadata": {"labels": {"testPatch": "success"}}}}
            })),
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

    fn setup() -> (Arc<InMemoryCluster>, CaravelControlPlane) {
        let cluster = Arc::new(InMemoryCluster::new());
        cluster.seed(identity(), live_deployment());
        let control_plane = CaravelControlPlane::new(cluster.clone(), fast_config());
        (cluster, control_plane)
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_and_wait_succeeds() {
        let (cluster, control_plane) = setup();
        cluster.set_auto_ready(true);

        let task_id = control_plane.submit_patch(label_request()).unwrap();

        let running = control_plane.task_status(&task_id).unwrap();
        assert_eq!(running.target, identity());

        let record = control_plane.wait(&task_id).await.unwrap();
        assert_eq!(record.status, TaskStatus::Succeeded);
        assert!(record.is_terminal());
        assert!(record.result.unwrap().is_stable());
        assert!(record.finished_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_surfaces_as_timed_out() {
        let (_cluster, control_plane) = setup();

        let task_id = control_plane.submit_patch(label_request()).unwrap();
        let record = control_plane.wait(&task_id).await.unwrap();

        assert_eq!(record.status, TaskStatus::TimedOut);
        let result = record.result.unwrap();
        assert!(!result.cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_surfaces_as_failed_with_marker() {
        let (_cluster, control_plane) = setup();

        let task_id = control_plane.submit_patch(label_request()).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        control_plane.cancel(&task_id).unwrap();

        let record = control_plane.wait(&task_id).await.unwrap();
        assert_eq!(record.status, TaskStatus::Failed);
        assert!(record.result.unwrap().cancelled);
    }

    #[tokio::test]
    async fn test_unknown_task() {
        let (_cluster, control_plane) = setup();
        let unknown = TaskId::generate();
        assert!(matches!(
            control_plane.task_status(&unknown),
            Err(ControlPlaneError::TaskNotFound(_))
        ));
        assert!(control_plane.cancel(&unknown).is_err());
    }

    #[tokio::test]
    async fn test_invalid_request_rejected_at_submission() {
        let (_cluster, control_plane) = setup();
        let mut request = label_request();
        request.manifest_name = Some("deployment".to_string());
        assert!(matches!(
            control_plane.submit_patch(request),
            Err(ControlPlaneError::InvalidRequest(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_are_observable() {
        let (cluster, control_plane) = setup();
        cluster.set_auto_ready(true);

        let mut events = control_plane.subscribe_events();
        let task_id = control_plane.submit_patch(label_request()).unwrap();
        control_plane.wait(&task_id).await.unwrap();

        let first = events.recv().await.unwrap();
        assert!(matches!(first.event, PatchEvent::OperationStarted { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_operations_on_distinct_targets_run_concurrently() {
        let cluster = Arc::new(InMemoryCluster::new());
        let id1 = identity();
        let id2 = TargetIdentity::new("account1", "testns", ResourceKind::Deployment, "deployment2");
        cluster.seed(id1, live_deployment());
        let mut second = live_deployment();
        second.set_value_at("metadata.name", json!("deployment2"));
        cluster.seed(id2, second);
        cluster.set_auto_ready(true);

        let control_plane = CaravelControlPlane::new(cluster, fast_config());

        let task1 = control_plane.submit_patch(label_request()).unwrap();
        let mut request2 = label_request();
        request2.manifest_name = Some("deployment deployment2".to_string());
        let task2 = control_plane.submit_patch(request2).unwrap();

        assert_eq!(
            control_plane.wait(&task1).await.unwrap().status,
            TaskStatus::Succeeded
        );
        assert_eq!(
            control_plane.wait(&task2).await.unwrap().status,
            TaskStatus::Succeeded
        );
        assert_eq!(control_plane.tasks().len(), 2);
    }
}
