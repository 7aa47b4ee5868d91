//! In-memory cluster backend
//!
//! Suitable for development and testing. Behaves like the real thing where
//! the pipeline can observe it: patches bump `metadata.generation`, status
//! survives spec patches, and readiness is driven explicitly (or
//! automatically with `set_auto_ready`).

use crate::error::{ClusterError, Result};
use crate::transport::ClusterTransport;
use async_trait::async_trait;
use caravel_types::{Manifest, ResourceKind, TargetIdentity};
use dashmap::DashMap;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// In-memory cluster transport.
pub struct InMemoryCluster {
    resources: DashMap<TargetIdentity, Manifest>,

    /// Fail the next N patch calls with a transient transport error.
    fail_next_patches: AtomicU32,

    /// Mark resources ready immediately on patch.
    auto_ready: AtomicBool,

    get_calls: AtomicU64,
    patch_calls: AtomicU64,
    status_calls: AtomicU64,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self {
            resources: DashMap::new(),
            fail_next_patches: AtomicU32::new(0),
            auto_ready: AtomicBool::new(false),
            get_calls: AtomicU64::new(0),
            patch_calls: AtomicU64::new(0),
            status_calls: AtomicU64::new(0),
        }
    }

    /// Seed a live resource. Ensures `metadata.generation` is present.
    pub fn seed(&self, identity: TargetIdentity, mut manifest: Manifest) {
        if manifest.generation().is_none() {
            manifest.set_value_at("metadata.generation", json!(1));
        }
        self.resources.insert(identity, manifest);
    }

    /// Current stored manifest for a target.
    pub fn manifest(&self, identity: &TargetIdentity) -> Option<Manifest> {
        self.resources.get(identity).map(|m| m.clone())
    }

    /// Fail the next `n` patch calls with a transient transport error.
    pub fn fail_next_patches(&self, n: u32) {
        self.fail_next_patches.store(n, Ordering::SeqCst);
    }

    /// When enabled, every successful patch immediately marks the resource
    /// ready for its kind.
    pub fn set_auto_ready(&self, enabled: bool) {
        self.auto_ready.store(enabled, Ordering::SeqCst);
    }

    /// Drive a stored resource to its ready state.
    pub fn mark_ready(&self, identity: &TargetIdentity) {
        if let Some(mut entry) = self.resources.get_mut(identity) {
            mark_ready_manifest(&identity.kind, &mut entry);
        }
    }

    /// Set `status.readyReplicas` on a stored workload resource.
    pub fn set_ready_replicas(&self, identity: &TargetIdentity, ready: u64) {
        if let Some(mut entry) = self.resources.get_mut(identity) {
            entry.set_value_at("status.readyReplicas", json!(ready));
        }
    }

    pub fn get_call_count(&self) -> u64 {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn patch_call_count(&self) -> u64 {
        self.patch_calls.load(Ordering::SeqCst)
    }

    pub fn status_call_count(&self) -> u64 {
        self.status_calls.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryCluster {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply the kind-appropriate ready state to a manifest.
fn mark_ready_manifest(kind: &ResourceKind, manifest: &mut Manifest) {
    match kind {
        ResourceKind::Deployment => {
            let replicas = manifest
                .value_at("spec.replicas")
                .and_then(Value::as_u64)
                .unwrap_or(1);
            let generation = manifest.generation().unwrap_or(1);
            manifest.set_value_at("status.readyReplicas", json!(replicas));
            manifest.set_value_at("status.observedGeneration", json!(generation));
        }
        ResourceKind::CustomResourceDefinition => {
            manifest.set_value_at(
                "status.conditions",
                json!([{"type": "Established", "status": "True"}]),
            );
        }
        ResourceKind::Custom(_) => {}
    }
}

#[async_trait]
impl ClusterTransport for InMemoryCluster {
    async fn get(&self, identity: &TargetIdentity) -> Result<Manifest> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.resources
            .get(identity)
            .map(|m| m.clone())
            .ok_or_else(|| ClusterError::TargetNotFound(identity.clone()))
    }

    async fn patch(&self, identity: &TargetIdentity, manifest: &Manifest) -> Result<Manifest> {
        self.patch_calls.fetch_add(1, Ordering::SeqCst);

        loop {
            let pending = self.fail_next_patches.load(Ordering::SeqCst);
            if pending == 0 {
                break;
            }
            if self
                .fail_next_patches
                .compare_exchange(pending, pending - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Err(ClusterError::Transport {
                    reason: "injected transient failure".to_string(),
                });
            }
        }

        let mut entry = self
            .resources
            .get_mut(identity)
            .ok_or_else(|| ClusterError::TargetNotFound(identity.clone()))?;

        let previous_generation = entry.generation().unwrap_or(0);
        let previous_status = entry.value_at("status").cloned();

        let mut stored = manifest.clone();
        stored.set_value_at("metadata.generation", json!(previous_generation + 1));
        if stored.value_at("status").is_none() {
            if let Some(status) = previous_status {
                stored.set_value_at("status", status);
            }
        }
        if self.auto_ready.load(Ordering::SeqCst) {
            mark_ready_manifest(&identity.kind, &mut stored);
        }

        *entry = stored.clone();
        Ok(stored)
    }

    async fn get_status(&self, identity: &TargetIdentity) -> Result<Manifest> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.resources
            .get(identity)
            .map(|m| m.clone())
            .ok_or_else(|| ClusterError::TargetNotFound(identity.clone()))
    }
}
