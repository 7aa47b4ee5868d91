//! Kind-specific readiness predicates
//!
//! Dispatch is a lookup over a closed set of known kinds plus a generic
//! fallback, not open-ended runtime dispatch. Each check is a pure function
//! over a fetched manifest.

use caravel_types::{Manifest, ResourceKind};
use serde_json::Value;

/// What the monitor expects of the target once the patch has landed.
#[derive(Debug, Clone, Default)]
pub struct StabilityExpectations {
    /// Generation recorded at submission; status older than this is stale
    pub min_generation: Option<i64>,

    /// For generic kinds: a patched field that must equal the requested
    /// value before the resource counts as settled
    pub expected_field: Option<(String, Value)>,
}

/// Readiness predicate for one resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessCheck {
    /// Workload with replica semantics: ready replicas match desired and
    /// status is current
    WorkloadReplicas,

    /// CRD: the `Established` condition is true
    CrdEstablished,

    /// Anything else: fetchable, and the patched field (when known)
    /// reflects the requested value
    GenericExists,
}

/// Look up the readiness check for a kind.
pub fn readiness_check(kind: &ResourceKind) -> ReadinessCheck {
    match kind {
        ResourceKind::Deployment => ReadinessCheck::WorkloadReplicas,
        ResourceKind::CustomResourceDefinition => ReadinessCheck::CrdEstablished,
        ResourceKind::Custom(_) => ReadinessCheck::GenericExists,
    }
}

impl ReadinessCheck {
    /// Name for logging.
    pub fn name(&self) -> &str {
        match self {
            ReadinessCheck::WorkloadReplicas => "workload-replicas",
            ReadinessCheck::CrdEstablished => "crd-established",
            ReadinessCheck::GenericExists => "generic-exists",
        }
    }

    /// Whether the fetched manifest satisfies this check.
    pub fn is_ready(&self, manifest: &Manifest, expectations: &StabilityExpectations) -> bool {
        match self {
            ReadinessCheck::WorkloadReplicas => {
                let desired = manifest
                    .value_at("spec.replicas")
                    .and_then(Value::as_i64)
                    .unwrap_or(1);
                let ready = manifest
                    .value_at("status.readyReplicas")
                    .and_then(Value::as_i64)
                    .unwrap_or(0);
                if ready != desired {
                    return false;
                }
                // Ignore status written before the patch landed.
                if let Some(min) = expectations.min_generation {
                    let observed = manifest
                        .value_at("status.observedGeneration")
                        .and_then(Value::as_i64)
                        .unwrap_or(0);
                    if observed < min {
                        return false;
                    }
                }
                true
            }
            ReadinessCheck::CrdEstablished => condition_is_true(manifest, "Established"),
            ReadinessCheck::GenericExists => match &expectations.expected_field {
                Some((path, expected)) => manifest.value_at(path) == Some(expected),
                None => true,
            },
        }
    }

    /// Terminal failure condition for this kind, if the manifest reports one.
    pub fn terminal_failure(&self, manifest: &Manifest) -> Option<String> {
        match self {
            ReadinessCheck::WorkloadReplicas => {
                let conditions = manifest.value_at("status.conditions")?.as_array()?;
                for condition in conditions {
                    let kind = condition.get("type").and_then(Value::as_str);
                    let status = condition.get("status").and_then(Value::as_str);
                    let reason = condition.get("reason").and_then(Value::as_str);
                    if kind == Some("Progressing")
                        && status == Some("False")
                        && reason == Some("ProgressDeadlineExceeded")
                    {
                        let message = condition
                            .get("message")
                            .and_then(Value::as_str)
                            .unwrap_or("rollout progress deadline exceeded");
                        return Some(message.to_string());
                    }
                }
                None
            }
            // CRDs and custom resources time out rather than fail terminally.
            ReadinessCheck::CrdEstablished | ReadinessCheck::GenericExists => None,
        }
    }
}

fn condition_is_true(manifest: &Manifest, condition_type: &str) -> bool {
    manifest
        .value_at("status.conditions")
        .and_then(Value::as_array)
        .map(|conditions| {
            conditions.iter().any(|c| {
                c.get("type").and_then(Value::as_str) == Some(condition_type)
                    && c.get("status").and_then(Value::as_str) == Some("True")
            })
        })
        .unwrap_or(false)
}
