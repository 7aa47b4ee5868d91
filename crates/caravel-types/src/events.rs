//! Operation event stream
//!
//! Events emitted along the patch pipeline, wrapped in an envelope carrying
//! source, severity and timestamp.

use crate::identity::TargetIdentity;
use serde::{Deserialize, Serialize};

/// Severity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSeverity {
    Info,
    Warning,
    Error,
}

/// Subsystem that emitted an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSource {
    Manager,
    Submitter,
    Monitor,
    ControlPlane,
}

/// Events emitted during a patch operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PatchEvent {
    /// Pipeline entered for a target.
    OperationStarted { target: TargetIdentity },

    /// Artifact placeholders were bound.
    ArtifactsBound {
        target: TargetIdentity,
        references: Vec<String>,
    },

    /// Merged manifest was accepted by the cluster.
    PatchSubmitted {
        target: TargetIdentity,
        generation: Option<i64>,
    },

    /// Readiness polling started.
    StabilizationStarted { target: TargetIdentity },

    /// Target reached its readiness condition.
    OperationStable { target: TargetIdentity },

    /// Readiness was not observed within the deadline.
    OperationTimedOut { target: TargetIdentity },

    /// Operation failed.
    OperationFailed {
        target: TargetIdentity,
        reason: String,
    },

    /// Operation was cancelled by the caller.
    OperationCancelled { target: TargetIdentity },
}

impl PatchEvent {
    /// Default severity for this event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            PatchEvent::OperationFailed { .. } => EventSeverity::Error,
            PatchEvent::OperationTimedOut { .. } | PatchEvent::OperationCancelled { .. } => {
                EventSeverity::Warning
            }
            _ => EventSeverity::Info,
        }
    }

    /// The target this event concerns.
    pub fn target(&self) -> &TargetIdentity {
        match self {
            PatchEvent::OperationStarted { target }
            | PatchEvent::ArtifactsBound { target, .. }
            | PatchEvent::PatchSubmitted { target, .. }
            | PatchEvent::StabilizationStarted { target }
            | PatchEvent::OperationStable { target }
            | PatchEvent::OperationTimedOut { target }
            | PatchEvent::OperationFailed { target, .. }
            | PatchEvent::OperationCancelled { target } => target,
        }
    }
}

/// Envelope around a patch event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchEventEnvelope {
    pub event: PatchEvent,
    pub source: EventSource,
    pub severity: EventSeverity,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl PatchEventEnvelope {
    pub fn new(event: PatchEvent, source: EventSource) -> Self {
        let severity = event.severity();
        Self {
            event,
            source,
            severity,
            timestamp: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::ResourceKind;

    #[test]
    fn test_severity_mapping() {
        let target = TargetIdentity::new("a", "ns", ResourceKind::Deployment, "d1");
        let failed = PatchEvent::OperationFailed {
            target: target.clone(),
            reason: "boom".into(),
        };
        assert_eq!(failed.severity(), EventSeverity::Error);

        let envelope =
            PatchEventEnvelope::new(PatchEvent::OperationStarted { target }, EventSource::Manager);
        assert_eq!(envelope.severity, EventSeverity::Info);
    }
}
