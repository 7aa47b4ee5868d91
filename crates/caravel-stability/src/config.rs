//! Stabilization policy configuration
//!
//! Per-kind polling policies, read-only after initialization. Kinds without
//! an explicit entry use the default policy.

use caravel_types::ResourceKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Polling policy for one resource kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KindPolicy {
    /// Delay between readiness polls
    pub poll_interval: Duration,

    /// Total time allowed before the operation is reported timed out
    pub timeout: Duration,
}

impl Default for KindPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Process-wide stabilization policy table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityConfig {
    /// Per-kind overrides
    pub policies: HashMap<ResourceKind, KindPolicy>,

    /// Policy for kinds without an override
    pub default_policy: KindPolicy,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        let mut policies = HashMap::new();
        policies.insert(
            ResourceKind::Deployment,
            KindPolicy {
                poll_interval: Duration::from_secs(2),
                timeout: Duration::from_secs(600),
            },
        );
        policies.insert(
            ResourceKind::CustomResourceDefinition,
            KindPolicy {
                poll_interval: Duration::from_secs(1),
                timeout: Duration::from_secs(120),
            },
        );

        Self {
            policies,
            default_policy: KindPolicy::default(),
        }
    }
}

impl StabilityConfig {
    /// Add or replace a per-kind policy.
    pub fn with_policy(mut self, kind: ResourceKind, policy: KindPolicy) -> Self {
        self.policies.insert(kind, policy);
        self
    }

    /// Replace the default policy.
    pub fn with_default_policy(mut self, policy: KindPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    /// Policy for a kind, falling back to the default.
    pub fn policy_for(&self, kind: &ResourceKind) -> &KindPolicy {
        self.policies.get(kind).unwrap_or(&self.default_policy)
    }
}
