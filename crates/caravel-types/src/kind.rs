//! Resource kind taxonomy
//!
//! Kinds the orchestrator understands natively are modeled as a closed set;
//! everything else (custom resources) falls through to `Custom` and is
//! handled with generic semantics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a cluster resource.
///
/// Parsing is case-insensitive on the wire spelling; unrecognized kinds
/// keep their original spelling in `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceKind {
    /// Workload with replica semantics (`deployment`)
    Deployment,

    /// CRD schema object (`customResourceDefinition`)
    CustomResourceDefinition,

    /// Any other kind, handled generically (e.g. `crontab.stable.example.com`)
    Custom(String),
}

impl ResourceKind {
    /// Parse a wire spelling into a kind.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "deployment" => ResourceKind::Deployment,
            "customresourcedefinition" | "crd" => ResourceKind::CustomResourceDefinition,
            _ => ResourceKind::Custom(s.to_string()),
        }
    }

    /// Canonical wire spelling.
    pub fn as_str(&self) -> &str {
        match self {
            ResourceKind::Deployment => "deployment",
            ResourceKind::CustomResourceDefinition => "customResourceDefinition",
            ResourceKind::Custom(s) => s.as_str(),
        }
    }

    /// Whether this kind carries pod-template container lists.
    pub fn has_containers(&self) -> bool {
        matches!(self, ResourceKind::Deployment)
    }
}

impl From<String> for ResourceKind {
    fn from(s: String) -> Self {
        ResourceKind::parse(&s)
    }
}

impl From<&str> for ResourceKind {
    fn from(s: &str) -> Self {
        ResourceKind::parse(s)
    }
}

impl From<ResourceKind> for String {
    fn from(kind: ResourceKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
