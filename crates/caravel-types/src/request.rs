//! Patch request wire contract
//!
//! The request shape consumed from the task API. Field names are the
//! observable contract and serialize in camelCase. Optional knobs live in an
//! explicit options structure with defaulted fields rather than a sparse map.

use crate::artifact::{Artifact, ArtifactBindingSet};
use crate::identity::{IdentityError, TargetIdentity};
use crate::manifest::Manifest;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How the patch body combines with the live manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    /// Merge named list elements by key; objects merge recursively
    Strategic,

    /// Same list-merge semantics as `strategic`
    Merge,

    /// RFC 7396 deep merge: arrays replace wholesale, null deletes
    #[default]
    JsonMerge,
}

impl MergeStrategy {
    /// Whether list-of-named-objects fields merge element-wise by key.
    pub fn merges_lists_by_key(&self) -> bool {
        matches!(self, MergeStrategy::Strategic | MergeStrategy::Merge)
    }
}

/// Per-request options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatchOptions {
    /// Merge strategy, `json-merge` when unspecified
    pub merge_strategy: MergeStrategy,
}

/// One patch-manifest operation request.
///
/// Constructed per orchestration call and immutable once submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchManifestRequest {
    /// Credential/account to operate under
    pub account: String,

    /// Target namespace
    pub location: String,

    /// Target as `"<kind> <name>"`
    #[serde(default)]
    pub manifest_name: Option<String>,

    /// The partial manifest to apply
    pub patch_body: Manifest,

    /// Merge options
    #[serde(default)]
    pub options: PatchOptions,

    /// All candidate artifacts, in priority order
    #[serde(default)]
    pub all_artifacts: Vec<Artifact>,

    /// Artifacts that must bind
    #[serde(default)]
    pub required_artifacts: Vec<Artifact>,

    /// Target-selection hints; first entry is the fallback when
    /// `manifestName` is absent
    #[serde(default)]
    pub manifests: Vec<Manifest>,

    /// Passed through untouched to the traffic subsystem
    #[serde(default)]
    pub traffic_management: Option<Value>,

    /// Passed through untouched
    #[serde(default)]
    pub moniker: Option<Value>,

    /// Passed through untouched
    #[serde(default)]
    pub enable_traffic: Option<bool>,

    /// When true the patch body was submitted verbatim, bypassing any
    /// templated-expression pre-evaluation performed upstream
    #[serde(default)]
    pub skip_expression_evaluation: Option<bool>,
}

impl PatchManifestRequest {
    /// Resolve the identity this request targets.
    pub fn target_identity(&self) -> Result<TargetIdentity, IdentityError> {
        if let Some(name) = self.manifest_name.as_deref().filter(|s| !s.trim().is_empty()) {
            return TargetIdentity::from_manifest_name(&self.account, &self.location, name);
        }
        let hint = self.manifests.first().ok_or(IdentityError::MissingTarget)?;
        TargetIdentity::from_manifest(&self.account, &self.location, hint)
    }

    /// The artifact binding set carried by this request.
    pub fn binding_set(&self) -> ArtifactBindingSet {
        ArtifactBindingSet::new(self.all_artifacts.clone(), self.required_artifacts.clone())
    }
}
