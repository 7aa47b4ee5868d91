//! Artifact binding
//!
//! Walks the image-bearing fields of a patch body and substitutes
//! placeholder references (images without a tag) with resolved artifact
//! references. Required candidates win over optional candidates for the same
//! placeholder regardless of list order; two required candidates with
//! different references for one placeholder are a configuration conflict.

use crate::error::{PatchError, Result};
use caravel_types::{Artifact, ArtifactBindingSet, Manifest, ResourceKind};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Outcome of artifact binding.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Patch body with placeholders substituted
    pub manifest: Manifest,

    /// Artifacts that bound, in field order
    pub bound: Vec<Artifact>,

    /// Names from the required set that never bound
    pub unresolved_required: Vec<String>,
}

/// Container-list paths that can carry image references, per kind.
fn container_list_paths(kind: &ResourceKind) -> &'static [&'static str] {
    match kind {
        ResourceKind::Deployment => &[
            "spec.template.spec.containers",
            "spec.template.spec.initContainers",
        ],
        _ => &[],
    }
}

/// An image value without a tag or digest is a placeholder awaiting binding.
fn is_placeholder(image: &str) -> bool {
    let last = image.rsplit('/').next().unwrap_or(image);
    !last.contains(':') && !last.contains('@')
}

/// Bind artifact references into a patch body.
///
/// Pure: returns a new manifest value, never mutates the input.
pub fn resolve_artifacts(
    patch_body: &Manifest,
    kind: &ResourceKind,
    bindings: &ArtifactBindingSet,
) -> Result<Resolution> {
    bindings
        .validate()
        .map_err(|e| PatchError::InvalidBindingSet(e.to_string()))?;

    let mut manifest = patch_body.clone();
    let mut bound = Vec::new();
    let mut bound_names: HashSet<String> = HashSet::new();

    if !bindings.is_empty() {
        for path in container_list_paths(kind) {
            let Some(Value::Array(containers)) = manifest.value_at_mut(path) else {
                continue;
            };
            for container in containers.iter_mut() {
                let placeholder = match container.get("image").and_then(Value::as_str) {
                    Some(image) if is_placeholder(image) => image.to_string(),
                    _ => continue,
                };

                let required = bindings.required_for(&placeholder);
                let references: BTreeSet<&str> =
                    required.iter().map(|a| a.reference.as_str()).collect();
                if references.len() > 1 {
                    return Err(PatchError::AmbiguousArtifact {
                        name: placeholder,
                        references: references.into_iter().map(String::from).collect(),
                    });
                }

                let chosen = required
                    .first()
                    .copied()
                    .or_else(|| bindings.first_candidate_for(&placeholder));

                if let Some(artifact) = chosen {
                    debug!(
                        placeholder = %placeholder,
                        reference = %artifact.reference,
                        required = !required.is_empty(),
                        "Bound artifact"
                    );
                    if let Some(slot) = container.get_mut("image") {
                        *slot = Value::String(artifact.reference.clone());
                    }
                    bound_names.insert(artifact.name.clone());
                    bound.push(artifact.clone());
                }
            }
        }
    }

    let mut unresolved_required = Vec::new();
    for required in &bindings.required {
        if !bound_names.contains(&required.name)
            && !unresolved_required.contains(&required.name)
        {
            unresolved_required.push(required.name.clone());
        }
    }

    Ok(Resolution {
        manifest,
        bound,
        unresolved_required,
    })
}
