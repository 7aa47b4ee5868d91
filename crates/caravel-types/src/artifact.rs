//! Artifacts and binding sets
//!
//! An artifact is a resolved build output, typically a container image with
//! a concrete tag. A binding set pairs the full candidate list with the
//! subset that must bind.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A resolved build output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Unqualified locator, e.g. `index.docker.io/library/nginx`
    pub name: String,

    /// Artifact kind, e.g. `docker/image`
    #[serde(rename = "type")]
    pub artifact_type: String,

    /// Fully qualified locator, e.g. `index.docker.io/library/nginx:1.18`
    pub reference: String,

    /// Tag/digest portion, e.g. `1.18`
    pub version: String,
}

/// Artifact validation errors.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// `reference` is not `name` + separator + `version`.
    #[error("artifact {name}: reference '{reference}' is not '{name}{separator}{version}'")]
    MalformedReference {
        name: String,
        reference: String,
        version: String,
        separator: char,
    },
}

impl Artifact {
    /// Build a docker-image artifact, deriving the reference from
    /// name and version.
    pub fn docker(name: impl Into<String>, version: impl Into<String>) -> Self {
        let name = name.into();
        let version = version.into();
        Self {
            reference: format!("{}:{}", name, version),
            name,
            artifact_type: "docker/image".to_string(),
            version,
        }
    }

    /// Separator between name and version for this artifact type.
    pub fn separator(&self) -> char {
        // docker/image and friends all join name and tag with a colon
        ':'
    }

    /// Check the reference is derivable from name + version.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        let expected = format!("{}{}{}", self.name, self.separator(), self.version);
        if self.reference != expected {
            return Err(ArtifactError::MalformedReference {
                name: self.name.clone(),
                reference: self.reference.clone(),
                version: self.version.clone(),
                separator: self.separator(),
            });
        }
        Ok(())
    }

    /// Whether this artifact is a candidate for the given placeholder value.
    pub fn matches(&self, placeholder: &str) -> bool {
        self.name == placeholder
    }
}

/// Candidate artifacts for one operation: the ordered full list plus the
/// subset that must bind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactBindingSet {
    /// All candidates, in request order
    pub all: Vec<Artifact>,

    /// Candidates that must bind; they win over optional candidates for the
    /// same placeholder regardless of order in `all`
    pub required: Vec<Artifact>,
}

/// Binding set validation errors.
#[derive(Debug, Error)]
pub enum BindingSetError {
    /// A required artifact has no same-name counterpart in the full list.
    #[error("required artifact '{0}' is missing from the candidate list")]
    RequiredNotInCandidates(String),
}

impl ArtifactBindingSet {
    pub fn new(all: Vec<Artifact>, required: Vec<Artifact>) -> Self {
        Self { all, required }
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty() && self.required.is_empty()
    }

    /// Check every required artifact also appears (by name) in `all`.
    pub fn validate(&self) -> Result<(), BindingSetError> {
        for required in &self.required {
            if !self.all.iter().any(|a| a.name == required.name) {
                return Err(BindingSetError::RequiredNotInCandidates(
                    required.name.clone(),
                ));
            }
        }
        Ok(())
    }

    /// Required candidates for a placeholder.
    pub fn required_for(&self, placeholder: &str) -> Vec<&Artifact> {
        self.required
            .iter()
            .filter(|a| a.matches(placeholder))
            .collect()
    }

    /// First optional candidate for a placeholder, in `all` order.
    pub fn first_candidate_for(&self, placeholder: &str) -> Option<&Artifact> {
        self.all.iter().find(|a| a.matches(placeholder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docker_reference_derivation() {
        let artifact = Artifact::docker("index.docker.io/library/nginx", "1.18");
        assert_eq!(artifact.reference, "index.docker.io/library/nginx:1.18");
        assert_eq!(artifact.artifact_type, "docker/image");
        artifact.validate().unwrap();
    }

    #[test]
    fn test_malformed_reference_rejected() {
        let mut artifact = Artifact::docker("nginx", "1.18");
        artifact.reference = "nginx@sha256:deadbeef".to_string();
        assert!(artifact.validate().is_err());
    }

    #[test]
    fn test_binding_set_validation() {
        let required = Artifact::docker("nginx", "1.18");
        let set = ArtifactBindingSet::new(vec![required.clone()], vec![required.clone()]);
        set.validate().unwrap();

        let orphan = ArtifactBindingSet::new(vec![], vec![required]);
        assert!(orphan.validate().is_err());
    }

    #[test]
    fn test_wire_field_names() {
        let json = r#"{
            "name": "index.docker.io/library/nginx",
            "type": "docker/image",
            "reference": "index.docker.io/library/nginx:1.18",
            "version": "1.18"
        }"#;
        let artifact: Artifact = serde_json::from_str(json).unwrap();
        assert_eq!(artifact.artifact_type, "docker/image");
        assert_eq!(artifact.version, "1.18");
    }
}
