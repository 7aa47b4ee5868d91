//! Target identity
//!
//! Kind + name + namespace + account uniquely identify the live resource an
//! operation acts on. The identity doubles as the serialization key: at most
//! one patch-and-stabilize operation may be in flight per identity.

use crate::kind::ResourceKind;
use crate::manifest::Manifest;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Identity of a live cluster resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetIdentity {
    /// Credential/account the resource lives under
    pub account: String,

    /// Namespace (the request's `location`)
    pub namespace: String,

    /// Resource kind
    pub kind: ResourceKind,

    /// Resource name
    pub name: String,
}

/// Errors resolving a target identity from a request.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// `manifestName` was not of the form `<kind> <name>`.
    #[error("manifest name '{0}' is not of the form '<kind> <name>'")]
    MalformedManifestName(String),

    /// Neither `manifestName` nor a usable `manifests` hint was supplied.
    #[error("request carries no manifest name and no target manifest hint")]
    MissingTarget,
}

impl TargetIdentity {
    pub fn new(
        account: impl Into<String>,
        namespace: impl Into<String>,
        kind: ResourceKind,
        name: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            namespace: namespace.into(),
            kind,
            name: name.into(),
        }
    }

    /// Parse a `"<kind> <name>"` manifest name into an identity.
    pub fn from_manifest_name(
        account: &str,
        location: &str,
        manifest_name: &str,
    ) -> Result<Self, IdentityError> {
        let mut parts = manifest_name.trim().splitn(2, ' ');
        let kind = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| IdentityError::MalformedManifestName(manifest_name.to_string()))?;
        let name = parts
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| IdentityError::MalformedManifestName(manifest_name.to_string()))?;

        Ok(Self::new(
            account,
            location,
            ResourceKind::parse(kind),
            name,
        ))
    }

    /// Derive an identity from a manifest fragment used as a target hint.
    pub fn from_manifest(
        account: &str,
        location: &str,
        manifest: &Manifest,
    ) -> Result<Self, IdentityError> {
        let kind = manifest.resource_kind().ok_or(IdentityError::MissingTarget)?;
        let name = manifest.name().ok_or(IdentityError::MissingTarget)?;
        Ok(Self::new(account, location, kind, name))
    }
}

impl fmt::Display for TargetIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{} {}",
            self.account, self.namespace, self.kind, self.name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_manifest_name() {
        let id =
            TargetIdentity::from_manifest_name("account1", "testns", "deployment deployment1")
                .unwrap();
        assert_eq!(id.kind, ResourceKind::Deployment);
        assert_eq!(id.name, "deployment1");
        assert_eq!(id.namespace, "testns");
    }

    #[test]
    fn test_parse_custom_kind_manifest_name() {
        let id = TargetIdentity::from_manifest_name(
            "account1",
            "testns",
            "crontab.stable.example.com my-new-cron-object",
        )
        .unwrap();
        assert_eq!(
            id.kind,
            ResourceKind::Custom("crontab.stable.example.com".to_string())
        );
        assert_eq!(id.name, "my-new-cron-object");
    }

    #[test]
    fn test_malformed_manifest_name() {
        assert!(TargetIdentity::from_manifest_name("a", "ns", "deployment").is_err());
        assert!(TargetIdentity::from_manifest_name("a", "ns", "").is_err());
    }

    #[test]
    fn test_from_manifest_hint() {
        let manifest = Manifest::new(json!({
            "kind": "deployment",
            "metadata": {"name": "deployment1"}
        }));
        let id = TargetIdentity::from_manifest("account1", "testns", &manifest).unwrap();
        assert_eq!(id.name, "deployment1");
        assert_eq!(id.kind, ResourceKind::Deployment);
    }
}
