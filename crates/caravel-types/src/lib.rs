//! Caravel Types - Core types for manifest patch orchestration
//!
//! Caravel is the orchestration core behind the "patch manifest" deployment
//! operation: merge a partial patch into a live cluster resource, bind
//! container-image placeholders to build artifacts, submit the result, and
//! wait for the resource to stabilize.
//!
//! ## Architectural Boundaries
//!
//! - **caravel-types** owns: the data model (manifests, identities,
//!   artifacts, the patch request contract, operation results, events)
//! - **caravel-cluster** owns: the transport boundary to the cluster
//! - **caravel-deploy** owns: the patch pipeline (resolve, merge, submit)
//! - **caravel-stability** owns: readiness polling and failure classification
//!
//! ## Key Concepts
//!
//! - **Manifest**: generic structured description of a cluster resource
//! - **TargetIdentity**: kind + name + namespace + account of a live resource
//! - **Artifact**: a resolved build output (e.g. a container image)
//! - **PatchManifestRequest**: the wire contract consumed from the task API
//! - **OperationResult**: terminal outcome of one patch-and-stabilize run

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod artifact;
pub mod events;
pub mod identity;
pub mod ids;
pub mod kind;
pub mod manifest;
pub mod operation;
pub mod request;

// Re-export main types
pub use artifact::{Artifact, ArtifactBindingSet, ArtifactError, BindingSetError};
pub use events::{EventSeverity, EventSource, PatchEvent, PatchEventEnvelope};
pub use identity::{IdentityError, TargetIdentity};
pub use ids::TaskId;
pub use kind::ResourceKind;
pub use manifest::Manifest;
pub use operation::{OperationResult, OperationStatus};
pub use request::{MergeStrategy, PatchManifestRequest, PatchOptions};
