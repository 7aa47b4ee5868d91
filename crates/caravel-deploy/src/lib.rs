//! Caravel Deploy - The patch pipeline
//!
//! Orchestrates one patch-manifest operation end to end:
//!
//! 1. Resolve the target identity and validate the artifact binding set
//! 2. Fetch the live manifest
//! 3. Bind container-image placeholders to artifacts (pure)
//! 4. Merge the patch into the live state per the selected strategy (pure)
//! 5. Submit the merged manifest (bounded retry)
//! 6. Wait for the target to stabilize (cancellable)
//!
//! Resolution and merge failures are reported strictly before submission:
//! the cluster is never mutated on a doomed request.
//!
//! ## Architectural Boundaries
//!
//! - `caravel-cluster` owns: transport and submission retry
//! - `caravel-stability` owns: readiness polling
//! - `caravel-deploy` owns: the pure transforms, per-target serialization,
//!   and pipeline sequencing

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod artifacts;
pub mod error;
pub mod locks;
pub mod manager;
pub mod merge;

// Re-exports
pub use artifacts::{resolve_artifacts, Resolution};
pub use error::{PatchError, Result};
pub use locks::IdentityLockArena;
pub use manager::PatchManager;
pub use merge::merge;
