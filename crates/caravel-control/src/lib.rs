//! # Caravel Control Plane
//!
//! Unified facade over the patch pipeline. One call submits a patch request;
//! the operation runs as its own cancellable task and its terminal outcome
//! is surfaced through a polled task handle.
//!
//! ## Key Components
//!
//! - [`CaravelControlPlane`]: entry point for submitting and tracking operations
//! - [`TaskRecord`] / [`TaskStatus`]: the asynchronous task handle contract
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use caravel_cluster::InMemoryCluster;
//! use caravel_control::CaravelControlPlane;
//! use caravel_stability::StabilityConfig;
//!
//! # async fn example(request: caravel_types::PatchManifestRequest) {
//! let cluster = Arc::new(InMemoryCluster::new());
//! let control_plane = CaravelControlPlane::new(cluster, StabilityConfig::default());
//!
//! let task_id = control_plane.submit_patch(request).unwrap();
//! let record = control_plane.wait(&task_id).await.unwrap();
//! println!("operation finished: {}", record.status);
//! # }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod control_plane;
pub mod error;
pub mod task;

// Re-exports
pub use control_plane::CaravelControlPlane;
pub use error::{ControlPlaneError, Result};
pub use task::{TaskRecord, TaskStatus};
