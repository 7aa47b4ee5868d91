//! Caravel Stability - Readiness polling for patched resources
//!
//! After a patch is submitted, the resource is polled until it satisfies a
//! kind-specific readiness condition, times out, or fails terminally. The
//! monitor is the only component here that touches external state; readiness
//! checks themselves are pure functions over fetched manifests.
//!
//! ## Key Components
//!
//! - [`ReadinessCheck`]: closed set of kind-specific readiness predicates
//! - [`StabilityConfig`]: read-only per-kind polling policy table
//! - [`StabilityMonitor`]: the cancellable poll loop

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod config;
pub mod error;
pub mod monitor;
pub mod readiness;

// Re-exports
pub use config::{KindPolicy, StabilityConfig};
pub use error::{Result, StabilityError};
pub use monitor::{
    StabilityEvent, StabilityMonitor, StabilizationOutcome, StabilizationReport,
};
pub use readiness::{readiness_check, ReadinessCheck, StabilityExpectations};
