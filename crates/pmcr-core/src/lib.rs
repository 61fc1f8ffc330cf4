//! # PMCR Core
//!
//! Core primitives and types for the Plan-Make-Check-Reflect cycle.
//!
//! This crate provides the fundamental building blocks:
//! - [`Intent`] - The caller's goal statement and constraints
//! - [`Plan`], [`Artifact`], [`Validation`], [`Reflection`] - Stage outputs
//! - [`protocol`] - Request/reply contracts of the four stages
//! - [`api`] - Request/reply types of the node's cycle API
//! - [`CycleConfig`] and [`CycleResult`] - Invocation bounds and outcome
//! - [`PmcrError`] and [`StageError`] - Error taxonomy

pub mod api;
pub mod artifact;
pub mod cycle;
pub mod error;
pub mod intent;
pub mod plan;
pub mod protocol;
pub mod trace;
pub mod types;

// Re-exports for convenience
pub use api::{CycleAccepted, CycleEntry, RunCycleRequest};
pub use artifact::{Artifact, Reflection, Validation};
pub use cycle::{ConvergencePolicy, CycleConfig, CycleResult, IterationRecord, RetryPolicy};
pub use error::{Bound, PmcrError, Result, StageError};
pub use intent::{Intent, IntentBuilder};
pub use plan::Plan;
pub use trace::{CycleTrace, TraceEvent, TraceEventKind};
pub use types::*;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::artifact::{Artifact, Reflection, Validation};
    pub use crate::cycle::{ConvergencePolicy, CycleConfig, CycleResult, RetryPolicy};
    pub use crate::error::{PmcrError, Result, StageError};
    pub use crate::intent::{Intent, IntentBuilder};
    pub use crate::plan::Plan;
    pub use crate::types::{CycleStatus, StageKind};
}
