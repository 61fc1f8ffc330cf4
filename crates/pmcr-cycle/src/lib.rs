//! # PMCR Cycle
//!
//! The orchestration engine of the Plan-Make-Check-Reflect cycle.
//!
//! - [`CycleOrchestrator`] - the explicit state machine over injected stages
//! - [`evaluate`] - the Convergence Evaluator
//! - [`resolve_artifact_type`] - which artifact type Make is asked for
//! - [`invoke_with_retry`] - timed stage calls with retry and backoff

pub mod evaluator;
pub mod orchestrator;
pub mod resolve;
pub mod retry;
pub mod state;

pub use evaluator::{evaluate, Decision};
pub use orchestrator::CycleOrchestrator;
pub use resolve::resolve_artifact_type;
pub use retry::invoke_with_retry;
pub use state::CycleState;
pub use tokio_util::sync::CancellationToken;
