//! Common types used across the cycle.

use serde::{Deserialize, Serialize};

/// One of the four cognitive stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Plan,
    Make,
    Check,
    Reflect,
}

impl StageKind {
    /// All stages in execution order.
    pub const ORDER: [StageKind; 4] = [
        StageKind::Plan,
        StageKind::Make,
        StageKind::Check,
        StageKind::Reflect,
    ];

    /// Lowercase name, also used as the URL path segment of the stage endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Plan => "plan",
            StageKind::Make => "make",
            StageKind::Check => "check",
            StageKind::Reflect => "reflect",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a cycle, or of a single iteration within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    /// Validation passed; no further refinement needed.
    Converged,
    /// The pass produced a refined intent and the cycle looped back.
    Iterating,
    /// A stage failed permanently, the input was rejected, or the cycle stalled.
    Failed,
    /// A bound was crossed or the caller cancelled.
    Aborted,
}

impl CycleStatus {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CycleStatus::Iterating)
    }

    /// Returns true if the cycle ended successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, CycleStatus::Converged)
    }
}

/// States of the orchestrator's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Planning,
    Making,
    Checking,
    Reflecting,
    Evaluating,
    Looping,
    Converged,
    Failed,
    Aborted,
}

impl CyclePhase {
    /// The phase that invokes `stage`.
    pub fn for_stage(stage: StageKind) -> Self {
        match stage {
            StageKind::Plan => CyclePhase::Planning,
            StageKind::Make => CyclePhase::Making,
            StageKind::Check => CyclePhase::Checking,
            StageKind::Reflect => CyclePhase::Reflecting,
        }
    }

    /// Returns true if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CyclePhase::Converged | CyclePhase::Failed | CyclePhase::Aborted
        )
    }
}

impl From<CycleStatus> for CyclePhase {
    fn from(status: CycleStatus) -> Self {
        match status {
            CycleStatus::Converged => CyclePhase::Converged,
            CycleStatus::Iterating => CyclePhase::Looping,
            CycleStatus::Failed => CyclePhase::Failed,
            CycleStatus::Aborted => CyclePhase::Aborted,
        }
    }
}
