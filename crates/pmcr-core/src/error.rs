//! Error types for the Plan-Make-Check-Reflect cycle.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::StageKind;

/// A failed call to one of the four stages.
///
/// `transient` failures (timeouts, transport errors) may be retried by the
/// orchestrator; permanent ones (malformed replies, rejected input) may not.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{stage} stage failed: {cause}")]
pub struct StageError {
    /// The stage that failed.
    pub stage: StageKind,

    /// Human-readable cause.
    pub cause: String,

    /// Whether the call is eligible for retry.
    pub transient: bool,
}

impl StageError {
    /// Create a retryable stage error.
    pub fn transient(stage: StageKind, cause: impl Into<String>) -> Self {
        Self {
            stage,
            cause: cause.into(),
            transient: true,
        }
    }

    /// Create a non-retryable stage error.
    pub fn permanent(stage: StageKind, cause: impl Into<String>) -> Self {
        Self {
            stage,
            cause: cause.into(),
            transient: false,
        }
    }

    /// Create a permanent error for a reply that broke the stage contract.
    pub fn malformed(stage: StageKind, detail: impl std::fmt::Display) -> Self {
        Self::permanent(stage, format!("malformed reply: {}", detail))
    }
}

/// Which bound forced a cycle to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "bound", rename_all = "snake_case")]
pub enum Bound {
    /// The iteration ceiling was reached.
    Iterations { limit: u32 },
    /// The whole-cycle deadline elapsed.
    Deadline { limit_ms: u64 },
}

impl std::fmt::Display for Bound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bound::Iterations { limit } => write!(f, "iteration ceiling of {}", limit),
            Bound::Deadline { limit_ms } => write!(f, "cycle deadline of {}ms", limit_ms),
        }
    }
}

/// Main error type for cycle operations.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PmcrError {
    /// The caller supplied a malformed intent. No stage was invoked.
    #[error("Intent validation failed: {message}")]
    InputInvalid {
        intent_id: Option<String>,
        message: String,
    },

    /// A stage call failed and was not (or no longer) retried.
    #[error(transparent)]
    Stage(StageError),

    /// Check rejected the artifact but Reflect offered no refinement.
    #[error("Cycle stalled at iteration {iteration}: artifact invalid and no refinement offered")]
    ConvergenceStall { iteration: u32, issues: Vec<String> },

    /// The iteration ceiling or the cycle deadline was crossed.
    #[error("Cycle stopped after reaching the {bound}")]
    BoundExceeded { bound: Bound },

    /// The caller cancelled the cycle.
    #[error("Cycle cancelled: {reason}")]
    Cancelled { reason: String },

    /// Configuration is invalid.
    #[error("Invalid configuration: {message}")]
    ConfigInvalid { message: String },

    /// Serialization/deserialization error.
    #[error("Serialization error: {message}")]
    SerializationError { message: String },

    /// Connection error.
    #[error("Connection error: {message}")]
    ConnectionError { message: String },

    /// Resource not found.
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    /// Internal error (should not happen).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PmcrError {
    /// Returns true if this error is recoverable by retrying.
    pub fn is_recoverable(&self) -> bool {
        match self {
            PmcrError::Stage(err) => err.transient,
            PmcrError::ConnectionError { .. } => true,
            _ => false,
        }
    }

    /// Returns the stage that failed, if the error came from a stage call.
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            PmcrError::Stage(err) => Some(err.stage),
            _ => None,
        }
    }

    /// Shorthand for an invalid-input error.
    pub fn input(intent_id: Option<String>, message: impl Into<String>) -> Self {
        PmcrError::InputInvalid {
            intent_id,
            message: message.into(),
        }
    }

    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        PmcrError::ConfigInvalid {
            message: message.into(),
        }
    }
}

impl From<StageError> for PmcrError {
    fn from(err: StageError) -> Self {
        PmcrError::Stage(err)
    }
}

/// Convenience Result type for cycle operations.
pub type Result<T> = std::result::Result<T, PmcrError>;

impl From<serde_json::Error> for PmcrError {
    fn from(err: serde_json::Error) -> Self {
        PmcrError::SerializationError {
            message: err.to_string(),
        }
    }
}
