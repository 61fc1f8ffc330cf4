//! Artifact, Validation and Reflection values.
//!
//! Each is produced by one stage from the previous stage's output: Make turns
//! a Plan into an Artifact, Check judges it into a Validation, and Reflect
//! turns that judgement into a Reflection.

use serde::{Deserialize, Serialize};

/// Lowest accepted confidence score.
pub const MIN_CONFIDENCE: f64 = 0.0;

/// Highest accepted confidence score.
pub const MAX_CONFIDENCE: f64 = 100.0;

/// Concrete output derived from a Plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Unique identifier for this artifact.
    pub id: String,

    /// The plan this artifact was made from.
    pub plan_id: String,

    /// The produced content.
    pub content: String,

    /// Free-form type tag, e.g. a language or format label.
    pub artifact_type: String,
}

impl Artifact {
    /// Create a new artifact.
    pub fn new(
        id: impl Into<String>,
        plan_id: impl Into<String>,
        content: impl Into<String>,
        artifact_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            plan_id: plan_id.into(),
            content: content.into(),
            artifact_type: artifact_type.into(),
        }
    }

    /// Check has nothing to judge in an empty artifact.
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Pass/fail judgement of an Artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    /// Whether the artifact satisfies the intent.
    pub is_valid: bool,

    /// Diagnostic messages; empty iff `is_valid`.
    #[serde(default)]
    pub issues: Vec<String>,

    /// Confidence in `[0, 100]`.
    pub confidence_score: f64,
}

impl Validation {
    /// A passing validation.
    pub fn valid(confidence_score: f64) -> Self {
        Self {
            is_valid: true,
            issues: Vec::new(),
            confidence_score,
        }
    }

    /// A failing validation with the given issues.
    pub fn invalid<I, S>(issues: I, confidence_score: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            is_valid: false,
            issues: issues.into_iter().map(Into::into).collect(),
            confidence_score,
        }
    }

    /// Check the value invariants, returning a description of the first
    /// violation.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        if !self.confidence_score.is_finite()
            || !(MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&self.confidence_score)
        {
            return Err(format!(
                "confidence score {} outside [{}, {}]",
                self.confidence_score, MIN_CONFIDENCE, MAX_CONFIDENCE
            ));
        }

        match (self.is_valid, self.issues.is_empty()) {
            (true, false) => Err(format!(
                "valid artifact reported {} issue(s)",
                self.issues.len()
            )),
            (false, true) => Err("invalid artifact reported no issues".to_string()),
            _ => Ok(()),
        }
    }
}

/// Meta-analysis of a Validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    /// Human-readable rationale.
    pub insight: String,

    /// Refined goal statement; empty means "no refinement".
    #[serde(default)]
    pub optimized_intent: String,
}

impl Reflection {
    /// Create a new reflection.
    pub fn new(insight: impl Into<String>, optimized_intent: impl Into<String>) -> Self {
        Self {
            insight: insight.into(),
            optimized_intent: optimized_intent.into(),
        }
    }

    /// A reflection that asks for no further refinement.
    pub fn settled(insight: impl Into<String>) -> Self {
        Self::new(insight, String::new())
    }

    /// Returns true if Reflect proposed a refined intent.
    pub fn has_refinement(&self) -> bool {
        !self.optimized_intent.trim().is_empty()
    }
}
