//! Request/reply contracts of the four stages.
//!
//! These are the only shapes the orchestrator exchanges with a stage. They are
//! shared by in-process stage implementations, the HTTP stage endpoints and
//! the HTTP stage clients.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::artifact::{Artifact, Reflection, Validation};
use crate::intent::Intent;
use crate::plan::Plan;

/// Plan stage input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl From<&Intent> for PlanRequest {
    fn from(intent: &Intent) -> Self {
        Self {
            id: intent.id.clone(),
            content: intent.content.clone(),
            context: intent.context.clone(),
        }
    }
}

/// Plan stage output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanReply {
    pub id: String,
    pub original_intent_id: String,
    pub steps: Vec<String>,
    #[serde(default)]
    pub resources: BTreeMap<String, String>,
}

impl From<PlanReply> for Plan {
    fn from(reply: PlanReply) -> Self {
        Plan {
            id: reply.id,
            original_intent_id: reply.original_intent_id,
            steps: reply.steps,
            resources: reply.resources,
        }
    }
}

/// Make stage input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MakeRequest {
    pub plan_id: String,
    pub steps: Vec<String>,
    #[serde(default)]
    pub resources: BTreeMap<String, String>,
    pub artifact_type: String,
}

impl MakeRequest {
    /// Build the request for `plan`, asking for `artifact_type`.
    pub fn for_plan(plan: &Plan, artifact_type: impl Into<String>) -> Self {
        Self {
            plan_id: plan.id.clone(),
            steps: plan.steps.clone(),
            resources: plan.resources.clone(),
            artifact_type: artifact_type.into(),
        }
    }
}

/// Make stage output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MakeReply {
    pub artifact_id: String,
    #[serde(default)]
    pub content: String,
    pub artifact_type: String,
    pub success: bool,
    #[serde(default)]
    pub error_message: String,
}

impl MakeReply {
    /// A successful reply.
    pub fn succeeded(
        artifact_id: impl Into<String>,
        content: impl Into<String>,
        artifact_type: impl Into<String>,
    ) -> Self {
        Self {
            artifact_id: artifact_id.into(),
            content: content.into(),
            artifact_type: artifact_type.into(),
            success: true,
            error_message: String::new(),
        }
    }

    /// A reply reporting that nothing could be made.
    pub fn failed(
        artifact_id: impl Into<String>,
        artifact_type: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            artifact_id: artifact_id.into(),
            content: String::new(),
            artifact_type: artifact_type.into(),
            success: false,
            error_message: error_message.into(),
        }
    }
}

/// Check stage input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRequest {
    pub artifact_id: String,
    pub content: String,
    pub artifact_type: String,
}

impl From<&Artifact> for CheckRequest {
    fn from(artifact: &Artifact) -> Self {
        Self {
            artifact_id: artifact.id.clone(),
            content: artifact.content.clone(),
            artifact_type: artifact.artifact_type.clone(),
        }
    }
}

/// Check stage output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckReply {
    pub is_valid: bool,
    #[serde(default)]
    pub issues: Vec<String>,
    pub confidence_score: f64,
}

impl From<CheckReply> for Validation {
    fn from(reply: CheckReply) -> Self {
        Validation {
            is_valid: reply.is_valid,
            issues: reply.issues,
            confidence_score: reply.confidence_score,
        }
    }
}

impl From<&Validation> for CheckReply {
    fn from(validation: &Validation) -> Self {
        Self {
            is_valid: validation.is_valid,
            issues: validation.issues.clone(),
            confidence_score: validation.confidence_score,
        }
    }
}

/// Reflect stage input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectRequest {
    pub is_valid: bool,
    #[serde(default)]
    pub issues: Vec<String>,
    pub confidence_score: f64,
}

impl From<&Validation> for ReflectRequest {
    fn from(validation: &Validation) -> Self {
        Self {
            is_valid: validation.is_valid,
            issues: validation.issues.clone(),
            confidence_score: validation.confidence_score,
        }
    }
}

/// Reflect stage output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectReply {
    pub insight: String,
    #[serde(default)]
    pub optimized_intent: String,
}

impl From<ReflectReply> for Reflection {
    fn from(reply: ReflectReply) -> Self {
        Reflection {
            insight: reply.insight,
            optimized_intent: reply.optimized_intent,
        }
    }
}

impl From<&Reflection> for ReflectReply {
    fn from(reflection: &Reflection) -> Self {
        Self {
            insight: reflection.insight.clone(),
            optimized_intent: reflection.optimized_intent.clone(),
        }
    }
}
