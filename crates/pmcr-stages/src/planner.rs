//! Rule-based Plan stage.

use std::collections::BTreeMap;

use async_trait::async_trait;
use pmcr_core::protocol::{PlanReply, PlanRequest};
use pmcr_core::{StageError, StageKind};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::stage::PlanStage;
use crate::task::{
    detect_language, Approach, TaskKind, RESOURCE_APPROACH, RESOURCE_LANGUAGE, RESOURCE_TASK,
};

/// Configuration for the planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Maximum number of steps allowed in a plan.
    pub max_steps: usize,

    /// Add one step per caller constraint.
    pub constraint_steps: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_steps: 16,
            constraint_steps: true,
        }
    }
}

/// Derives a plan from keywords in the intent.
#[derive(Debug, Clone, Default)]
pub struct RulePlanner {
    config: PlannerConfig,
}

impl RulePlanner {
    /// Create a planner with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a planner with custom configuration.
    pub fn with_config(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// Get the planner configuration.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    fn steps_for(&self, request: &PlanRequest, task: TaskKind, approach: Option<Approach>) -> Vec<String> {
        let mut steps = vec![format!("Clarify the goal: {}", request.content.trim())];

        if self.config.constraint_steps {
            for (key, value) in &request.context {
                steps.push(format!("Honour constraint {} = {}", key, value));
            }
        }

        match approach {
            Some(approach) => steps.push(format!("Use an {} approach", approach_phrase(approach))),
            None => steps.push("Start from the most direct formulation".to_string()),
        }

        steps.push(format!("Implement the {} solution", task.as_str()));
        steps.push("Verify the result against the goal".to_string());

        steps.truncate(self.config.max_steps.max(1));
        steps
    }
}

fn approach_phrase(approach: Approach) -> &'static str {
    match approach {
        Approach::Iterative => "iterative, loop-based",
        Approach::Recursive => "recursive",
    }
}

#[async_trait]
impl PlanStage for RulePlanner {
    async fn invoke(&self, request: PlanRequest) -> Result<PlanReply, StageError> {
        if request.content.trim().is_empty() {
            return Err(StageError::permanent(StageKind::Plan, "intent content is empty"));
        }

        let task = TaskKind::detect(&request.content);
        let approach = Approach::detect(&request.content);

        let mut resources = BTreeMap::new();
        resources.insert(RESOURCE_TASK.to_string(), task.as_str().to_string());
        if let Some(approach) = approach {
            resources.insert(RESOURCE_APPROACH.to_string(), approach.as_str().to_string());
        }
        if let Some(language) = detect_language(&request.content) {
            resources.insert(RESOURCE_LANGUAGE.to_string(), language.to_string());
        }

        let steps = self.steps_for(&request, task, approach);
        debug!(intent_id = %request.id, steps = steps.len(), task = task.as_str(), "Planned intent");

        Ok(PlanReply {
            id: Uuid::new_v4().to_string(),
            original_intent_id: request.id,
            steps,
            resources,
        })
    }
}
