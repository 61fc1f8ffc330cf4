//! Stage capability traits.
//!
//! Each stage exposes a single `invoke` operation. A call has no side effects
//! on the cycle; interpreting and storing the reply is the orchestrator's job.
//! Implementations must be safe to share between concurrently running cycles.

use std::sync::Arc;

use async_trait::async_trait;
use pmcr_core::protocol::{
    CheckReply, CheckRequest, MakeReply, MakeRequest, PlanReply, PlanRequest, ReflectReply,
    ReflectRequest,
};
use pmcr_core::StageError;

use crate::{HeuristicChecker, RulePlanner, RuleReflector, TemplateMaker};

/// Turns an intent into ordered steps and resource hints.
#[async_trait]
pub trait PlanStage: Send + Sync {
    async fn invoke(&self, request: PlanRequest) -> Result<PlanReply, StageError>;
}

/// Produces an artifact from a plan.
#[async_trait]
pub trait MakeStage: Send + Sync {
    async fn invoke(&self, request: MakeRequest) -> Result<MakeReply, StageError>;
}

/// Judges an artifact.
#[async_trait]
pub trait CheckStage: Send + Sync {
    async fn invoke(&self, request: CheckRequest) -> Result<CheckReply, StageError>;
}

/// Interprets a judgement and proposes a refined intent.
#[async_trait]
pub trait ReflectStage: Send + Sync {
    async fn invoke(&self, request: ReflectRequest) -> Result<ReflectReply, StageError>;
}

/// The four stage clients injected into an orchestrator.
#[derive(Clone)]
pub struct StageSet {
    pub plan: Arc<dyn PlanStage>,
    pub make: Arc<dyn MakeStage>,
    pub check: Arc<dyn CheckStage>,
    pub reflect: Arc<dyn ReflectStage>,
}

impl StageSet {
    /// Assemble a stage set from four implementations.
    pub fn new(
        plan: Arc<dyn PlanStage>,
        make: Arc<dyn MakeStage>,
        check: Arc<dyn CheckStage>,
        reflect: Arc<dyn ReflectStage>,
    ) -> Self {
        Self {
            plan,
            make,
            check,
            reflect,
        }
    }

    /// In-process rule-based implementations of all four stages.
    pub fn rule_based() -> Self {
        Self::new(
            Arc::new(RulePlanner::new()),
            Arc::new(TemplateMaker::new()),
            Arc::new(HeuristicChecker::new()),
            Arc::new(RuleReflector::new()),
        )
    }

    /// Replace the Plan stage.
    pub fn with_plan(mut self, stage: Arc<dyn PlanStage>) -> Self {
        self.plan = stage;
        self
    }

    /// Replace the Make stage.
    pub fn with_make(mut self, stage: Arc<dyn MakeStage>) -> Self {
        self.make = stage;
        self
    }

    /// Replace the Check stage.
    pub fn with_check(mut self, stage: Arc<dyn CheckStage>) -> Self {
        self.check = stage;
        self
    }

    /// Replace the Reflect stage.
    pub fn with_reflect(mut self, stage: Arc<dyn ReflectStage>) -> Self {
        self.reflect = stage;
        self
    }
}

impl std::fmt::Debug for StageSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageSet").finish_non_exhaustive()
    }
}
