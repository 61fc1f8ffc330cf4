//! Cycle State.
//!
//! Owned by one orchestrator invocation and turned into a [`CycleResult`] when
//! the cycle ends. Never shared between cycles.

use chrono::{DateTime, Utc};
use pmcr_core::{
    Bound, CyclePhase, CycleResult, CycleStatus, CycleTrace, Intent, IterationRecord, PmcrError,
};
use tracing::trace;
use uuid::Uuid;

/// Mutable state of one running cycle.
#[derive(Debug)]
pub struct CycleState {
    pub cycle_id: String,

    /// Id of the caller's original intent.
    pub intent_id: String,

    /// Intent the current pass works on.
    pub current_intent: Intent,

    /// Completed passes in order.
    pub history: Vec<IterationRecord>,

    pub events: CycleTrace,

    phase: CyclePhase,
    started_at: DateTime<Utc>,
}

impl CycleState {
    /// Seed the state with the caller's intent at iteration 0.
    pub fn new(intent: Intent) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), intent)
    }

    /// Seed the state under a caller-chosen cycle id.
    pub fn with_id(cycle_id: impl Into<String>, intent: Intent) -> Self {
        Self {
            cycle_id: cycle_id.into(),
            intent_id: intent.id.clone(),
            current_intent: intent,
            history: Vec::new(),
            events: CycleTrace::new(),
            phase: CyclePhase::Planning,
            started_at: Utc::now(),
        }
    }

    /// Index of the pass in progress, equal to the number of completed passes.
    pub fn iteration(&self) -> u32 {
        self.history.len() as u32
    }

    /// Index of the pass the cycle is at: the pass in flight while a stage
    /// runs, the last completed pass once it has been evaluated.
    pub fn current_pass(&self) -> u32 {
        match self.phase {
            CyclePhase::Evaluating | CyclePhase::Looping => self.iteration().saturating_sub(1),
            _ => self.iteration(),
        }
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn enter(&mut self, phase: CyclePhase) {
        trace!(cycle_id = %self.cycle_id, iteration = self.iteration(), ?phase, "Phase transition");
        self.phase = phase;
    }

    /// Append a completed pass with the status it ended in.
    pub fn complete(&mut self, mut record: IterationRecord, status: CycleStatus) {
        record.status = status;
        self.history.push(record);
    }

    /// Completed pass with the highest confidence; the later pass wins ties.
    pub fn best(&self) -> Option<&IterationRecord> {
        self.history.iter().rev().fold(None, |best: Option<&IterationRecord>, record| match best {
            Some(b) if b.validation.confidence_score >= record.validation.confidence_score => Some(b),
            _ => Some(record),
        })
    }

    /// Last completed pass.
    pub fn last(&self) -> Option<&IterationRecord> {
        self.history.last()
    }

    /// Close the state into a result.
    ///
    /// `Failed` carries no artifact. `Converged` and an iteration-ceiling
    /// abort carry the last pass; any other abort carries the best pass.
    pub fn finish(mut self, status: CycleStatus, error: Option<PmcrError>) -> CycleResult {
        self.enter(CyclePhase::from(status));

        let selected = match (status, &error) {
            (CycleStatus::Failed, _) => None,
            (
                CycleStatus::Aborted,
                Some(PmcrError::Cancelled { .. })
                | Some(PmcrError::BoundExceeded {
                    bound: Bound::Deadline { .. },
                }),
            ) => self.best(),
            _ => self.last(),
        };
        let (artifact, reflection) = match selected {
            Some(record) => (Some(record.artifact.clone()), Some(record.reflection.clone())),
            None => (None, None),
        };

        CycleResult {
            cycle_id: self.cycle_id,
            intent_id: self.intent_id,
            status,
            artifact,
            reflection,
            iterations: self.history.len() as u32,
            trace: self.history,
            events: self.events,
            error,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}
