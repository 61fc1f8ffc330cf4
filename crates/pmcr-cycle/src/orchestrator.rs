//! The cycle orchestrator.
//!
//! Drives Plan → Make → Check → Reflect → Evaluate as an explicit loop until
//! the evaluator converges, a bound is crossed, the caller cancels, or a stage
//! fails for good. Every exit yields a [`CycleResult`].

use std::time::Duration;

use pmcr_core::protocol::{CheckRequest, MakeRequest, PlanRequest, ReflectRequest};
use pmcr_core::{
    Artifact, Bound, CycleConfig, CyclePhase, CycleResult, CycleStatus, Intent, IterationRecord,
    PmcrError, Plan, Reflection, Result, StageError, StageKind, TraceEventKind, Validation,
};
use pmcr_stages::StageSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::evaluator::{evaluate, Decision};
use crate::resolve::resolve_artifact_type;
use crate::retry::{invoke_with_retry, millis};
use crate::state::CycleState;

/// How the loop ended.
enum Termination {
    Converged,
    Failed(PmcrError),
    Aborted(PmcrError),
}

/// Runs cycles against an injected set of stages.
///
/// Holds no per-cycle state, so one orchestrator can serve many concurrent
/// cycles.
#[derive(Debug, Clone)]
pub struct CycleOrchestrator {
    stages: StageSet,
    config: CycleConfig,
}

impl CycleOrchestrator {
    /// Create an orchestrator. Fails if `config` is invalid.
    pub fn new(stages: StageSet, config: CycleConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { stages, config })
    }

    pub fn config(&self) -> &CycleConfig {
        &self.config
    }

    pub fn stages(&self) -> &StageSet {
        &self.stages
    }

    /// Run one cycle to completion.
    pub async fn run_cycle(&self, intent: Intent) -> CycleResult {
        self.run_cycle_with_cancel(intent, CancellationToken::new()).await
    }

    /// Run one cycle, aborting when `cancel` fires.
    pub async fn run_cycle_with_cancel(&self, intent: Intent, cancel: CancellationToken) -> CycleResult {
        let state = CycleState::new(intent);
        self.run_state(state, cancel).await
    }

    /// Run one cycle under a caller-chosen cycle id.
    pub async fn run_cycle_as(
        &self,
        cycle_id: impl Into<String>,
        intent: Intent,
        cancel: CancellationToken,
    ) -> CycleResult {
        let state = CycleState::with_id(cycle_id, intent);
        self.run_state(state, cancel).await
    }

    #[instrument(name = "cycle", skip_all, fields(cycle_id = %state.cycle_id, intent_id = %state.intent_id))]
    async fn run_state(&self, mut state: CycleState, cancel: CancellationToken) -> CycleResult {
        if let Err(err) = state.current_intent.validate() {
            warn!("Rejected intent: {}", err);
            return terminate(state, Termination::Failed(err));
        }

        info!(
            max_iterations = self.config.max_iterations,
            policy = ?self.config.policy,
            "🔁 Cycle started"
        );

        let deadline = self.config.cycle_deadline;
        let termination = tokio::select! {
            biased;
            _ = cancel.cancelled() => Termination::Aborted(PmcrError::Cancelled {
                reason: "cancelled by caller".to_string(),
            }),
            _ = deadline_elapsed(deadline) => Termination::Aborted(PmcrError::BoundExceeded {
                bound: Bound::Deadline {
                    limit_ms: deadline.map(millis).unwrap_or_default(),
                },
            }),
            termination = self.drive(&mut state) => termination,
        };

        terminate(state, termination)
    }

    /// The state machine proper. Interruption by cancel or deadline drops
    /// this future, discarding the pass in flight.
    async fn drive(&self, state: &mut CycleState) -> Termination {
        loop {
            let iteration = state.iteration();

            let record = match self.run_iteration(state, iteration).await {
                Ok(record) => record,
                Err(err) => {
                    warn!(iteration, stage = %err.stage, transient = err.transient, "Stage failed: {}", err.cause);
                    state.events.record(
                        iteration,
                        TraceEventKind::StageFailed {
                            stage: err.stage,
                            cause: err.cause.clone(),
                        },
                        None,
                    );
                    return Termination::Failed(PmcrError::Stage(err));
                }
            };

            state.enter(CyclePhase::Evaluating);
            let decision = evaluate(self.config.policy, &record.validation, &record.reflection);
            state.events.record(
                iteration,
                TraceEventKind::Evaluated {
                    decision: decision.to_string(),
                },
                None,
            );

            match decision {
                Decision::Converged => {
                    if record.reflection.has_refinement() {
                        info!(iteration, insight = %record.reflection.insight, "Valid artifact; refinement not applied");
                    }
                    info!(iteration, confidence = record.validation.confidence_score, "✅ Cycle converged");
                    state.complete(record, CycleStatus::Converged);
                    return Termination::Converged;
                }
                Decision::Stall => {
                    let issues = record.validation.issues.clone();
                    state.complete(record, CycleStatus::Failed);
                    return Termination::Failed(PmcrError::ConvergenceStall { iteration, issues });
                }
                Decision::Iterate(content) => {
                    if iteration + 1 >= self.config.max_iterations {
                        state.complete(record, CycleStatus::Aborted);
                        return Termination::Aborted(PmcrError::BoundExceeded {
                            bound: Bound::Iterations {
                                limit: self.config.max_iterations,
                            },
                        });
                    }

                    let next = state.current_intent.refine(content);
                    info!(iteration, next_intent = %next.id, "Looping with refined intent");
                    state.complete(record, CycleStatus::Iterating);
                    state.events.record(
                        iteration,
                        TraceEventKind::IntentRefined {
                            intent_id: next.id.clone(),
                        },
                        None,
                    );
                    state.current_intent = next;
                    state.enter(CyclePhase::Looping);
                }
            }
        }
    }

    /// One Plan → Make → Check → Reflect pass on the current intent.
    async fn run_iteration(
        &self,
        state: &mut CycleState,
        iteration: u32,
    ) -> std::result::Result<IterationRecord, StageError> {
        let intent = state.current_intent.clone();
        let policy = &self.config.retry;
        let timeout = self.config.per_stage_timeout;

        state.enter(CyclePhase::Planning);
        let reply = invoke_with_retry(StageKind::Plan, policy, timeout, &mut state.events, iteration, || {
            self.stages.plan.invoke(PlanRequest::from(&intent))
        })
        .await?;
        if reply.original_intent_id != intent.id {
            return Err(StageError::malformed(
                StageKind::Plan,
                format!(
                    "plan references intent '{}' instead of '{}'",
                    reply.original_intent_id, intent.id
                ),
            ));
        }
        let mut plan = Plan::from(reply);
        if plan.id.trim().is_empty() || !plan.is_actionable() {
            return Err(StageError::malformed(StageKind::Plan, "plan has no id or no steps"));
        }
        plan.inherit_context(&intent.context);

        state.enter(CyclePhase::Making);
        let artifact_type = resolve_artifact_type(&intent, &plan, &self.config.default_artifact_type);
        let request = MakeRequest::for_plan(&plan, artifact_type.clone());
        let reply = invoke_with_retry(StageKind::Make, policy, timeout, &mut state.events, iteration, || {
            self.stages.make.invoke(request.clone())
        })
        .await?;
        if !reply.success {
            return Err(StageError::permanent(
                StageKind::Make,
                format!("make reported failure: {}", reply.error_message),
            ));
        }
        if reply.artifact_id.trim().is_empty() || reply.content.trim().is_empty() {
            return Err(StageError::malformed(StageKind::Make, "artifact has no id or no content"));
        }
        let artifact_type = if reply.artifact_type.trim().is_empty() {
            artifact_type
        } else {
            reply.artifact_type
        };
        let artifact = Artifact::new(reply.artifact_id, plan.id.clone(), reply.content, artifact_type);

        state.enter(CyclePhase::Checking);
        let reply = invoke_with_retry(StageKind::Check, policy, timeout, &mut state.events, iteration, || {
            self.stages.check.invoke(CheckRequest::from(&artifact))
        })
        .await?;
        let validation = Validation::from(reply);
        validation
            .check_invariants()
            .map_err(|detail| StageError::malformed(StageKind::Check, detail))?;

        state.enter(CyclePhase::Reflecting);
        let reply = invoke_with_retry(StageKind::Reflect, policy, timeout, &mut state.events, iteration, || {
            self.stages.reflect.invoke(ReflectRequest::from(&validation))
        })
        .await?;
        let reflection = Reflection::from(reply);

        Ok(IterationRecord {
            iteration,
            intent,
            plan,
            artifact,
            validation,
            reflection,
            status: CycleStatus::Iterating,
        })
    }
}

async fn deadline_elapsed(deadline: Option<Duration>) {
    match deadline {
        Some(deadline) => tokio::time::sleep(deadline).await,
        None => std::future::pending().await,
    }
}

fn terminate(mut state: CycleState, termination: Termination) -> CycleResult {
    let (status, error) = match termination {
        Termination::Converged => (CycleStatus::Converged, None),
        Termination::Failed(err) => (CycleStatus::Failed, Some(err)),
        Termination::Aborted(err) => (CycleStatus::Aborted, Some(err)),
    };

    let reason = error
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "converged".to_string());
    let iteration = state.current_pass();
    state
        .events
        .record(iteration, TraceEventKind::Terminated { status, reason: reason.clone() }, None);

    match status {
        CycleStatus::Converged => {}
        CycleStatus::Aborted => warn!(iterations = state.iteration(), "Cycle aborted: {}", reason),
        _ => warn!(iterations = state.iteration(), "❌ Cycle failed: {}", reason),
    }

    state.finish(status, error)
}
