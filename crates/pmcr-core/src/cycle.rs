//! Cycle configuration and results.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifact::{Artifact, Reflection, Validation};
use crate::error::{PmcrError, Result};
use crate::intent::Intent;
use crate::plan::Plan;
use crate::trace::CycleTrace;
use crate::types::CycleStatus;

/// Number of stage calls in one iteration.
pub const STAGES_PER_ITERATION: u32 = 4;

/// How transient stage failures are retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt. `0` disables retrying.
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds.
    pub initial_backoff_ms: u64,

    /// Upper bound on any single delay, in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 50,
            max_backoff_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy.
    pub fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff_ms,
            max_backoff_ms,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(0, 0, 0)
    }

    /// Exponential delay before retry number `retry` (1-based), capped at
    /// `max_backoff_ms`.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let delay = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_ms);
        Duration::from_millis(delay)
    }

    /// Worst-case total delay spent sleeping between attempts of one call.
    pub fn worst_case_backoff(&self) -> Duration {
        (1..=self.max_retries).map(|r| self.backoff_for(r)).sum()
    }

    fn validate(&self) -> Result<()> {
        if self.max_retries > 0 && self.initial_backoff_ms > self.max_backoff_ms {
            return Err(PmcrError::config(format!(
                "initial_backoff_ms ({}) must not exceed max_backoff_ms ({})",
                self.initial_backoff_ms, self.max_backoff_ms
            )));
        }
        Ok(())
    }
}

/// Which signal the Convergence Evaluator trusts when the two disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConvergencePolicy {
    /// Converged iff the artifact is valid. A valid artifact stops the cycle
    /// even if Reflect proposed a refinement.
    #[default]
    ValidityFirst,
    /// Converged iff Reflect proposed no refinement. A valid artifact with a
    /// proposed refinement keeps iterating.
    ReflectionFirst,
}

/// Bounds and policies for one cycle invocation.
///
/// The iteration ceiling and the per-stage timeout are required inputs, so
/// this type has no `Default`.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleConfig {
    /// Maximum number of Plan→Reflect passes.
    pub max_iterations: u32,

    /// Timeout applied to every individual stage call.
    pub per_stage_timeout: Duration,

    /// Optional wall-clock limit for the whole cycle.
    ///
    /// Measured from the moment the orchestrator starts the cycle. Time a
    /// caller spends before that, such as waiting for a node permit, is not
    /// counted.
    pub cycle_deadline: Option<Duration>,

    /// Retry policy for transient stage failures.
    pub retry: RetryPolicy,

    /// Convergence precedence rule.
    pub policy: ConvergencePolicy,

    /// Artifact type used when neither the intent nor the plan names one.
    pub default_artifact_type: String,
}

impl CycleConfig {
    /// Create a config with the two required bounds.
    pub fn new(max_iterations: u32, per_stage_timeout: Duration) -> Self {
        Self {
            max_iterations,
            per_stage_timeout,
            cycle_deadline: None,
            retry: RetryPolicy::default(),
            policy: ConvergencePolicy::default(),
            default_artifact_type: "text".to_string(),
        }
    }

    /// Set the whole-cycle deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.cycle_deadline = Some(deadline);
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the convergence policy.
    pub fn with_policy(mut self, policy: ConvergencePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the fallback artifact type.
    pub fn with_default_artifact_type(mut self, artifact_type: impl Into<String>) -> Self {
        self.default_artifact_type = artifact_type.into();
        self
    }

    /// Smallest deadline compatible with the other bounds:
    /// `per_stage_timeout × 4 × max_iterations`.
    pub fn minimum_deadline(&self) -> Duration {
        self.per_stage_timeout
            .saturating_mul(STAGES_PER_ITERATION)
            .saturating_mul(self.max_iterations)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(PmcrError::config("max_iterations must be at least 1"));
        }

        if self.per_stage_timeout.is_zero() {
            return Err(PmcrError::config("per_stage_timeout must be positive"));
        }

        if let Some(deadline) = self.cycle_deadline {
            let minimum = self.minimum_deadline();
            if deadline < minimum {
                return Err(PmcrError::config(format!(
                    "cycle_deadline ({}ms) is smaller than per_stage_timeout x 4 x max_iterations ({}ms)",
                    deadline.as_millis(),
                    minimum.as_millis()
                )));
            }
        }

        if self.default_artifact_type.trim().is_empty() {
            return Err(PmcrError::config("default_artifact_type cannot be empty"));
        }

        self.retry.validate()
    }
}

/// The quadruple produced by one Plan→Reflect pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// Iteration index, starting at 0.
    pub iteration: u32,

    /// The intent this pass worked on.
    pub intent: Intent,

    pub plan: Plan,
    pub artifact: Artifact,
    pub validation: Validation,
    pub reflection: Reflection,

    /// How the pass ended: `Iterating` if the cycle looped back, otherwise
    /// the cycle's terminal status.
    pub status: CycleStatus,
}

/// Outcome of one cycle invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleResult {
    /// Identifier of this invocation.
    pub cycle_id: String,

    /// Id of the caller's intent.
    pub intent_id: String,

    /// Terminal status.
    pub status: CycleStatus,

    /// Best artifact available for the status (none when `Failed`).
    pub artifact: Option<Artifact>,

    /// Reflection paired with `artifact`.
    pub reflection: Option<Reflection>,

    /// Number of completed Plan→Reflect passes.
    pub iterations: u32,

    /// Completed passes in order.
    pub trace: Vec<IterationRecord>,

    /// Stage-level events.
    pub events: CycleTrace,

    /// Why the cycle did not converge, if it did not.
    pub error: Option<PmcrError>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CycleResult {
    /// Returns true if the cycle converged.
    pub fn is_converged(&self) -> bool {
        self.status == CycleStatus::Converged
    }

    /// Validation of the last completed pass.
    pub fn final_validation(&self) -> Option<&Validation> {
        self.trace.last().map(|record| &record.validation)
    }

    /// Wall-clock duration of the cycle.
    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}
