//! Step-by-step trace of a cycle.
//!
//! Every stage attempt, evaluation and terminal transition is appended as a
//! [`TraceEvent`]. The trace keeps a SHA-256 Merkle root over its events so a
//! stored or transmitted trace can be checked for tampering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{CycleStatus, StageKind};

/// Root reported for an empty trace.
const EMPTY_ROOT: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// What happened at one point of the cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEventKind {
    /// A stage call was issued.
    StageStarted { stage: StageKind, attempt: u32 },
    /// A stage call returned a usable reply.
    StageCompleted { stage: StageKind, attempt: u32 },
    /// A transient failure will be retried after `backoff_ms`.
    StageRetrying {
        stage: StageKind,
        attempt: u32,
        cause: String,
        backoff_ms: u64,
    },
    /// A stage call failed for good.
    StageFailed { stage: StageKind, cause: String },
    /// The Convergence Evaluator decided.
    Evaluated { decision: String },
    /// A refined intent replaced the current one.
    IntentRefined { intent_id: String },
    /// The cycle stopped.
    Terminated { status: CycleStatus, reason: String },
}

/// One entry of the trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Position in the trace, starting at 0.
    pub sequence: u64,

    /// Iteration the event belongs to.
    pub iteration: u32,

    /// What happened.
    pub kind: TraceEventKind,

    /// When it happened.
    pub timestamp: DateTime<Utc>,

    /// How long the operation took, if it was timed.
    pub duration_ms: Option<u64>,
}

impl TraceEvent {
    /// The stage this event concerns, if any.
    pub fn stage(&self) -> Option<StageKind> {
        match &self.kind {
            TraceEventKind::StageStarted { stage, .. }
            | TraceEventKind::StageCompleted { stage, .. }
            | TraceEventKind::StageRetrying { stage, .. }
            | TraceEventKind::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Ordered, digest-protected list of trace events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleTrace {
    pub events: Vec<TraceEvent>,
    pub merkle_root: String,
}

impl Default for CycleTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleTrace {
    /// Create an empty trace.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            merkle_root: EMPTY_ROOT.to_string(),
        }
    }

    /// Append an event stamped with the current time.
    pub fn record(&mut self, iteration: u32, kind: TraceEventKind, duration_ms: Option<u64>) {
        let event = TraceEvent {
            sequence: self.events.len() as u64,
            iteration,
            kind,
            timestamp: Utc::now(),
            duration_ms,
        };
        self.events.push(event);
        self.merkle_root = self.compute_merkle_root();
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Compute the Merkle root of the events.
    pub fn compute_merkle_root(&self) -> String {
        if self.events.is_empty() {
            return EMPTY_ROOT.to_string();
        }

        let mut hashes: Vec<Vec<u8>> = self
            .events
            .iter()
            .map(|event| {
                let json = serde_json::to_string(event).unwrap_or_default();
                Sha256::digest(json.as_bytes()).to_vec()
            })
            .collect();

        while hashes.len() > 1 {
            hashes = hashes
                .chunks(2)
                .map(|pair| {
                    let mut hasher = Sha256::new();
                    hasher.update(&pair[0]);
                    // Odd node is paired with itself.
                    hasher.update(pair.get(1).unwrap_or(&pair[0]));
                    hasher.finalize().to_vec()
                })
                .collect();
        }

        hashes
            .first()
            .map(|h| h.iter().map(|b| format!("{:02x}", b)).collect())
            .unwrap_or_else(|| EMPTY_ROOT.to_string())
    }

    /// Verify the stored root matches the events.
    pub fn verify(&self) -> bool {
        self.merkle_root == self.compute_merkle_root()
    }

    /// Number of stage calls that were retried.
    pub fn retry_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, TraceEventKind::StageRetrying { .. }))
            .count()
    }

    /// Number of stage calls issued to `stage`, retries included.
    pub fn calls_to(&self, stage: StageKind) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(&e.kind, TraceEventKind::StageStarted { stage: s, .. } if *s == stage))
            .count()
    }
}
