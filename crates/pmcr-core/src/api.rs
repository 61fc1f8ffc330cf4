//! Wire types of the node's cycle API.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cycle::CycleResult;
use crate::error::Result;
use crate::intent::Intent;
use crate::types::CycleStatus;

/// Body of `POST /api/v1/cycle` and `POST /api/v1/cycles`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunCycleRequest {
    /// Intent id. Generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub content: String,

    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl RunCycleRequest {
    /// Build the intent this request describes.
    pub fn into_intent(self) -> Result<Intent> {
        let mut builder = Intent::builder().content(self.content).contexts(self.context);
        if let Some(id) = self.id {
            builder = builder.id(id);
        }
        builder.build()
    }
}

impl From<&Intent> for RunCycleRequest {
    fn from(intent: &Intent) -> Self {
        Self {
            id: Some(intent.id.clone()),
            content: intent.content.clone(),
            context: intent.context.clone(),
        }
    }
}

/// Reply of `POST /api/v1/cycles`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleAccepted {
    pub cycle_id: String,
    pub intent_id: String,
}

/// A cycle known to the node, running or finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleEntry {
    pub cycle_id: String,
    pub intent_id: String,

    /// `Iterating` while the cycle runs, its terminal status afterwards.
    pub status: CycleStatus,

    pub started_at: DateTime<Utc>,

    /// Set once the cycle has finished.
    #[serde(default)]
    pub result: Option<CycleResult>,
}

impl CycleEntry {
    /// Entry for a cycle that has just been started.
    pub fn running(cycle_id: impl Into<String>, intent_id: impl Into<String>) -> Self {
        Self {
            cycle_id: cycle_id.into(),
            intent_id: intent_id.into(),
            status: CycleStatus::Iterating,
            started_at: Utc::now(),
            result: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.result.is_none()
    }

    /// Store the final result.
    pub fn finish(&mut self, result: CycleResult) {
        self.status = result.status;
        self.result = Some(result);
    }
}
