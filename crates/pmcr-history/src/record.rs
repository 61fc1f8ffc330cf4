//! Cycle records.

use chrono::{DateTime, Utc};
use pmcr_core::CycleResult;
use serde::{Deserialize, Serialize};

/// Summary of one finished cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleRecord {
    pub intent_id: String,
    pub was_valid: bool,
    pub confidence_score: f64,
    pub timestamp: DateTime<Utc>,
}

impl CycleRecord {
    pub fn new(intent_id: impl Into<String>, was_valid: bool, confidence_score: f64) -> Self {
        Self {
            intent_id: intent_id.into(),
            was_valid,
            confidence_score,
            timestamp: Utc::now(),
        }
    }

    /// Summarise `result` from its final Validation.
    ///
    /// Returns `None` if no pass completed.
    pub fn from_result(result: &CycleResult) -> Option<Self> {
        result.final_validation().map(|validation| Self {
            intent_id: result.intent_id.clone(),
            was_valid: validation.is_valid,
            confidence_score: validation.confidence_score,
            timestamp: result.finished_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_camel_case() {
        let record = CycleRecord::new("i-1", true, 92.0);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["intentId"], "i-1");
        assert_eq!(json["wasValid"], true);
        assert_eq!(json["confidenceScore"], 92.0);
    }
}
