//! Historical trend analysis.

use pmcr_core::{PmcrError, Result};
use serde::{Deserialize, Serialize};

use crate::record::CycleRecord;

/// Aggregate view over an ordered run of cycle records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendReport {
    pub total_cycles: usize,

    /// Share of valid cycles, in percent.
    pub success_rate: f64,

    /// Mean confidence score.
    pub average_confidence: f64,

    /// Last confidence minus first confidence.
    pub improvement_trend: f64,
}

/// Summarise `records`, given oldest first.
///
/// At least two records are required.
pub fn analyze(records: &[CycleRecord]) -> Result<TrendReport> {
    let (first, last) = match records {
        [first, .., last] => (first, last),
        _ => {
            return Err(PmcrError::input(
                None,
                format!("trend analysis needs at least 2 records, got {}", records.len()),
            ))
        }
    };

    let total = records.len() as f64;
    let valid = records.iter().filter(|r| r.was_valid).count() as f64;
    let confidence_sum: f64 = records.iter().map(|r| r.confidence_score).sum();

    Ok(TrendReport {
        total_cycles: records.len(),
        success_rate: valid / total * 100.0,
        average_confidence: confidence_sum / total,
        improvement_trend: last.confidence_score - first.confidence_score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_record_trend() {
        let records = vec![
            CycleRecord::new("fib", false, 55.0),
            CycleRecord::new("fib", true, 92.0),
        ];

        let report = analyze(&records).unwrap();
        assert_eq!(report.total_cycles, 2);
        assert_eq!(report.success_rate, 50.0);
        assert_eq!(report.average_confidence, 73.5);
        assert_eq!(report.improvement_trend, 37.0);
    }

    #[test]
    fn test_declining_trend() {
        let records = vec![
            CycleRecord::new("a", true, 90.0),
            CycleRecord::new("b", true, 80.0),
            CycleRecord::new("c", false, 40.0),
            CycleRecord::new("d", true, 70.0),
        ];

        let report = analyze(&records).unwrap();
        assert_eq!(report.success_rate, 75.0);
        assert_eq!(report.average_confidence, 70.0);
        assert_eq!(report.improvement_trend, -20.0);
    }

    #[test]
    fn test_too_few_records() {
        assert!(matches!(analyze(&[]), Err(PmcrError::InputInvalid { .. })));
        let one = [CycleRecord::new("a", true, 90.0)];
        assert!(matches!(analyze(&one), Err(PmcrError::InputInvalid { .. })));
    }
}
