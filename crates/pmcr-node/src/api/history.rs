//! History API endpoints.

use axum::{extract::State, http::StatusCode, Json};
use pmcr_core::PmcrError;
use pmcr_history::{analyze, CycleRecord, TrendReport};

use crate::state::AppState;

fn internal(e: PmcrError) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// Recorded cycles, oldest first.
pub async fn list_history(
    State(state): State<AppState>,
) -> Result<Json<Vec<CycleRecord>>, (StatusCode, String)> {
    state.history.all().await.map(Json).map_err(internal)
}

/// Trend report over the recorded cycles. Needs at least two records.
pub async fn trend(
    State(state): State<AppState>,
) -> Result<Json<TrendReport>, (StatusCode, String)> {
    let records = state.history.all().await.map_err(internal)?;
    analyze(&records)
        .map(Json)
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
}

#[cfg(test)]
mod tests {
    use axum_test::TestServer;
    use serde_json::json;

    use super::*;
    use crate::create_router;
    use crate::state::tests::rule_based_state;

    #[tokio::test]
    async fn test_history_and_trend() {
        let server = TestServer::new(create_router(rule_based_state())).unwrap();
        let fibonacci = json!({
            "id": "fib",
            "content": "Create a Python function to calculate Fibonacci numbers",
            "context": { "language": "python" }
        });

        server.post("/api/v1/cycle").json(&fibonacci).await;

        let response = server.get("/api/v1/history/trend").await;
        assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(response.text().contains("at least 2 records"));

        server.post("/api/v1/cycle").json(&fibonacci).await;

        let records: Vec<CycleRecord> = server.get("/api/v1/history").await.json();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.intent_id == "fib" && r.was_valid));

        let response = server.get("/api/v1/history/trend").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let report: TrendReport = response.json();
        assert_eq!(report.total_cycles, 2);
        assert_eq!(report.success_rate, 100.0);
        assert_eq!(report.improvement_trend, 0.0);
    }
}
