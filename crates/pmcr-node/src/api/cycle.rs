//! Cycle API endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use pmcr_core::{CycleAccepted, CycleEntry, CycleResult, RunCycleRequest};
use tracing::info;

use crate::state::{AppState, CancelRefused};

/// Run a cycle and wait for its result.
///
/// Dropping the request (client disconnect) cancels the cycle. The cycle is
/// dropped from the registry once its result is returned.
pub async fn run_cycle(
    State(state): State<AppState>,
    Json(request): Json<RunCycleRequest>,
) -> Result<Json<CycleResult>, (StatusCode, String)> {
    let intent = request
        .into_intent()
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    let (cycle_id, cancel, handle) = state.launch(intent).await;
    info!(%cycle_id, "📥 Cycle requested");
    let _guard = cancel.drop_guard();

    let joined = handle.await;
    state.forget(&cycle_id).await;
    let result = joined
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Cycle task failed: {}", e)))?;

    Ok(Json(result))
}

/// Start a cycle in the background.
pub async fn start_cycle(
    State(state): State<AppState>,
    Json(request): Json<RunCycleRequest>,
) -> Result<(StatusCode, Json<CycleAccepted>), (StatusCode, String)> {
    let intent = request
        .into_intent()
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    let intent_id = intent.id.clone();

    let (cycle_id, _, _) = state.launch(intent).await;
    info!(%cycle_id, %intent_id, "📥 Cycle started in background");

    Ok((
        StatusCode::ACCEPTED,
        Json(CycleAccepted {
            cycle_id,
            intent_id,
        }),
    ))
}

/// List cycles.
pub async fn list_cycles(State(state): State<AppState>) -> Json<Vec<CycleEntry>> {
    Json(state.list_cycles().await)
}

/// Get a cycle by id.
pub async fn get_cycle(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CycleEntry>, (StatusCode, String)> {
    state
        .get_cycle(&id)
        .await
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, format!("Cycle {} not found", id)))
}

/// Cancel a running cycle.
pub async fn cancel_cycle(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<CycleEntry>), (StatusCode, String)> {
    match state.cancel_cycle(&id).await {
        Ok(entry) => Ok((StatusCode::ACCEPTED, Json(entry))),
        Err(CancelRefused::Unknown) => {
            Err((StatusCode::NOT_FOUND, format!("Cycle {} not found", id)))
        }
        Err(CancelRefused::AlreadyFinished(entry)) => Err((
            StatusCode::CONFLICT,
            format!("Cycle {} already finished with status {:?}", id, entry.status),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use axum_test::TestServer;
    use pmcr_core::protocol::{PlanReply, PlanRequest};
    use pmcr_core::{CycleConfig, CycleStatus, PmcrError, StageError};
    use pmcr_cycle::CycleOrchestrator;
    use pmcr_stages::{PlanStage, StageSet};
    use serde_json::json;

    use super::*;
    use crate::create_router;
    use crate::state::tests::rule_based_state;

    /// A planner that never answers.
    struct Hanging;

    #[async_trait]
    impl PlanStage for Hanging {
        async fn invoke(&self, _request: PlanRequest) -> Result<PlanReply, StageError> {
            std::future::pending().await
        }
    }

    fn server() -> TestServer {
        TestServer::new(create_router(rule_based_state())).unwrap()
    }

    async fn wait_until_finished(server: &TestServer, cycle_id: &str) -> CycleEntry {
        for _ in 0..500 {
            let entry: CycleEntry = server.get(&format!("/api/v1/cycles/{}", cycle_id)).await.json();
            if !entry.is_running() {
                return entry;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("cycle {} did not finish", cycle_id);
    }

    #[tokio::test]
    async fn test_fibonacci_cycle_converges() {
        let server = server();
        let response = server
            .post("/api/v1/cycle")
            .json(&json!({
                "id": "fib",
                "content": "Create a Python function to calculate Fibonacci numbers",
                "context": { "language": "python" }
            }))
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let result: CycleResult = response.json();
        assert_eq!(result.status, CycleStatus::Converged);
        assert_eq!(result.intent_id, "fib");
        assert_eq!(result.iterations, 2);

        let artifact = result.artifact.unwrap();
        assert_eq!(artifact.artifact_type, "python");
        assert!(artifact.content.contains("for "));
    }

    #[tokio::test]
    async fn test_sync_cycles_leave_registry_empty() {
        let state = rule_based_state();
        let server = TestServer::new(create_router(state.clone())).unwrap();

        for _ in 0..12 {
            let response = server
                .post("/api/v1/cycle")
                .json(&json!({
                    "content": "Create a Python function to calculate Fibonacci numbers",
                    "context": { "language": "python" }
                }))
                .await;
            assert_eq!(response.status_code(), StatusCode::OK);
        }

        assert!(state.cycles.read().await.is_empty());
        let listed: Vec<CycleEntry> = server.get("/api/v1/cycles").await.json();
        assert!(listed.is_empty());
        assert_eq!(state.history.len().await, 12);
    }

    #[tokio::test]
    async fn test_finished_background_cycles_are_capped() {
        let state = rule_based_state();
        let server = TestServer::new(create_router(state.clone())).unwrap();

        let mut last = String::new();
        for _ in 0..12 {
            let accepted: CycleAccepted = server
                .post("/api/v1/cycles")
                .json(&json!({ "content": "Summarize the release notes" }))
                .await
                .json();
            wait_until_finished(&server, &accepted.cycle_id).await;
            last = accepted.cycle_id;
        }

        let listed: Vec<CycleEntry> = server.get("/api/v1/cycles").await.json();
        assert_eq!(listed.len(), 8);
        assert_eq!(listed.last().map(|e| e.cycle_id.as_str()), Some(last.as_str()));
    }

    #[tokio::test]
    async fn test_empty_content_fails_without_artifact() {
        let server = server();
        let response = server
            .post("/api/v1/cycle")
            .json(&json!({ "content": "  " }))
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let result: CycleResult = response.json();
        assert_eq!(result.status, CycleStatus::Failed);
        assert_eq!(result.iterations, 0);
        assert!(result.artifact.is_none());
        assert!(matches!(result.error, Some(PmcrError::InputInvalid { .. })));
    }

    #[tokio::test]
    async fn test_missing_content_is_rejected() {
        let server = server();
        let response = server
            .post("/api/v1/cycle")
            .json(&json!({ "context": {} }))
            .await;

        assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_background_cycle() {
        let server = server();
        let response = server
            .post("/api/v1/cycles")
            .json(&json!({
                "content": "Create a Python function to calculate Fibonacci numbers",
                "context": { "language": "python" }
            }))
            .await;

        assert_eq!(response.status_code(), StatusCode::ACCEPTED);
        let accepted: CycleAccepted = response.json();

        let entry = wait_until_finished(&server, &accepted.cycle_id).await;
        assert_eq!(entry.status, CycleStatus::Converged);
        assert_eq!(entry.intent_id, accepted.intent_id);

        let listed: Vec<CycleEntry> = server.get("/api/v1/cycles").await.json();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].cycle_id, accepted.cycle_id);
    }

    #[tokio::test]
    async fn test_unknown_cycle() {
        let server = server();

        let response = server.get("/api/v1/cycles/missing").await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

        let response = server.delete("/api/v1/cycles/missing").await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cancel_running_cycle() {
        let stages = StageSet::rule_based().with_plan(std::sync::Arc::new(Hanging));
        let orchestrator =
            CycleOrchestrator::new(stages, CycleConfig::new(3, Duration::from_secs(60))).unwrap();
        let server = TestServer::new(create_router(AppState::new(orchestrator, 2, 8))).unwrap();

        let accepted: CycleAccepted = server
            .post("/api/v1/cycles")
            .json(&json!({ "content": "Summarize the release notes" }))
            .await
            .json();

        let response = server
            .delete(&format!("/api/v1/cycles/{}", accepted.cycle_id))
            .await;
        assert_eq!(response.status_code(), StatusCode::ACCEPTED);

        let entry = wait_until_finished(&server, &accepted.cycle_id).await;
        assert_eq!(entry.status, CycleStatus::Aborted);
        let result = entry.result.unwrap();
        assert!(matches!(result.error, Some(PmcrError::Cancelled { .. })));
        assert!(result.artifact.is_none());

        let response = server
            .delete(&format!("/api/v1/cycles/{}", accepted.cycle_id))
            .await;
        assert_eq!(response.status_code(), StatusCode::CONFLICT);
    }
}
