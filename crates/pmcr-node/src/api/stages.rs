//! Stage endpoints.
//!
//! Each endpoint serves one stage contract from the node's in-process
//! stages. Failures are returned as a serialized `StageError`: transient
//! ones with 503 so callers retry, permanent ones with 422.

use axum::{extract::State, http::StatusCode, Json};
use pmcr_core::protocol::{
    CheckReply, CheckRequest, MakeReply, MakeRequest, PlanReply, PlanRequest, ReflectReply,
    ReflectRequest,
};
use pmcr_core::StageError;
use tracing::warn;

use crate::state::AppState;

type StageResponse<T> = Result<Json<T>, (StatusCode, Json<StageError>)>;

fn failure(err: StageError) -> (StatusCode, Json<StageError>) {
    warn!(stage = %err.stage, transient = err.transient, "Stage call failed: {}", err.cause);
    let status = if err.transient {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    (status, Json(err))
}

pub async fn plan(
    State(state): State<AppState>,
    Json(request): Json<PlanRequest>,
) -> StageResponse<PlanReply> {
    state.local_stages.plan.invoke(request).await.map(Json).map_err(failure)
}

pub async fn make(
    State(state): State<AppState>,
    Json(request): Json<MakeRequest>,
) -> StageResponse<MakeReply> {
    state.local_stages.make.invoke(request).await.map(Json).map_err(failure)
}

pub async fn check(
    State(state): State<AppState>,
    Json(request): Json<CheckRequest>,
) -> StageResponse<CheckReply> {
    state.local_stages.check.invoke(request).await.map(Json).map_err(failure)
}

pub async fn reflect(
    State(state): State<AppState>,
    Json(request): Json<ReflectRequest>,
) -> StageResponse<ReflectReply> {
    state.local_stages.reflect.invoke(request).await.map(Json).map_err(failure)
}
