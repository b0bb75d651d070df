// Evaluations are written by HR. Employees read and sign their own.

use axum::extract::{Path, Query, State};
use axum::Json;

use crate::auth::role::HR;
use crate::database::models::Evaluation;
use crate::middleware::{Actor, ApiResponse, ApiResult};
use crate::services::evaluations::{EvaluationInput, EvaluationQuery, EvaluationService};
use crate::services::transition::{parse_action, ActionInput};
use crate::services::Detail;
use crate::state::AppState;

use super::action_input;

/// GET /api/evaluations
pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<EvaluationQuery>,
) -> ApiResult<Vec<Evaluation>> {
    Ok(ApiResponse::page(EvaluationService::new(state).list(&query, &actor).await?))
}

/// GET /api/evaluations/mine - Evaluations of the caller
pub async fn mine(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<EvaluationQuery>,
) -> ApiResult<Vec<Evaluation>> {
    Ok(ApiResponse::page(EvaluationService::new(state).mine(&query, &actor).await?))
}

/// GET /api/evaluations/:id
pub async fn show(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<Detail<Evaluation>> {
    Ok(ApiResponse::success(EvaluationService::new(state).show(id, &actor).await?))
}

/// POST /api/evaluations - The caller becomes the evaluator
pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<EvaluationInput>,
) -> ApiResult<Evaluation> {
    actor.require(HR)?;
    let evaluation = EvaluationService::new(state).create(input, &actor).await?;
    Ok(ApiResponse::created(evaluation).message("Evaluation created"))
}

/// PUT /api/evaluations/:id
pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(input): Json<EvaluationInput>,
) -> ApiResult<Evaluation> {
    actor.require(HR)?;
    let evaluation = EvaluationService::new(state).update(id, input).await?;
    Ok(ApiResponse::success(evaluation).message("Evaluation updated"))
}

/// DELETE /api/evaluations/:id
pub async fn delete(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<()> {
    actor.require(HR)?;
    EvaluationService::new(state).delete(id).await?;
    Ok(ApiResponse::success(()).message("Evaluation deleted"))
}

/// POST /api/evaluations/:id/:action - sign_employee, finalize
pub async fn act(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, action)): Path<(i64, String)>,
    body: Option<Json<ActionInput>>,
) -> ApiResult<Evaluation> {
    let action = parse_action(&action)?;
    let evaluation = EvaluationService::new(state)
        .act(id, action, action_input(body), &actor)
        .await?;
    Ok(ApiResponse::success(evaluation))
}
