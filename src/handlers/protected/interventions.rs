use axum::extract::{Path, Query, State};
use axum::Json;

use crate::auth::role::TECHNICAL;
use crate::database::models::Intervention;
use crate::middleware::{Actor, ApiResponse, ApiResult};
use crate::services::interventions::{InterventionInput, InterventionQuery, InterventionService};
use crate::services::transition::{parse_action, ActionInput};
use crate::services::Detail;
use crate::state::AppState;

use super::action_input;

/// GET /api/interventions
pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<InterventionQuery>,
) -> ApiResult<Vec<Intervention>> {
    actor.require(TECHNICAL)?;
    Ok(ApiResponse::page(InterventionService::new(state).list(&query).await?))
}

/// GET /api/interventions/overdue - Open interventions scheduled before today
pub async fn overdue(State(state): State<AppState>, actor: Actor) -> ApiResult<Vec<Intervention>> {
    actor.require(TECHNICAL)?;
    Ok(ApiResponse::success(InterventionService::new(state).overdue().await?))
}

/// GET /api/interventions/:id
pub async fn show(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<Detail<Intervention>> {
    actor.require(TECHNICAL)?;
    Ok(ApiResponse::success(InterventionService::new(state).show(id).await?))
}

/// POST /api/interventions
pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<InterventionInput>,
) -> ApiResult<Intervention> {
    actor.require(TECHNICAL)?;
    let intervention = InterventionService::new(state).create(input, &actor).await?;
    Ok(ApiResponse::created(intervention).message("Intervention created"))
}

/// PUT /api/interventions/:id
pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(input): Json<InterventionInput>,
) -> ApiResult<Intervention> {
    actor.require(TECHNICAL)?;
    let intervention = InterventionService::new(state).update(id, input).await?;
    Ok(ApiResponse::success(intervention).message("Intervention updated"))
}

/// DELETE /api/interventions/:id
pub async fn delete(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<()> {
    actor.require(TECHNICAL)?;
    InterventionService::new(state).delete(id).await?;
    Ok(ApiResponse::success(()).message("Intervention deleted"))
}

/// POST /api/interventions/:id/:action - approve, reject, start, complete
pub async fn act(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, action)): Path<(i64, String)>,
    body: Option<Json<ActionInput>>,
) -> ApiResult<Intervention> {
    actor.require(TECHNICAL)?;
    let action = parse_action(&action)?;
    let intervention = InterventionService::new(state)
        .act(id, action, action_input(body), &actor)
        .await?;
    Ok(ApiResponse::success(intervention))
}
