use axum::extract::{Path, Query, State};
use axum::Json;

use crate::auth::role::FINANCE;
use crate::database::models::Tax;
use crate::middleware::{Actor, ApiResponse, ApiResult};
use crate::services::taxes::{TaxInput, TaxQuery, TaxService, TaxStats};
use crate::services::transition::{parse_action, ActionInput};
use crate::services::Detail;
use crate::state::AppState;

use super::action_input;

/// GET /api/taxes
pub async fn list(State(state): State<AppState>, actor: Actor, Query(query): Query<TaxQuery>) -> ApiResult<Vec<Tax>> {
    actor.require(FINANCE)?;
    Ok(ApiResponse::page(TaxService::new(state).list(&query).await?))
}

/// GET /api/taxes/stats - Declared, paid and outstanding amounts
pub async fn stats(State(state): State<AppState>, actor: Actor) -> ApiResult<TaxStats> {
    actor.require(FINANCE)?;
    Ok(ApiResponse::success(TaxService::new(state).stats().await?))
}

/// GET /api/taxes/:id
pub async fn show(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<Detail<Tax>> {
    actor.require(FINANCE)?;
    Ok(ApiResponse::success(TaxService::new(state).show(id).await?))
}

/// POST /api/taxes - Declare a tax; amounts are computed from base and rate
pub async fn create(State(state): State<AppState>, actor: Actor, Json(input): Json<TaxInput>) -> ApiResult<Tax> {
    actor.require(FINANCE)?;
    let tax = TaxService::new(state).create(input, &actor).await?;
    Ok(ApiResponse::created(tax).message("Tax declared"))
}

/// PUT /api/taxes/:id
pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(input): Json<TaxInput>,
) -> ApiResult<Tax> {
    actor.require(FINANCE)?;
    let tax = TaxService::new(state).update(id, input).await?;
    Ok(ApiResponse::success(tax).message("Tax updated"))
}

/// DELETE /api/taxes/:id
pub async fn delete(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<()> {
    actor.require(FINANCE)?;
    TaxService::new(state).delete(id).await?;
    Ok(ApiResponse::success(()).message("Tax deleted"))
}

/// POST /api/taxes/:id/:action - validate, reject, pay
pub async fn act(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, action)): Path<(i64, String)>,
    body: Option<Json<ActionInput>>,
) -> ApiResult<Tax> {
    actor.require(FINANCE)?;
    let action = parse_action(&action)?;
    let tax = TaxService::new(state)
        .act(id, action, action_input(body), &actor)
        .await?;
    Ok(ApiResponse::success(tax))
}
