use axum::extract::{Path, Query, State};
use axum::Json;

use crate::auth::role::FINANCE;
use crate::database::models::Supplier;
use crate::middleware::{Actor, ApiResponse, ApiResult};
use crate::services::suppliers::{RatingInput, SupplierInput, SupplierQuery, SupplierService, SupplierStats};
use crate::services::transition::{parse_action, ActionInput};
use crate::services::Detail;
use crate::state::AppState;

use super::action_input;

/// GET /api/suppliers - List suppliers
pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<SupplierQuery>,
) -> ApiResult<Vec<Supplier>> {
    actor.require(FINANCE)?;
    let page = SupplierService::new(state).list(&query).await?;
    Ok(ApiResponse::page(page))
}

/// GET /api/suppliers/stats - Counts per status and average rating
pub async fn stats(State(state): State<AppState>, actor: Actor) -> ApiResult<SupplierStats> {
    actor.require(FINANCE)?;
    Ok(ApiResponse::success(SupplierService::new(state).stats().await?))
}

/// GET /api/suppliers/:id - Supplier with its allowed actions
pub async fn show(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<Detail<Supplier>> {
    actor.require(FINANCE)?;
    Ok(ApiResponse::success(SupplierService::new(state).show(id).await?))
}

/// POST /api/suppliers - Register a supplier pending validation
pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<SupplierInput>,
) -> ApiResult<Supplier> {
    actor.require(FINANCE)?;
    let supplier = SupplierService::new(state).create(input, &actor).await?;
    Ok(ApiResponse::created(supplier).message("Supplier created"))
}

/// PUT /api/suppliers/:id
pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(input): Json<SupplierInput>,
) -> ApiResult<Supplier> {
    actor.require(FINANCE)?;
    let supplier = SupplierService::new(state).update(id, input).await?;
    Ok(ApiResponse::success(supplier).message("Supplier updated"))
}

/// DELETE /api/suppliers/:id
pub async fn delete(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<()> {
    actor.require(FINANCE)?;
    SupplierService::new(state).delete(id).await?;
    Ok(ApiResponse::success(()).message("Supplier deleted"))
}

/// POST /api/suppliers/:id/rate - Record an evaluation note
pub async fn rate(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(input): Json<RatingInput>,
) -> ApiResult<Supplier> {
    actor.require(FINANCE)?;
    let supplier = SupplierService::new(state).rate(id, input).await?;
    Ok(ApiResponse::success(supplier).message("Supplier rated"))
}

/// POST /api/suppliers/:id/:action - validate, reject, activate, deactivate
pub async fn act(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, action)): Path<(i64, String)>,
    body: Option<Json<ActionInput>>,
) -> ApiResult<Supplier> {
    actor.require(FINANCE)?;
    let action = parse_action(&action)?;
    let supplier = SupplierService::new(state)
        .act(id, action, action_input(body), &actor)
        .await?;
    Ok(ApiResponse::success(supplier))
}
