use axum::extract::{Path, Query, State};
use axum::Json;

use crate::auth::role::SALES;
use crate::database::models::{PurchaseOrder, PurchaseOrderItem};
use crate::middleware::{Actor, ApiResponse, ApiResult};
use crate::services::purchase_orders::{
    PurchaseOrderInput, PurchaseOrderQuery, PurchaseOrderService, PurchaseOrderStats,
};
use crate::services::transition::{parse_action, ActionInput};
use crate::services::Detail;
use crate::state::AppState;

use super::action_input;

type OrderDetail = Detail<PurchaseOrder, PurchaseOrderItem>;

/// GET /api/purchase-orders - List purchase orders visible to the caller
pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<PurchaseOrderQuery>,
) -> ApiResult<Vec<PurchaseOrder>> {
    actor.require(SALES)?;
    let page = PurchaseOrderService::new(state).list(&query, &actor).await?;
    Ok(ApiResponse::page(page))
}

/// GET /api/purchase-orders/stats
pub async fn stats(State(state): State<AppState>, actor: Actor) -> ApiResult<PurchaseOrderStats> {
    actor.require(SALES)?;
    Ok(ApiResponse::success(PurchaseOrderService::new(state).stats(&actor).await?))
}

/// GET /api/purchase-orders/:id - Order, line items and allowed actions
pub async fn show(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<OrderDetail> {
    actor.require(SALES)?;
    Ok(ApiResponse::success(PurchaseOrderService::new(state).show(id, &actor).await?))
}

/// POST /api/purchase-orders - Create a draft order with its items
pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<PurchaseOrderInput>,
) -> ApiResult<OrderDetail> {
    actor.require(SALES)?;
    let order = PurchaseOrderService::new(state).create(input, &actor).await?;
    Ok(ApiResponse::created(order).message("Purchase order created"))
}

/// PUT /api/purchase-orders/:id - Only drafts and rejected orders can change
pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(input): Json<PurchaseOrderInput>,
) -> ApiResult<OrderDetail> {
    actor.require(SALES)?;
    let order = PurchaseOrderService::new(state).update(id, input, &actor).await?;
    Ok(ApiResponse::success(order).message("Purchase order updated"))
}

/// DELETE /api/purchase-orders/:id
pub async fn delete(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<()> {
    actor.require(SALES)?;
    PurchaseOrderService::new(state).delete(id, &actor).await?;
    Ok(ApiResponse::success(()).message("Purchase order deleted"))
}

/// POST /api/purchase-orders/:id/duplicate - Copy as a new draft
pub async fn duplicate(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<OrderDetail> {
    actor.require(SALES)?;
    let order = PurchaseOrderService::new(state).duplicate(id, &actor).await?;
    Ok(ApiResponse::created(order).message("Purchase order duplicated"))
}

/// POST /api/purchase-orders/:id/:action - validate, reject, start, deliver, cancel
pub async fn act(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, action)): Path<(i64, String)>,
    body: Option<Json<ActionInput>>,
) -> ApiResult<PurchaseOrder> {
    actor.require(SALES)?;
    let action = parse_action(&action)?;
    let order = PurchaseOrderService::new(state)
        .act(id, action, action_input(body), &actor)
        .await?;
    Ok(ApiResponse::success(order))
}
