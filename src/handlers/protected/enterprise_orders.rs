use axum::extract::{Path, Query, State};
use axum::Json;

use crate::auth::role::SALES;
use crate::database::models::{EnterpriseOrder, EnterpriseOrderItem};
use crate::middleware::{Actor, ApiResponse, ApiResult};
use crate::services::enterprise_orders::{EnterpriseOrderInput, EnterpriseOrderQuery, EnterpriseOrderService};
use crate::services::transition::{parse_action, ActionInput};
use crate::services::Detail;
use crate::state::AppState;

use super::action_input;

type OrderDetail = Detail<EnterpriseOrder, EnterpriseOrderItem>;

/// GET /api/enterprise-orders - List client orders
pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<EnterpriseOrderQuery>,
) -> ApiResult<Vec<EnterpriseOrder>> {
    actor.require(SALES)?;
    let page = EnterpriseOrderService::new(state).list(&query, &actor).await?;
    Ok(ApiResponse::page(page))
}

/// GET /api/enterprise-orders/:id
pub async fn show(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<OrderDetail> {
    actor.require(SALES)?;
    Ok(ApiResponse::success(EnterpriseOrderService::new(state).show(id, &actor).await?))
}

/// POST /api/enterprise-orders
pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<EnterpriseOrderInput>,
) -> ApiResult<OrderDetail> {
    actor.require(SALES)?;
    let order = EnterpriseOrderService::new(state).create(input, &actor).await?;
    Ok(ApiResponse::created(order).message("Order created"))
}

/// PUT /api/enterprise-orders/:id
pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(input): Json<EnterpriseOrderInput>,
) -> ApiResult<OrderDetail> {
    actor.require(SALES)?;
    let order = EnterpriseOrderService::new(state).update(id, input, &actor).await?;
    Ok(ApiResponse::success(order).message("Order updated"))
}

/// DELETE /api/enterprise-orders/:id
pub async fn delete(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<()> {
    actor.require(SALES)?;
    EnterpriseOrderService::new(state).delete(id, &actor).await?;
    Ok(ApiResponse::success(()).message("Order deleted"))
}

/// POST /api/enterprise-orders/:id/invoice - Mark a delivered order as invoiced
pub async fn invoice(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<EnterpriseOrder> {
    actor.require(SALES)?;
    let order = EnterpriseOrderService::new(state).invoice(id, &actor).await?;
    Ok(ApiResponse::success(order).message("Order invoiced"))
}

/// POST /api/enterprise-orders/:id/:action - validate, reject, deliver
pub async fn act(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, action)): Path<(i64, String)>,
    body: Option<Json<ActionInput>>,
) -> ApiResult<EnterpriseOrder> {
    actor.require(SALES)?;
    let action = parse_action(&action)?;
    let order = EnterpriseOrderService::new(state)
        .act(id, action, action_input(body), &actor)
        .await?;
    Ok(ApiResponse::success(order))
}
