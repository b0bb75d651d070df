use axum::extract::{Path, Query, State};
use axum::Json;

use crate::auth::role::FINANCE;
use crate::database::models::{Stock, StockMovement};
use crate::database::PageRequest;
use crate::middleware::{Actor, ApiResponse, ApiResult};
use crate::services::stocks::{MovementInput, StockInput, StockQuery, StockService};
use crate::services::transition::{parse_action, ActionInput};
use crate::services::Detail;
use crate::state::AppState;

use super::{action_input, PageQuery};

/// GET /api/stocks
pub async fn list(State(state): State<AppState>, actor: Actor, Query(query): Query<StockQuery>) -> ApiResult<Vec<Stock>> {
    actor.require(FINANCE)?;
    Ok(ApiResponse::page(StockService::new(state).list(&query).await?))
}

/// GET /api/stocks/low - Articles at or below their minimum quantity
pub async fn low(State(state): State<AppState>, actor: Actor) -> ApiResult<Vec<Stock>> {
    actor.require(FINANCE)?;
    Ok(ApiResponse::success(StockService::new(state).low().await?))
}

/// GET /api/stocks/:id
pub async fn show(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<Detail<Stock>> {
    actor.require(FINANCE)?;
    Ok(ApiResponse::success(StockService::new(state).show(id).await?))
}

/// POST /api/stocks
pub async fn create(State(state): State<AppState>, actor: Actor, Json(input): Json<StockInput>) -> ApiResult<Stock> {
    actor.require(FINANCE)?;
    let stock = StockService::new(state).create(input, &actor).await?;
    Ok(ApiResponse::created(stock).message("Stock created"))
}

/// PUT /api/stocks/:id - Descriptive fields; quantities move through movements
pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(input): Json<StockInput>,
) -> ApiResult<Stock> {
    actor.require(FINANCE)?;
    let stock = StockService::new(state).update(id, input).await?;
    Ok(ApiResponse::success(stock).message("Stock updated"))
}

/// DELETE /api/stocks/:id
pub async fn delete(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<()> {
    actor.require(FINANCE)?;
    StockService::new(state).delete(id).await?;
    Ok(ApiResponse::success(()).message("Stock deleted"))
}

/// POST /api/stocks/:id/add
pub async fn add(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(input): Json<MovementInput>,
) -> ApiResult<Stock> {
    actor.require(FINANCE)?;
    let stock = StockService::new(state).add(id, input, &actor).await?;
    Ok(ApiResponse::success(stock).message("Stock added"))
}

/// POST /api/stocks/:id/remove - Refused when the quantity would go negative
pub async fn remove(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(input): Json<MovementInput>,
) -> ApiResult<Stock> {
    actor.require(FINANCE)?;
    let stock = StockService::new(state).remove(id, input, &actor).await?;
    Ok(ApiResponse::success(stock).message("Stock removed"))
}

/// POST /api/stocks/:id/adjust - Set an absolute quantity after a count
pub async fn adjust(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(input): Json<MovementInput>,
) -> ApiResult<Stock> {
    actor.require(FINANCE)?;
    let stock = StockService::new(state).adjust(id, input, &actor).await?;
    Ok(ApiResponse::success(stock).message("Stock adjusted"))
}

/// GET /api/stocks/:id/movements - Movement history, newest first
pub async fn movements(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Vec<StockMovement>> {
    actor.require(FINANCE)?;
    let request = PageRequest::new(query.page, query.per_page);
    Ok(ApiResponse::page(StockService::new(state).movements(id, &request).await?))
}

/// POST /api/stocks/:id/:action - validate, reject
pub async fn act(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, action)): Path<(i64, String)>,
    body: Option<Json<ActionInput>>,
) -> ApiResult<Stock> {
    actor.require(FINANCE)?;
    let action = parse_action(&action)?;
    let stock = StockService::new(state)
        .act(id, action, action_input(body), &actor)
        .await?;
    Ok(ApiResponse::success(stock))
}
