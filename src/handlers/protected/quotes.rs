use axum::extract::{Path, Query, State};
use axum::Json;

use crate::auth::role::SALES;
use crate::database::models::Quote;
use crate::middleware::{Actor, ApiResponse, ApiResult};
use crate::services::quotes::{QuoteInput, QuoteQuery, QuoteService, QuoteTotals, QuoteView};
use crate::services::transition::{parse_action, ActionInput};
use crate::state::AppState;

use super::action_input;

/// GET /api/quotes
pub async fn list(State(state): State<AppState>, actor: Actor, Query(query): Query<QuoteQuery>) -> ApiResult<Vec<Quote>> {
    actor.require(SALES)?;
    Ok(ApiResponse::page(QuoteService::new(state).list(&query, &actor).await?))
}

/// GET /api/quotes/:id - Quote with items, totals and allowed actions
pub async fn show(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<QuoteView> {
    actor.require(SALES)?;
    Ok(ApiResponse::success(QuoteService::new(state).show(id, &actor).await?))
}

/// GET /api/quotes/:id/totals - Recomputed HT, TVA and TTC figures
pub async fn totals(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<QuoteTotals> {
    actor.require(SALES)?;
    Ok(ApiResponse::success(QuoteService::new(state).totals(id, &actor).await?))
}

/// POST /api/quotes
pub async fn create(State(state): State<AppState>, actor: Actor, Json(input): Json<QuoteInput>) -> ApiResult<QuoteView> {
    actor.require(SALES)?;
    let quote = QuoteService::new(state).create(input, &actor).await?;
    Ok(ApiResponse::created(quote).message("Quote created"))
}

/// PUT /api/quotes/:id
pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(input): Json<QuoteInput>,
) -> ApiResult<QuoteView> {
    actor.require(SALES)?;
    let quote = QuoteService::new(state).update(id, input, &actor).await?;
    Ok(ApiResponse::success(quote).message("Quote updated"))
}

/// DELETE /api/quotes/:id
pub async fn delete(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<()> {
    actor.require(SALES)?;
    QuoteService::new(state).delete(id, &actor).await?;
    Ok(ApiResponse::success(()).message("Quote deleted"))
}

/// POST /api/quotes/:id/duplicate
pub async fn duplicate(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<QuoteView> {
    actor.require(SALES)?;
    let quote = QuoteService::new(state).duplicate(id, &actor).await?;
    Ok(ApiResponse::created(quote).message("Quote duplicated"))
}

/// POST /api/quotes/:id/:action - send, accept, reject
pub async fn act(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, action)): Path<(i64, String)>,
    body: Option<Json<ActionInput>>,
) -> ApiResult<Quote> {
    actor.require(SALES)?;
    let action = parse_action(&action)?;
    let quote = QuoteService::new(state)
        .act(id, action, action_input(body), &actor)
        .await?;
    Ok(ApiResponse::success(quote))
}
