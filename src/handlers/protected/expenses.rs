use axum::extract::{Path, Query, State};
use axum::Json;

use crate::auth::role::FINANCE;
use crate::database::models::Expense;
use crate::middleware::{Actor, ApiResponse, ApiResult};
use crate::services::expenses::{ExpenseInput, ExpenseQuery, ExpenseService, ExpenseStats, StatsQuery};
use crate::services::transition::{parse_action, ActionInput};
use crate::services::Detail;
use crate::state::AppState;

use super::action_input;

/// GET /api/expenses
pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ExpenseQuery>,
) -> ApiResult<Vec<Expense>> {
    actor.require(FINANCE)?;
    Ok(ApiResponse::page(ExpenseService::new(state).list(&query).await?))
}

/// GET /api/expenses/stats - Counts and amounts per status over a period
pub async fn stats(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<StatsQuery>,
) -> ApiResult<ExpenseStats> {
    actor.require(FINANCE)?;
    Ok(ApiResponse::success(ExpenseService::new(state).stats(&query).await?))
}

/// GET /api/expenses/:id
pub async fn show(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<Detail<Expense>> {
    actor.require(FINANCE)?;
    Ok(ApiResponse::success(ExpenseService::new(state).show(id).await?))
}

/// POST /api/expenses - Record a draft expense
pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<ExpenseInput>,
) -> ApiResult<Expense> {
    actor.require(FINANCE)?;
    let expense = ExpenseService::new(state).create(input, &actor).await?;
    Ok(ApiResponse::created(expense).message("Expense created"))
}

/// PUT /api/expenses/:id
pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(input): Json<ExpenseInput>,
) -> ApiResult<Expense> {
    actor.require(FINANCE)?;
    let expense = ExpenseService::new(state).update(id, input).await?;
    Ok(ApiResponse::success(expense).message("Expense updated"))
}

/// DELETE /api/expenses/:id
pub async fn delete(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<()> {
    actor.require(FINANCE)?;
    ExpenseService::new(state).delete(id).await?;
    Ok(ApiResponse::success(()).message("Expense deleted"))
}

/// POST /api/expenses/:id/:action - submit, review, approve, reject, pay
pub async fn act(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, action)): Path<(i64, String)>,
    body: Option<Json<ActionInput>>,
) -> ApiResult<Expense> {
    actor.require(FINANCE)?;
    let action = parse_action(&action)?;
    let expense = ExpenseService::new(state)
        .act(id, action, action_input(body), &actor)
        .await?;
    Ok(ApiResponse::success(expense))
}
