use axum::extract::{Path, Query, State};
use axum::Json;

use crate::auth::role::FINANCE;
use crate::database::models::Salary;
use crate::middleware::{Actor, ApiResponse, ApiResult};
use crate::services::salaries::{SalaryInput, SalaryQuery, SalaryService, SalaryStats, SalaryStatsQuery};
use crate::services::transition::{parse_action, ActionInput};
use crate::services::Detail;
use crate::state::AppState;

use super::action_input;

/// GET /api/salaries
pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<SalaryQuery>,
) -> ApiResult<Vec<Salary>> {
    actor.require(FINANCE)?;
    Ok(ApiResponse::page(SalaryService::new(state).list(&query).await?))
}

/// GET /api/salaries/stats - Counts and net amounts per status and period
pub async fn stats(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<SalaryStatsQuery>,
) -> ApiResult<SalaryStats> {
    actor.require(FINANCE)?;
    Ok(ApiResponse::success(SalaryService::new(state).stats(&query).await?))
}

/// GET /api/salaries/:id
pub async fn show(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<Detail<Salary>> {
    actor.require(FINANCE)?;
    Ok(ApiResponse::success(SalaryService::new(state).show(id).await?))
}

/// POST /api/salaries
pub async fn create(State(state): State<AppState>, actor: Actor, Json(input): Json<SalaryInput>) -> ApiResult<Salary> {
    actor.require(FINANCE)?;
    let salary = SalaryService::new(state).create(input, &actor).await?;
    Ok(ApiResponse::created(salary).message("Salary created"))
}

/// PUT /api/salaries/:id
pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(input): Json<SalaryInput>,
) -> ApiResult<Salary> {
    actor.require(FINANCE)?;
    let salary = SalaryService::new(state).update(id, input).await?;
    Ok(ApiResponse::success(salary).message("Salary updated"))
}

/// DELETE /api/salaries/:id
pub async fn delete(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<()> {
    actor.require(FINANCE)?;
    SalaryService::new(state).delete(id).await?;
    Ok(ApiResponse::success(()).message("Salary deleted"))
}

/// POST /api/salaries/:id/:action - calculate, approve, pay, reject
pub async fn act(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, action)): Path<(i64, String)>,
    body: Option<Json<ActionInput>>,
) -> ApiResult<Salary> {
    actor.require(FINANCE)?;
    let action = parse_action(&action)?;
    let salary = SalaryService::new(state)
        .act(id, action, action_input(body), &actor)
        .await?;
    Ok(ApiResponse::success(salary))
}
