use axum::extract::{Path, Query, State};
use axum::Json;

use crate::auth::role::HR;
use crate::database::models::Employee;
use crate::middleware::{Actor, ApiResponse, ApiResult};
use crate::services::employees::{EmployeeInput, EmployeeQuery, EmployeeService, EmployeeStats};
use crate::services::transition::{parse_action, ActionInput};
use crate::services::Detail;
use crate::state::AppState;

use super::action_input;

/// GET /api/employees - List employees
pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<EmployeeQuery>,
) -> ApiResult<Vec<Employee>> {
    actor.require(HR)?;
    Ok(ApiResponse::page(EmployeeService::new(state).list(&query).await?))
}

/// GET /api/employees/stats - Headcount per status and department
pub async fn stats(State(state): State<AppState>, actor: Actor) -> ApiResult<EmployeeStats> {
    actor.require(HR)?;
    Ok(ApiResponse::success(EmployeeService::new(state).stats().await?))
}

/// GET /api/employees/:id
pub async fn show(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<Detail<Employee>> {
    actor.require(HR)?;
    Ok(ApiResponse::success(EmployeeService::new(state).show(id).await?))
}

/// POST /api/employees
pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<EmployeeInput>,
) -> ApiResult<Employee> {
    actor.require(HR)?;
    let employee = EmployeeService::new(state).create(input, &actor).await?;
    Ok(ApiResponse::created(employee).message("Employee created"))
}

/// PUT /api/employees/:id
pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(input): Json<EmployeeInput>,
) -> ApiResult<Employee> {
    actor.require(HR)?;
    let employee = EmployeeService::new(state).update(id, input).await?;
    Ok(ApiResponse::success(employee).message("Employee updated"))
}

/// DELETE /api/employees/:id
pub async fn delete(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<()> {
    actor.require(HR)?;
    EmployeeService::new(state).delete(id).await?;
    Ok(ApiResponse::success(()).message("Employee deleted"))
}

/// POST /api/employees/:id/:action - activate, deactivate, leave, terminate
pub async fn act(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, action)): Path<(i64, String)>,
    body: Option<Json<ActionInput>>,
) -> ApiResult<Employee> {
    actor.require(HR)?;
    let action = parse_action(&action)?;
    let employee = EmployeeService::new(state)
        .act(id, action, action_input(body), &actor)
        .await?;
    Ok(ApiResponse::success(employee))
}
