// Any authenticated user may file and follow their own leave requests.
// HR sees every request; the service narrows everyone else to their own rows.

use axum::extract::{Path, Query, State};
use axum::Json;

use crate::database::models::LeaveRequest;
use crate::middleware::{Actor, ApiResponse, ApiResult};
use crate::auth::role::HR;
use crate::services::leave_requests::{
    BalanceQuery, ConflictQuery, ConflictReport, LeaveBalance, LeaveInput, LeaveQuery, LeaveService, LeaveStats,
    LeaveStatsQuery,
};
use crate::services::transition::{parse_action, ActionInput};
use crate::services::Detail;
use crate::state::AppState;

use super::action_input;

/// GET /api/leave-requests
pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<LeaveQuery>,
) -> ApiResult<Vec<LeaveRequest>> {
    Ok(ApiResponse::page(LeaveService::new(state).list(&query, &actor).await?))
}

/// POST /api/leave-requests/check-conflicts - Approved leave overlapping a date range
pub async fn check_conflicts(
    State(state): State<AppState>,
    _actor: Actor,
    Json(query): Json<ConflictQuery>,
) -> ApiResult<ConflictReport> {
    Ok(ApiResponse::success(LeaveService::new(state).conflicts(&query).await?))
}

/// GET /api/leave-requests/stats - Counts per status, type and month
pub async fn stats(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<LeaveStatsQuery>,
) -> ApiResult<LeaveStats> {
    actor.require(HR)?;
    Ok(ApiResponse::success(LeaveService::new(state).stats(&query).await?))
}

/// GET /api/leave-requests/balance/:employee_id - Yearly allowance left
pub async fn balance(
    State(state): State<AppState>,
    actor: Actor,
    Path(employee_id): Path<i64>,
    Query(query): Query<BalanceQuery>,
) -> ApiResult<LeaveBalance> {
    let balance = LeaveService::new(state).balance(employee_id, &query, &actor).await?;
    Ok(ApiResponse::success(balance))
}

/// GET /api/leave-requests/:id
pub async fn show(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<Detail<LeaveRequest>> {
    Ok(ApiResponse::success(LeaveService::new(state).show(id, &actor).await?))
}

/// POST /api/leave-requests - File a pending request; HR and management are notified
pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<LeaveInput>,
) -> ApiResult<LeaveRequest> {
    let leave = LeaveService::new(state).create(input, &actor).await?;
    Ok(ApiResponse::created(leave).message("Leave request submitted"))
}

/// PUT /api/leave-requests/:id
pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(input): Json<LeaveInput>,
) -> ApiResult<LeaveRequest> {
    let leave = LeaveService::new(state).update(id, input, &actor).await?;
    Ok(ApiResponse::success(leave).message("Leave request updated"))
}

/// DELETE /api/leave-requests/:id
pub async fn delete(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<()> {
    LeaveService::new(state).delete(id, &actor).await?;
    Ok(ApiResponse::success(()).message("Leave request deleted"))
}

/// POST /api/leave-requests/:id/:action - approve, reject, cancel
pub async fn act(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, action)): Path<(i64, String)>,
    body: Option<Json<ActionInput>>,
) -> ApiResult<LeaveRequest> {
    let action = parse_action(&action)?;
    let leave = LeaveService::new(state)
        .act(id, action, action_input(body), &actor)
        .await?;
    Ok(ApiResponse::success(leave))
}
