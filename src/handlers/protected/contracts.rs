use axum::extract::{Path, Query, State};
use axum::Json;

use crate::auth::role::HR;
use crate::database::models::Contract;
use crate::middleware::{Actor, ApiResponse, ApiResult};
use crate::services::contracts::{ContractInput, ContractQuery, ContractService, ExpiringQuery};
use crate::services::transition::{parse_action, ActionInput};
use crate::services::Detail;
use crate::state::AppState;

use super::action_input;

/// GET /api/contracts
pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ContractQuery>,
) -> ApiResult<Vec<Contract>> {
    actor.require(HR)?;
    Ok(ApiResponse::page(ContractService::new(state).list(&query).await?))
}

/// GET /api/contracts/expiring - Active contracts ending within `days`
pub async fn expiring(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ExpiringQuery>,
) -> ApiResult<Vec<Contract>> {
    actor.require(HR)?;
    Ok(ApiResponse::success(ContractService::new(state).expiring(&query).await?))
}

/// GET /api/contracts/:id
pub async fn show(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<Detail<Contract>> {
    actor.require(HR)?;
    Ok(ApiResponse::success(ContractService::new(state).show(id).await?))
}

/// POST /api/contracts
pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<ContractInput>,
) -> ApiResult<Contract> {
    actor.require(HR)?;
    let contract = ContractService::new(state).create(input, &actor).await?;
    Ok(ApiResponse::created(contract).message("Contract created"))
}

/// PUT /api/contracts/:id - Drafts only
pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(input): Json<ContractInput>,
) -> ApiResult<Contract> {
    actor.require(HR)?;
    let contract = ContractService::new(state).update(id, input).await?;
    Ok(ApiResponse::success(contract).message("Contract updated"))
}

/// DELETE /api/contracts/:id
pub async fn delete(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<()> {
    actor.require(HR)?;
    ContractService::new(state).delete(id).await?;
    Ok(ApiResponse::success(()).message("Contract deleted"))
}

/// POST /api/contracts/:id/:action - submit, approve, reject, terminate, cancel, expire
pub async fn act(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, action)): Path<(i64, String)>,
    body: Option<Json<ActionInput>>,
) -> ApiResult<Contract> {
    actor.require(HR)?;
    let action = parse_action(&action)?;
    let contract = ContractService::new(state)
        .act(id, action, action_input(body), &actor)
        .await?;
    Ok(ApiResponse::success(contract))
}
