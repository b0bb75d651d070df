use axum::extract::{Path, Query, State};
use axum::Json;

use crate::auth::role::TECHNICAL;
use crate::database::models::Equipment;
use crate::middleware::{Actor, ApiResponse, ApiResult};
use crate::services::equipment::{AssignInput, EquipmentDetail, EquipmentInput, EquipmentQuery, EquipmentService, WarrantyQuery};
use crate::state::AppState;

/// GET /api/equipment
pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<EquipmentQuery>,
) -> ApiResult<Vec<Equipment>> {
    actor.require(TECHNICAL)?;
    Ok(ApiResponse::page(EquipmentService::new(state).list(&query).await?))
}

/// GET /api/equipment/warranty-expiring
pub async fn warranty_expiring(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WarrantyQuery>,
) -> ApiResult<Vec<Equipment>> {
    actor.require(TECHNICAL)?;
    Ok(ApiResponse::success(EquipmentService::new(state).warranty_expiring(&query).await?))
}

/// GET /api/equipment/:id
pub async fn show(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<EquipmentDetail> {
    actor.require(TECHNICAL)?;
    Ok(ApiResponse::success(EquipmentService::new(state).show(id).await?))
}

/// POST /api/equipment
pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<EquipmentInput>,
) -> ApiResult<Equipment> {
    actor.require(TECHNICAL)?;
    let equipment = EquipmentService::new(state).create(input, &actor).await?;
    Ok(ApiResponse::created(equipment).message("Equipment created"))
}

/// PUT /api/equipment/:id - Retired equipment is read-only
pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(input): Json<EquipmentInput>,
) -> ApiResult<Equipment> {
    actor.require(TECHNICAL)?;
    let equipment = EquipmentService::new(state).update(id, input).await?;
    Ok(ApiResponse::success(equipment).message("Equipment updated"))
}

/// DELETE /api/equipment/:id
pub async fn delete(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<()> {
    actor.require(TECHNICAL)?;
    EquipmentService::new(state).delete(id).await?;
    Ok(ApiResponse::success(()).message("Equipment deleted"))
}

/// POST /api/equipment/:id/assign - Hand equipment to an active user
pub async fn assign(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(input): Json<AssignInput>,
) -> ApiResult<Equipment> {
    actor.require(TECHNICAL)?;
    let equipment = EquipmentService::new(state).assign(id, input).await?;
    Ok(ApiResponse::success(equipment).message("Equipment assigned"))
}

/// POST /api/equipment/:id/return
pub async fn return_equipment(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<Equipment> {
    actor.require(TECHNICAL)?;
    let equipment = EquipmentService::new(state).unassign(id).await?;
    Ok(ApiResponse::success(equipment).message("Equipment returned"))
}
