use axum::extract::{Path, Query, State};
use axum::Json;

use crate::auth::role::APPROVERS;
use crate::database::models::User;
use crate::middleware::{Actor, ApiResponse, ApiResult};
use crate::services::users::{UserInput, UserQuery, UserService};
use crate::state::AppState;

/// GET /api/users
pub async fn list(State(state): State<AppState>, actor: Actor, Query(query): Query<UserQuery>) -> ApiResult<Vec<User>> {
    actor.require(APPROVERS)?;
    Ok(ApiResponse::page(UserService::new(state).list(&query).await?))
}

/// GET /api/users/me - The caller's own account
pub async fn me(State(state): State<AppState>, actor: Actor) -> ApiResult<User> {
    Ok(ApiResponse::success(UserService::new(state).show(actor.user_id).await?))
}

/// GET /api/users/:id
pub async fn show(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<User> {
    actor.require(APPROVERS)?;
    Ok(ApiResponse::success(UserService::new(state).show(id).await?))
}

/// POST /api/users
pub async fn create(State(state): State<AppState>, actor: Actor, Json(input): Json<UserInput>) -> ApiResult<User> {
    actor.require(APPROVERS)?;
    let user = UserService::new(state).create(input, &actor).await?;
    Ok(ApiResponse::created(user).message("User created"))
}

/// POST /api/users/:id/activate
pub async fn activate(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<User> {
    actor.require(APPROVERS)?;
    Ok(ApiResponse::success(UserService::new(state).activate(id).await?))
}

/// POST /api/users/:id/deactivate
pub async fn deactivate(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<User> {
    actor.require(APPROVERS)?;
    Ok(ApiResponse::success(UserService::new(state).deactivate(id, &actor).await?))
}
