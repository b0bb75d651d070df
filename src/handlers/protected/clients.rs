use axum::extract::{Path, Query, State};
use axum::Json;

use crate::auth::role::SALES;
use crate::database::models::Client;
use crate::middleware::{Actor, ApiResponse, ApiResult};
use crate::services::clients::{ClientInput, ClientQuery, ClientService};
use crate::services::transition::{parse_action, ActionInput};
use crate::services::Detail;
use crate::state::AppState;

use super::action_input;

/// GET /api/clients - Commercial users only see their own clients
pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ClientQuery>,
) -> ApiResult<Vec<Client>> {
    actor.require(SALES)?;
    Ok(ApiResponse::page(ClientService::new(state).list(&query, &actor).await?))
}

/// GET /api/clients/:id
pub async fn show(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<Detail<Client>> {
    actor.require(SALES)?;
    Ok(ApiResponse::success(ClientService::new(state).show(id, &actor).await?))
}

/// POST /api/clients
pub async fn create(State(state): State<AppState>, actor: Actor, Json(input): Json<ClientInput>) -> ApiResult<Client> {
    actor.require(SALES)?;
    let client = ClientService::new(state).create(input, &actor).await?;
    Ok(ApiResponse::created(client).message("Client created"))
}

/// PUT /api/clients/:id
pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(input): Json<ClientInput>,
) -> ApiResult<Client> {
    actor.require(SALES)?;
    let client = ClientService::new(state).update(id, input, &actor).await?;
    Ok(ApiResponse::success(client).message("Client updated"))
}

/// DELETE /api/clients/:id
pub async fn delete(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<()> {
    actor.require(SALES)?;
    ClientService::new(state).delete(id, &actor).await?;
    Ok(ApiResponse::success(()).message("Client deleted"))
}

/// POST /api/clients/:id/:action - validate, reject
pub async fn act(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, action)): Path<(i64, String)>,
    body: Option<Json<ActionInput>>,
) -> ApiResult<Client> {
    actor.require(SALES)?;
    let action = parse_action(&action)?;
    let client = ClientService::new(state)
        .act(id, action, action_input(body), &actor)
        .await?;
    Ok(ApiResponse::success(client))
}
