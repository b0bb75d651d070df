use axum::extract::{Path, Query, State};
use axum::Json;

use crate::auth::role::HR;
use crate::database::models::{RecruitmentApplication, RecruitmentRequest};
use crate::middleware::{Actor, ApiResponse, ApiResult};
use crate::services::recruitment::{
    ApplicationInput, ApplicationQuery, RecruitmentService, RequestInput, RequestQuery,
};
use crate::services::transition::{parse_action, ActionInput};
use crate::services::Detail;
use crate::state::AppState;

use super::action_input;

/// GET /api/recruitment-requests
pub async fn list_requests(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<RequestQuery>,
) -> ApiResult<Vec<RecruitmentRequest>> {
    actor.require(HR)?;
    Ok(ApiResponse::page(RecruitmentService::new(state).list_requests(&query).await?))
}

/// GET /api/recruitment-requests/:id
pub async fn show_request(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> ApiResult<Detail<RecruitmentRequest>> {
    actor.require(HR)?;
    Ok(ApiResponse::success(RecruitmentService::new(state).show_request(id).await?))
}

/// POST /api/recruitment-requests
pub async fn create_request(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<RequestInput>,
) -> ApiResult<RecruitmentRequest> {
    actor.require(HR)?;
    let request = RecruitmentService::new(state).create_request(input, &actor).await?;
    Ok(ApiResponse::created(request).message("Recruitment request created"))
}

/// PUT /api/recruitment-requests/:id
pub async fn update_request(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(input): Json<RequestInput>,
) -> ApiResult<RecruitmentRequest> {
    actor.require(HR)?;
    let request = RecruitmentService::new(state).update_request(id, input).await?;
    Ok(ApiResponse::success(request).message("Recruitment request updated"))
}

/// DELETE /api/recruitment-requests/:id
pub async fn delete_request(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<()> {
    actor.require(HR)?;
    RecruitmentService::new(state).delete_request(id).await?;
    Ok(ApiResponse::success(()).message("Recruitment request deleted"))
}

/// POST /api/recruitment-requests/:id/:action - approve, publish, close, cancel
pub async fn act_request(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, action)): Path<(i64, String)>,
    body: Option<Json<ActionInput>>,
) -> ApiResult<RecruitmentRequest> {
    actor.require(HR)?;
    let action = parse_action(&action)?;
    let request = RecruitmentService::new(state)
        .act_request(id, action, action_input(body), &actor)
        .await?;
    Ok(ApiResponse::success(request))
}

/// GET /api/recruitment-applications
pub async fn list_applications(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ApplicationQuery>,
) -> ApiResult<Vec<RecruitmentApplication>> {
    actor.require(HR)?;
    Ok(ApiResponse::page(RecruitmentService::new(state).list_applications(&query).await?))
}

/// GET /api/recruitment-applications/:id
pub async fn show_application(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> ApiResult<Detail<RecruitmentApplication>> {
    actor.require(HR)?;
    Ok(ApiResponse::success(RecruitmentService::new(state).show_application(id).await?))
}

/// POST /api/recruitment-applications - Only published requests before their deadline accept candidates
pub async fn create_application(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<ApplicationInput>,
) -> ApiResult<RecruitmentApplication> {
    actor.require(HR)?;
    let application = RecruitmentService::new(state).create_application(input).await?;
    Ok(ApiResponse::created(application).message("Application recorded"))
}

/// PUT /api/recruitment-applications/:id
pub async fn update_application(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(input): Json<ApplicationInput>,
) -> ApiResult<RecruitmentApplication> {
    actor.require(HR)?;
    let application = RecruitmentService::new(state).update_application(id, input).await?;
    Ok(ApiResponse::success(application).message("Application updated"))
}

/// DELETE /api/recruitment-applications/:id
pub async fn delete_application(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<()> {
    actor.require(HR)?;
    RecruitmentService::new(state).delete_application(id).await?;
    Ok(ApiResponse::success(()).message("Application deleted"))
}

/// POST /api/recruitment-applications/:id/:action - review, shortlist, interview, hire, reject
pub async fn act_application(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, action)): Path<(i64, String)>,
    body: Option<Json<ActionInput>>,
) -> ApiResult<RecruitmentApplication> {
    actor.require(HR)?;
    let action = parse_action(&action)?;
    let application = RecruitmentService::new(state)
        .act_application(id, action, action_input(body), &actor)
        .await?;
    Ok(ApiResponse::success(application))
}
