// The inbox is always the caller's own; ids belonging to someone else read as missing.

use axum::extract::{Path, Query, State};

use crate::database::models::Notification;
use crate::middleware::{Actor, ApiResponse, ApiResult};
use crate::services::notifications::{MarkedRead, NotificationQuery, NotificationService, UnreadCount};
use crate::state::AppState;

/// GET /api/notifications
pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Vec<Notification>> {
    Ok(ApiResponse::page(NotificationService::new(state).list(&query, &actor).await?))
}

/// GET /api/notifications/unread-count
pub async fn unread_count(State(state): State<AppState>, actor: Actor) -> ApiResult<UnreadCount> {
    Ok(ApiResponse::success(NotificationService::new(state).unread_count(&actor).await?))
}

/// POST /api/notifications/:id/read
pub async fn mark_read(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<Notification> {
    Ok(ApiResponse::success(NotificationService::new(state).mark_read(id, &actor).await?))
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(State(state): State<AppState>, actor: Actor) -> ApiResult<MarkedRead> {
    Ok(ApiResponse::success(NotificationService::new(state).mark_all_read(&actor).await?))
}

/// DELETE /api/notifications/:id
pub async fn delete(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> ApiResult<()> {
    NotificationService::new(state).delete(id, &actor).await?;
    Ok(ApiResponse::success(()).message("Notification deleted"))
}
