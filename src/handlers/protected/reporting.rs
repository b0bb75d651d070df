use axum::extract::{Query, State};

use crate::middleware::{Actor, ApiResponse, ApiResult};
use crate::services::reporting::{Dashboard, DashboardQuery, ReportingService};
use crate::state::AppState;

/// GET /api/reporting/dashboard - Status counts, amounts and pending approvals
pub async fn dashboard(
    State(state): State<AppState>,
    _actor: Actor,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<Dashboard> {
    Ok(ApiResponse::success(ReportingService::new(state).dashboard(&query).await?))
}
