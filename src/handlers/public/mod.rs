// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Service descriptor and health check for load balancers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde_json::{json, Value};

use crate::database::DatabaseManager;
use crate::state::AppState;

/// GET / - Service descriptor
pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "EasyConnect API",
            "version": version,
            "description": "Business management backend with status workflows",
            "endpoints": {
                "health": "/health (public)",
                "sales": "/api/clients, /api/quotes, /api/enterprise-orders, /api/purchase-orders",
                "finance": "/api/suppliers, /api/expenses, /api/salaries, /api/taxes, /api/stocks",
                "hr": "/api/employees, /api/contracts, /api/leave-requests, /api/evaluations, /api/recruitment-requests, /api/recruitment-applications",
                "technical": "/api/interventions, /api/equipment",
                "inbox": "/api/notifications",
                "reporting": "/api/reporting/dashboard",
                "users": "/api/users",
                "actions": "POST /api/<resource>/:id/<action>",
            }
        }
    }))
}

/// GET /health - Database ping, 503 when unreachable
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            let mut data = json!({
                "status": "degraded",
                "timestamp": now
            });
            if !crate::is_production!() {
                data["database_error"] = json!(e.to_string());
            }
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "message": "Database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": data
                })),
            )
        }
    }
}
