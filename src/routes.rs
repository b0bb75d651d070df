use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::config;
use crate::handlers::{protected, public};
use crate::state::AppState;

/// Full application router
pub fn app(state: AppState) -> Router {
    let router = Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        // Sales
        .merge(client_routes())
        .merge(purchase_order_routes())
        .merge(enterprise_order_routes())
        .merge(quote_routes())
        // Finance
        .merge(supplier_routes())
        .merge(expense_routes())
        .merge(salary_routes())
        .merge(stock_routes())
        .merge(tax_routes())
        // Human resources
        .merge(employee_routes())
        .merge(contract_routes())
        .merge(leave_routes())
        .merge(evaluation_routes())
        .merge(recruitment_routes())
        // Technical
        .merge(intervention_routes())
        .merge(equipment_routes())
        // Cross-cutting
        .merge(notification_routes())
        .merge(reporting_routes())
        .merge(user_routes())
        // Global middleware
        .layer(DefaultBodyLimit::max(config().api.max_request_size_bytes))
        .layer(cors_layer());

    let router = if config().api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    };
    router.with_state(state)
}

fn cors_layer() -> CorsLayer {
    let security = &config().security;
    if !security.enable_cors {
        return CorsLayer::new();
    }
    if security.cors_origins.is_empty() || security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

fn client_routes() -> Router<AppState> {
    use protected::clients;

    Router::new()
        .route("/api/clients", get(clients::list).post(clients::create))
        .route(
            "/api/clients/:id",
            get(clients::show).put(clients::update).delete(clients::delete),
        )
        .route("/api/clients/:id/:action", post(clients::act))
}

fn purchase_order_routes() -> Router<AppState> {
    use protected::purchase_orders as orders;

    Router::new()
        .route("/api/purchase-orders", get(orders::list).post(orders::create))
        .route("/api/purchase-orders/stats", get(orders::stats))
        .route(
            "/api/purchase-orders/:id",
            get(orders::show).put(orders::update).delete(orders::delete),
        )
        .route("/api/purchase-orders/:id/duplicate", post(orders::duplicate))
        .route("/api/purchase-orders/:id/:action", post(orders::act))
}

fn enterprise_order_routes() -> Router<AppState> {
    use protected::enterprise_orders as orders;

    Router::new()
        .route("/api/enterprise-orders", get(orders::list).post(orders::create))
        .route(
            "/api/enterprise-orders/:id",
            get(orders::show).put(orders::update).delete(orders::delete),
        )
        .route("/api/enterprise-orders/:id/invoice", post(orders::invoice))
        .route("/api/enterprise-orders/:id/:action", post(orders::act))
}

fn quote_routes() -> Router<AppState> {
    use protected::quotes;

    Router::new()
        .route("/api/quotes", get(quotes::list).post(quotes::create))
        .route(
            "/api/quotes/:id",
            get(quotes::show).put(quotes::update).delete(quotes::delete),
        )
        .route("/api/quotes/:id/totals", get(quotes::totals))
        .route("/api/quotes/:id/duplicate", post(quotes::duplicate))
        .route("/api/quotes/:id/:action", post(quotes::act))
}

fn supplier_routes() -> Router<AppState> {
    use protected::suppliers;

    Router::new()
        .route("/api/suppliers", get(suppliers::list).post(suppliers::create))
        .route("/api/suppliers/stats", get(suppliers::stats))
        .route(
            "/api/suppliers/:id",
            get(suppliers::show).put(suppliers::update).delete(suppliers::delete),
        )
        .route("/api/suppliers/:id/rate", post(suppliers::rate))
        .route("/api/suppliers/:id/:action", post(suppliers::act))
}

fn expense_routes() -> Router<AppState> {
    use protected::expenses;

    Router::new()
        .route("/api/expenses", get(expenses::list).post(expenses::create))
        .route("/api/expenses/stats", get(expenses::stats))
        .route(
            "/api/expenses/:id",
            get(expenses::show).put(expenses::update).delete(expenses::delete),
        )
        .route("/api/expenses/:id/:action", post(expenses::act))
}

fn salary_routes() -> Router<AppState> {
    use protected::salaries;

    Router::new()
        .route("/api/salaries", get(salaries::list).post(salaries::create))
        .route("/api/salaries/stats", get(salaries::stats))
        .route(
            "/api/salaries/:id",
            get(salaries::show).put(salaries::update).delete(salaries::delete),
        )
        .route("/api/salaries/:id/:action", post(salaries::act))
}

fn stock_routes() -> Router<AppState> {
    use protected::stocks;

    Router::new()
        .route("/api/stocks", get(stocks::list).post(stocks::create))
        .route("/api/stocks/low", get(stocks::low))
        .route(
            "/api/stocks/:id",
            get(stocks::show).put(stocks::update).delete(stocks::delete),
        )
        .route("/api/stocks/:id/add", post(stocks::add))
        .route("/api/stocks/:id/remove", post(stocks::remove))
        .route("/api/stocks/:id/adjust", post(stocks::adjust))
        .route("/api/stocks/:id/movements", get(stocks::movements))
        .route("/api/stocks/:id/:action", post(stocks::act))
}

fn tax_routes() -> Router<AppState> {
    use protected::taxes;

    Router::new()
        .route("/api/taxes", get(taxes::list).post(taxes::create))
        .route("/api/taxes/stats", get(taxes::stats))
        .route("/api/taxes/:id", get(taxes::show).put(taxes::update).delete(taxes::delete))
        .route("/api/taxes/:id/:action", post(taxes::act))
}

fn employee_routes() -> Router<AppState> {
    use protected::employees;

    Router::new()
        .route("/api/employees", get(employees::list).post(employees::create))
        .route("/api/employees/stats", get(employees::stats))
        .route(
            "/api/employees/:id",
            get(employees::show).put(employees::update).delete(employees::delete),
        )
        .route("/api/employees/:id/:action", post(employees::act))
}

fn contract_routes() -> Router<AppState> {
    use protected::contracts;

    Router::new()
        .route("/api/contracts", get(contracts::list).post(contracts::create))
        .route("/api/contracts/expiring", get(contracts::expiring))
        .route(
            "/api/contracts/:id",
            get(contracts::show).put(contracts::update).delete(contracts::delete),
        )
        .route("/api/contracts/:id/:action", post(contracts::act))
}

fn leave_routes() -> Router<AppState> {
    use protected::leave_requests as leave;

    Router::new()
        .route("/api/leave-requests", get(leave::list).post(leave::create))
        .route("/api/leave-requests/check-conflicts", post(leave::check_conflicts))
        .route("/api/leave-requests/stats", get(leave::stats))
        .route("/api/leave-requests/balance/:employee_id", get(leave::balance))
        .route(
            "/api/leave-requests/:id",
            get(leave::show).put(leave::update).delete(leave::delete),
        )
        .route("/api/leave-requests/:id/:action", post(leave::act))
}

fn evaluation_routes() -> Router<AppState> {
    use protected::evaluations;

    Router::new()
        .route("/api/evaluations", get(evaluations::list).post(evaluations::create))
        .route("/api/evaluations/mine", get(evaluations::mine))
        .route(
            "/api/evaluations/:id",
            get(evaluations::show).put(evaluations::update).delete(evaluations::delete),
        )
        .route("/api/evaluations/:id/:action", post(evaluations::act))
}

fn recruitment_routes() -> Router<AppState> {
    use protected::recruitment;

    Router::new()
        .route(
            "/api/recruitment-requests",
            get(recruitment::list_requests).post(recruitment::create_request),
        )
        .route(
            "/api/recruitment-requests/:id",
            get(recruitment::show_request)
                .put(recruitment::update_request)
                .delete(recruitment::delete_request),
        )
        .route("/api/recruitment-requests/:id/:action", post(recruitment::act_request))
        .route(
            "/api/recruitment-applications",
            get(recruitment::list_applications).post(recruitment::create_application),
        )
        .route(
            "/api/recruitment-applications/:id",
            get(recruitment::show_application)
                .put(recruitment::update_application)
                .delete(recruitment::delete_application),
        )
        .route(
            "/api/recruitment-applications/:id/:action",
            post(recruitment::act_application),
        )
}

fn intervention_routes() -> Router<AppState> {
    use protected::interventions;

    Router::new()
        .route("/api/interventions", get(interventions::list).post(interventions::create))
        .route("/api/interventions/overdue", get(interventions::overdue))
        .route(
            "/api/interventions/:id",
            get(interventions::show)
                .put(interventions::update)
                .delete(interventions::delete),
        )
        .route("/api/interventions/:id/:action", post(interventions::act))
}

fn equipment_routes() -> Router<AppState> {
    use protected::equipment;

    Router::new()
        .route("/api/equipment", get(equipment::list).post(equipment::create))
        .route("/api/equipment/warranty-expiring", get(equipment::warranty_expiring))
        .route(
            "/api/equipment/:id",
            get(equipment::show).put(equipment::update).delete(equipment::delete),
        )
        .route("/api/equipment/:id/assign", post(equipment::assign))
        .route("/api/equipment/:id/return", post(equipment::return_equipment))
}

fn notification_routes() -> Router<AppState> {
    use axum::routing::delete;
    use protected::notifications;

    Router::new()
        .route("/api/notifications", get(notifications::list))
        .route("/api/notifications/unread-count", get(notifications::unread_count))
        .route("/api/notifications/read-all", post(notifications::mark_all_read))
        .route("/api/notifications/:id", delete(notifications::delete))
        .route("/api/notifications/:id/read", post(notifications::mark_read))
}

fn reporting_routes() -> Router<AppState> {
    Router::new().route("/api/reporting/dashboard", get(protected::reporting::dashboard))
}

fn user_routes() -> Router<AppState> {
    use protected::users;

    Router::new()
        .route("/api/users", get(users::list).post(users::create))
        .route("/api/users/me", get(users::me))
        .route("/api/users/:id", get(users::show))
        .route("/api/users/:id/activate", post(users::activate))
        .route("/api/users/:id/deactivate", post(users::deactivate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{generate_jwt, Claims, Role};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    fn router() -> Router {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://easyconnect@127.0.0.1:1/easyconnect")
            .unwrap();
        app(AppState::new(pool))
    }

    async fn status_of(method: &str, uri: &str) -> StatusCode {
        let request = Request::builder().method(method).uri(uri);
        let response = router()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.status()
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        for uri in ["/api/clients", "/api/stocks/low", "/api/reporting/dashboard", "/api/users/me"] {
            assert_eq!(status_of("GET", uri).await, StatusCode::UNAUTHORIZED, "{}", uri);
        }
        assert_eq!(
            status_of("POST", "/api/quotes/1/send").await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn oversized_bodies_are_rejected() {
        let token = generate_jwt(&Claims::new(1, Role::Comptable, "Awa", Some(1))).unwrap();
        let body = format!("{{\"nom\": \"{}\"}}", "x".repeat(config().api.max_request_size_bytes));
        let request = Request::builder()
            .method("POST")
            .uri("/api/suppliers")
            .header("authorization", format!("Bearer {}", token))
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        assert_eq!(status_of("GET", "/api/nothing-here").await, StatusCode::NOT_FOUND);
    }
}
