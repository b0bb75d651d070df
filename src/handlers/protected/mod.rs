// handlers/protected/mod.rs - Protected handlers (bearer token required)
//
// Every handler takes an `Actor` extractor, which rejects the request with
// 401 before the handler body runs. Role groups are checked first thing in
// each handler; row ownership and per-action roles are enforced by the
// services.
//
// Route Prefix: /api/*

pub mod clients;
pub mod contracts;
pub mod employees;
pub mod enterprise_orders;
pub mod equipment;
pub mod evaluations;
pub mod expenses;
pub mod interventions;
pub mod leave_requests;
pub mod notifications;
pub mod purchase_orders;
pub mod quotes;
pub mod recruitment;
pub mod reporting;
pub mod salaries;
pub mod stocks;
pub mod suppliers;
pub mod taxes;
pub mod users;

use axum::Json;
use serde::Deserialize;

use crate::services::transition::ActionInput;

/// The body of an action endpoint is optional
pub(crate) fn action_input(body: Option<Json<ActionInput>>) -> ActionInput {
    body.map(|Json(input)| input).unwrap_or_default()
}

/// `page` / `per_page` for nested listings
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}
