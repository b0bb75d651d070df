// handlers/mod.rs - HTTP handlers in two tiers
//
// Public (no auth) → Protected (bearer token, role groups)
//
// Handlers stay thin: extract, check the role group, call the service,
// wrap the result in `ApiResponse`. Routing lives in `crate::routes`.

pub mod protected; // Tier 2: bearer token required (/api/*)
pub mod public; // Tier 1: no authentication (/, /health)
