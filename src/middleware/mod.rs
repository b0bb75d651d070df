pub mod auth;
pub mod response;

pub use auth::Actor;
pub use response::{ApiResponse, ApiResult};
