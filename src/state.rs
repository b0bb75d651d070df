use sqlx::PgPool;
use std::sync::Arc;

use crate::notify::NotificationDispatcher;

/// Shared handles passed to every handler through axum `State`
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub notifier: Arc<NotificationDispatcher>,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            notifier: Arc::new(NotificationDispatcher::standard()),
        }
    }
}
