//! The caller's own notification inbox.

use serde::{Deserialize, Serialize};

use crate::database::models::Notification;
use crate::database::{Page, PageRequest, Repository};
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::services::{Criteria, LIST_ORDER};
use crate::state::AppState;

const TABLE: &str = "notifications";

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    pub unread_only: Option<bool>,
    pub kind: Option<String>,
    pub entity_type: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub updated: u64,
}

pub struct NotificationService {
    state: AppState,
}

impl NotificationService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    fn repo(&self) -> Repository<Notification> {
        Repository::new(TABLE, &self.state.pool)
    }

    pub async fn list(&self, query: &NotificationQuery, actor: &Actor) -> Result<Page<Notification>, ApiError> {
        let criteria = Criteria::new()
            .eq("user_id", actor.user_id)
            .eq_opt("is_read", query.unread_only.filter(|u| *u).map(|_| false))
            .eq_opt("kind", query.kind.clone())
            .eq_opt("entity_type", query.entity_type.clone())
            .build();
        let request = PageRequest::new(query.page, query.per_page);
        Ok(self.repo().page(criteria, LIST_ORDER, &request).await?)
    }

    pub async fn unread_count(&self, actor: &Actor) -> Result<UnreadCount, ApiError> {
        let criteria = Criteria::new().eq("user_id", actor.user_id).eq("is_read", false).build();
        Ok(UnreadCount {
            unread: self.repo().count(criteria).await?,
        })
    }

    /// Someone else's notification is reported as missing
    pub async fn mark_read(&self, id: i64, actor: &Actor) -> Result<Notification, ApiError> {
        let notification = sqlx::query_as::<_, Notification>(
            "UPDATE notifications SET is_read = TRUE, read_at = COALESCE(read_at, now()) \
             WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(actor.user_id)
        .fetch_optional(&self.state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification not found"))?;
        Ok(notification)
    }

    pub async fn mark_all_read(&self, actor: &Actor) -> Result<MarkedRead, ApiError> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE, read_at = now() WHERE user_id = $1 AND NOT is_read",
        )
        .bind(actor.user_id)
        .execute(&self.state.pool)
        .await?;
        tracing::debug!(user_id = actor.user_id, updated = result.rows_affected(), "notifications marked read");
        Ok(MarkedRead {
            updated: result.rows_affected(),
        })
    }

    pub async fn delete(&self, id: i64, actor: &Actor) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(actor.user_id)
            .execute(&self.state.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::not_found("Notification not found"));
        }
        Ok(())
    }
}
