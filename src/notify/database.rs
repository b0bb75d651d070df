use async_trait::async_trait;
use sqlx::PgConnection;

use super::{NotificationEvent, Notifier, NotifyError, Recipient};

/// Persists one `notifications` row per recipient user
pub struct DatabaseNotifier;

const COLUMNS: &str = "user_id, title, message, kind, entity_type, entity_id, action_route, metadata";

#[async_trait]
impl Notifier for DatabaseNotifier {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn notify(&self, conn: &mut PgConnection, event: &NotificationEvent) -> Result<(), NotifyError> {
        let (sql, recipient_param) = match event.recipient {
            Recipient::User(user_id) => (
                format!(
                    "INSERT INTO notifications ({}) VALUES ($8, $1, $2, $3, $4, $5, $6, $7)",
                    COLUMNS
                ),
                user_id,
            ),
            Recipient::Role(role) => (
                format!(
                    "INSERT INTO notifications ({}) \
                     SELECT u.id, $1, $2, $3, $4, $5, $6, $7 FROM users u WHERE u.role = $8 AND u.is_active",
                    COLUMNS
                ),
                role.code() as i64,
            ),
        };

        let result = sqlx::query(&sql)
            .bind(&event.title)
            .bind(&event.message)
            .bind(event.kind.as_str())
            .bind(event.entity_type)
            .bind(event.entity_id)
            .bind(&event.action_route)
            .bind(&event.metadata)
            .bind(recipient_param)
            .execute(&mut *conn)
            .await?;

        tracing::debug!(
            entity = event.entity_type,
            id = event.entity_id,
            rows = result.rows_affected(),
            "notifications stored"
        );
        Ok(())
    }
}
