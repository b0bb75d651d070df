use async_trait::async_trait;
use sqlx::PgConnection;

use super::{NotificationEvent, Notifier, NotifyError, Recipient};

/// Emits one structured log line per event
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, _conn: &mut PgConnection, event: &NotificationEvent) -> Result<(), NotifyError> {
        let recipient = match event.recipient {
            Recipient::User(id) => format!("user:{}", id),
            Recipient::Role(role) => format!("role:{}", role.label()),
        };
        tracing::info!(
            target: "notifications",
            recipient = %recipient,
            kind = event.kind.as_str(),
            entity = event.entity_type,
            id = event.entity_id,
            "{}",
            event.title
        );
        Ok(())
    }
}
