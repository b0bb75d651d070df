//! Notifications raised by workflow outcomes.
//!
//! Sinks receive the open transaction so persisted notifications commit or
//! roll back together with the status change that produced them.

pub mod database;
pub mod log;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::PgConnection;
use thiserror::Error;

use crate::auth::Role;
use crate::database::manager::DatabaseError;
use crate::middleware::Actor;
use crate::workflow::{Action, Outcome};

pub use database::DatabaseNotifier;
pub use log::LogNotifier;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for NotifyError {
    fn from(err: sqlx::Error) -> Self {
        NotifyError::Database(err.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Success => "success",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    User(i64),
    /// Every active user holding the role
    Role(Role),
}

/// What a notification points at
#[derive(Debug, Clone, Copy)]
pub struct EntityRef {
    pub entity_type: &'static str,
    /// Human label used in titles, e.g. "Bon de commande"
    pub label: &'static str,
    /// Front-end route prefix, e.g. "/purchase-orders"
    pub route: &'static str,
}

#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub recipient: Recipient,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub entity_type: &'static str,
    pub entity_id: i64,
    pub action_route: String,
    pub metadata: Value,
}

impl NotificationEvent {
    fn base(entity: &EntityRef, id: i64, recipient: Recipient, kind: NotificationKind) -> Self {
        Self {
            recipient,
            title: String::new(),
            message: String::new(),
            kind,
            entity_type: entity.entity_type,
            entity_id: id,
            action_route: format!("{}/{}", entity.route, id),
            metadata: json!({}),
        }
    }

    /// A new document awaiting approval
    pub fn submission(entity: &EntityRef, id: i64, actor: &Actor) -> Self {
        Self::submission_to(entity, id, actor, Role::Patron)
    }

    pub fn submission_to(entity: &EntityRef, id: i64, actor: &Actor, role: Role) -> Self {
        let mut event = Self::base(entity, id, Recipient::Role(role), NotificationKind::Info);
        event.title = format!("Soumission {}", entity.label);
        event.message = format!("{} #{} soumis par {}", entity.label, id, actor_name(actor));
        event.metadata = json!({ "submitted_by": actor.user_id });
        event
    }

    /// Route a transition outcome. Returns None when nobody should hear about
    /// it (the document has no owner to inform).
    pub fn for_transition(
        entity: &EntityRef,
        id: i64,
        action: Action,
        new_status: &str,
        owner: Option<i64>,
        reason: Option<&str>,
        actor: &Actor,
    ) -> Option<Self> {
        match action.outcome() {
            Outcome::Submission => Some(Self::submission(entity, id, actor)),
            Outcome::Approval => {
                let mut event = Self::base(entity, id, Recipient::User(owner?), NotificationKind::Success);
                event.title = format!("Validation {}", entity.label);
                event.message = format!("{} #{} a été validé par {}", entity.label, id, actor_name(actor));
                event.metadata = json!({ "status": new_status, "action": action });
                Some(event)
            }
            Outcome::Rejection => {
                let mut event = Self::base(entity, id, Recipient::User(owner?), NotificationKind::Error);
                event.title = format!("Rejet {}", entity.label);
                event.message = match reason {
                    Some(reason) => format!("{} #{} a été rejeté : {}", entity.label, id, reason),
                    None => format!("{} #{} a été rejeté", entity.label, id),
                };
                event.metadata = json!({ "status": new_status, "action": action, "reason": reason });
                Some(event)
            }
            Outcome::Progress => {
                let mut event = Self::base(entity, id, Recipient::User(owner?), NotificationKind::Info);
                event.title = format!("Mise à jour {}", entity.label);
                event.message = format!("{} #{} est maintenant {}", entity.label, id, new_status);
                event.metadata = json!({ "status": new_status, "action": action });
                Some(event)
            }
        }
    }
}

fn actor_name(actor: &Actor) -> String {
    if actor.name.is_empty() {
        format!("utilisateur #{}", actor.user_id)
    } else {
        actor.name.clone()
    }
}

/// A notification sink
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(&self, conn: &mut PgConnection, event: &NotificationEvent) -> Result<(), NotifyError>;
}

/// Fans an event out to every configured sink, in order
pub struct NotificationDispatcher {
    sinks: Vec<Box<dyn Notifier>>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with_sink(mut self, sink: impl Notifier + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Persisted rows plus a log line
    pub fn standard() -> Self {
        Self::new().with_sink(DatabaseNotifier).with_sink(LogNotifier)
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    pub async fn dispatch(&self, conn: &mut PgConnection, event: &NotificationEvent) -> Result<(), NotifyError> {
        for sink in &self.sinks {
            sink.notify(&mut *conn, event).await?;
        }
        Ok(())
    }
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER: EntityRef = EntityRef {
        entity_type: "purchase_order",
        label: "Bon de commande",
        route: "/purchase-orders",
    };

    fn patron() -> Actor {
        Actor {
            user_id: 1,
            role: Role::Patron,
            name: "Fatou".into(),
        }
    }

    #[test]
    fn submissions_go_to_patron() {
        let event = NotificationEvent::for_transition(&ORDER, 5, Action::Submit, "pending", Some(3), None, &patron())
            .unwrap();
        assert_eq!(event.recipient, Recipient::Role(Role::Patron));
        assert_eq!(event.title, "Soumission Bon de commande");
        assert_eq!(event.action_route, "/purchase-orders/5");
    }

    #[test]
    fn approvals_and_rejections_go_to_owner() {
        let approved =
            NotificationEvent::for_transition(&ORDER, 5, Action::Validate, "valide", Some(3), None, &patron()).unwrap();
        assert_eq!(approved.recipient, Recipient::User(3));
        assert_eq!(approved.kind, NotificationKind::Success);

        let rejected = NotificationEvent::for_transition(
            &ORDER,
            5,
            Action::Reject,
            "annule",
            Some(3),
            Some("prix trop élevé"),
            &patron(),
        )
        .unwrap();
        assert_eq!(rejected.kind, NotificationKind::Error);
        assert_eq!(rejected.metadata["reason"], json!("prix trop élevé"));
        assert!(rejected.message.ends_with("prix trop élevé"));
    }

    #[test]
    fn ownerless_outcomes_are_dropped() {
        assert!(NotificationEvent::for_transition(&ORDER, 5, Action::Deliver, "livre", None, None, &patron()).is_none());
    }

    #[test]
    fn standard_dispatcher_has_both_sinks() {
        assert_eq!(NotificationDispatcher::standard().sink_names(), vec!["database", "log"]);
    }
}
