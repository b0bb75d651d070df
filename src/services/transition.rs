use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{postgres::PgRow, FromRow, PgConnection, Postgres, Row};
use tracing::info;

use crate::config::config;
use crate::database::{Changes, SqlValue};
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::notify::{EntityRef, NotificationEvent};
use crate::state::AppState;
use crate::workflow::{Action, Machine, Status};

/// Where a workflow entity lives and who hears about its outcomes
pub struct TransitionSpec<S: 'static> {
    pub table: &'static str,
    pub entity: EntityRef,
    pub machine: &'static Machine<S>,
    /// SQL expression over alias `t` yielding the owning user id as BIGINT
    pub owner: &'static str,
}

/// Optional body of `POST /api/<resource>/:id/<action>`
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ActionInput {
    pub reason: Option<String>,
    pub comments: Option<String>,
    pub notes: Option<String>,
    pub date: Option<NaiveDate>,
    pub actual_duration: Option<i32>,
    pub cost: Option<Decimal>,
}

impl ActionInput {
    /// Trimmed, non-empty reason or a 422 naming the field
    pub fn require_reason(&self) -> Result<String, ApiError> {
        match self.reason.as_deref().map(str::trim) {
            Some(reason) if !reason.is_empty() => Ok(reason.to_string()),
            _ => Err(ApiError::field("reason", "A reason is required for this action")),
        }
    }
}

pub fn parse_action(name: &str) -> Result<Action, ApiError> {
    Ok(name.parse::<Action>()?)
}

/// Lock the row and read its status inside `conn`'s transaction
pub async fn locked_status<S>(conn: &mut PgConnection, table: &str, id: i64) -> Result<S, ApiError>
where
    S: Status + for<'r> sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    let row = sqlx::query(&format!("SELECT status FROM {} WHERE id = $1 FOR UPDATE", table))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("{} {} not found", S::ENTITY, id)))?;
    Ok(row.try_get("status")?)
}

/// Lock the row, apply `action` through the machine, persist the new status
/// together with `extras`, and store the resulting notification, all in one
/// transaction.
pub async fn transition<S, T>(
    state: &AppState,
    spec: &TransitionSpec<S>,
    id: i64,
    actor: &Actor,
    action: Action,
    extras: Changes,
    reason: Option<&str>,
) -> Result<T, ApiError>
where
    S: Status + for<'r> sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres> + Into<SqlValue>,
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let mut tx = state.pool.begin().await?;

    let row = sqlx::query(&format!(
        "SELECT t.status, {} AS owner_id FROM {} t WHERE t.id = $1 FOR UPDATE OF t",
        spec.owner, spec.table
    ))
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found(format!("{} not found", spec.entity.label)))?;

    let current: S = row.try_get("status")?;
    let owner: Option<i64> = row.try_get("owner_id")?;
    let next = spec.machine.apply(current, action)?;

    let record: T = extras.set("status", next).update(spec.table, id, &mut *tx).await?;

    if let Some(event) =
        NotificationEvent::for_transition(&spec.entity, id, action, next.as_str(), owner, reason, actor)
    {
        state.notifier.dispatch(&mut *tx, &event).await?;
    }

    tx.commit().await?;

    info!(
        entity = S::ENTITY,
        id,
        action = %action,
        from = %current,
        to = %next,
        actor = actor.user_id,
        "status transition"
    );
    if config().security.enable_audit_logging {
        info!(
            target: "audit",
            entity = S::ENTITY,
            id,
            action = %action,
            actor = actor.user_id,
            role = %actor.role,
            reason = reason.unwrap_or(""),
            "workflow action"
        );
    }
    Ok(record)
}

/// Apply `changes` when the current status allows editing
pub async fn update_guarded<S, T>(
    state: &AppState,
    table: &str,
    machine: &Machine<S>,
    id: i64,
    changes: Changes,
) -> Result<T, ApiError>
where
    S: Status + for<'r> sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let mut tx = state.pool.begin().await?;
    let current: S = locked_status(&mut *tx, table, id).await?;
    machine.ensure_editable(current)?;
    let record = changes.update(table, id, &mut *tx).await?;
    tx.commit().await?;
    Ok(record)
}

/// Delete a row when its current status allows it
pub async fn delete_guarded<S>(state: &AppState, table: &str, machine: &Machine<S>, id: i64) -> Result<(), ApiError>
where
    S: Status + for<'r> sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    let mut tx = state.pool.begin().await?;
    let current: S = locked_status(&mut *tx, table, id).await?;
    machine.ensure_deletable(current)?;
    sqlx::query(&format!("DELETE FROM {} WHERE id = $1", table))
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    info!(entity = S::ENTITY, id, status = %current, "deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_must_not_be_blank() {
        let input = ActionInput {
            reason: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(input.require_reason().unwrap_err().status_code(), 422);

        let input = ActionInput {
            reason: Some(" hors budget ".into()),
            ..Default::default()
        };
        assert_eq!(input.require_reason().unwrap(), "hors budget");
    }

    #[test]
    fn unknown_action_names_are_bad_requests() {
        assert_eq!(parse_action("launch").unwrap_err().status_code(), 400);
        assert_eq!(parse_action("deliver").unwrap(), Action::Deliver);
    }
}
