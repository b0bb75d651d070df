use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgExecutor};

use super::manager::DatabaseError;
use super::value::{bind_query_as, SqlValue};

/// Ordered column assignments for an INSERT or UPDATE ... RETURNING *.
///
/// Column names are static strings chosen by the services, never taken
/// from request input.
#[derive(Debug, Default, Clone)]
pub struct Changes {
    columns: Vec<(&'static str, SqlValue)>,
}

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.push(column, value.into());
        self
    }

    /// Assign only when a value was supplied (partial updates)
    pub fn set_opt<V: Into<SqlValue>>(mut self, column: &'static str, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.push(column, v.into());
        }
        self
    }

    fn push(&mut self, column: &'static str, value: SqlValue) {
        if let Some(existing) = self.columns.iter_mut().find(|(c, _)| *c == column) {
            existing.1 = value;
        } else {
            self.columns.push((column, value));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|(c, _)| *c == column)
    }

    pub fn insert_sql(&self, table: &str) -> String {
        let names: Vec<&str> = self.columns.iter().map(|(c, _)| *c).collect();
        let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("${}", i)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            table,
            names.join(", "),
            placeholders.join(", ")
        )
    }

    /// The record id binds as the last parameter
    pub fn update_sql(&self, table: &str) -> String {
        let assignments: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, (c, _))| format!("{} = ${}", c, i + 1))
            .collect();
        format!(
            "UPDATE {} SET {}, updated_at = now() WHERE id = ${} RETURNING *",
            table,
            assignments.join(", "),
            self.columns.len() + 1
        )
    }

    pub async fn insert<'c, T, E>(self, table: &str, executor: E) -> Result<T, DatabaseError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
        E: PgExecutor<'c>,
    {
        let sql = self.insert_sql(table);
        let mut q = sqlx::query_as::<_, T>(&sql);
        for (_, value) in self.columns {
            q = bind_query_as(q, value);
        }
        Ok(q.fetch_one(executor).await?)
    }

    /// Update one row by id. With no assignments only `updated_at` moves.
    pub async fn update<'c, T, E>(self, table: &str, id: i64, executor: E) -> Result<T, DatabaseError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
        E: PgExecutor<'c>,
    {
        let sql = if self.columns.is_empty() {
            format!("UPDATE {} SET updated_at = now() WHERE id = $1 RETURNING *", table)
        } else {
            self.update_sql(table)
        };
        let mut q = sqlx::query_as::<_, T>(&sql);
        for (_, value) in self.columns {
            q = bind_query_as(q, value);
        }
        q.bind(id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("{} {} not found", table, id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_insert_with_numbered_placeholders() {
        let changes = Changes::new().set("nom", "ACME").set("status", "en_attente").set("created_by", 7_i64);
        assert_eq!(
            changes.insert_sql("suppliers"),
            "INSERT INTO suppliers (nom, status, created_by) VALUES ($1, $2, $3) RETURNING *"
        );
    }

    #[test]
    fn builds_update_with_trailing_id() {
        let changes = Changes::new().set("nom", "ACME").set_opt::<String>("ville", None).set("pays", "SN");
        assert_eq!(
            changes.update_sql("suppliers"),
            "UPDATE suppliers SET nom = $1, pays = $2, updated_at = now() WHERE id = $3 RETURNING *"
        );
    }

    #[test]
    fn later_assignment_replaces_earlier() {
        let changes = Changes::new().set("status", "draft").set("status", "pending");
        assert!(changes.contains("status"));
        assert_eq!(changes.insert_sql("contracts"), "INSERT INTO contracts (status) VALUES ($1) RETURNING *");
    }
}
