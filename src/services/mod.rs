//! Business operations behind each resource.
//!
//! Handlers stay thin: they extract the caller and the request, check the
//! role group, then call into one of these services.

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
pub mod transition;
pub mod users;

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use serde_json::{json, Map, Value};
use sqlx::{PgConnection, PgPool, Postgres, Row};
use std::collections::BTreeMap;

use crate::database::DatabaseError;
use crate::workflow::{Action, Machine, Status};

/// Newest first, stable across equal timestamps
pub const LIST_ORDER: &str = "created_at desc, id desc";

/// A record with its line items and the actions its current status allows
#[derive(Debug, Serialize)]
pub struct Detail<T: Serialize, I: Serialize = ()> {
    #[serde(flatten)]
    pub record: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<I>>,
    pub allowed_actions: Vec<Action>,
}

impl<T: Serialize> Detail<T> {
    pub fn new<S: Status>(record: T, machine: &Machine<S>, status: S) -> Self {
        Self {
            record,
            items: None,
            allowed_actions: machine.allowed_actions(status),
        }
    }
}

impl<T: Serialize, I: Serialize> Detail<T, I> {
    pub fn with_items<S: Status>(record: T, items: Vec<I>, machine: &Machine<S>, status: S) -> Self {
        Self {
            record,
            items: Some(items),
            allowed_actions: machine.allowed_actions(status),
        }
    }
}

/// Builds the JSON WHERE documents understood by the filter compiler
#[derive(Debug, Default, Clone)]
pub struct Criteria {
    clauses: Map<String, Value>,
    any: Vec<Value>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.clauses.insert(column.to_string(), value.into());
        self
    }

    pub fn eq_opt<V: Into<Value>>(self, column: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.eq(column, v),
            None => self,
        }
    }

    /// Adds `op` to the operator object of `column`
    pub fn op(mut self, column: &str, op: &str, value: impl Into<Value>) -> Self {
        let entry = self.clauses.entry(column.to_string()).or_insert_with(|| json!({}));
        if !entry.is_object() {
            *entry = json!({ "$eq": entry.clone() });
        }
        if let Some(obj) = entry.as_object_mut() {
            obj.insert(op.to_string(), value.into());
        }
        self
    }

    pub fn op_opt<V: Into<Value>>(self, column: &str, op: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.op(column, op, v),
            None => self,
        }
    }

    /// Inclusive range on a DATE column
    pub fn date_range(self, column: &str, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.op_opt(column, "$gte", from.map(|d| d.to_string()))
            .op_opt(column, "$lte", to.map(|d| d.to_string()))
    }

    /// Range on a TIMESTAMPTZ column; `to` covers the whole day
    pub fn created_between(self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.op_opt("created_at", "$gte", from.map(|d| d.to_string()))
            .op_opt("created_at", "$lt", to.map(|d| (d + Duration::days(1)).to_string()))
    }

    /// Case-insensitive substring match on any of `columns`
    pub fn search(mut self, columns: &[&str], term: Option<&str>) -> Self {
        let term = match term.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return self,
        };
        let pattern = format!("%{}%", escape_like(term));
        self.any = columns
            .iter()
            .map(|column| {
                let mut condition = Map::new();
                condition.insert(column.to_string(), json!({ "$ilike": pattern }));
                Value::Object(condition)
            })
            .collect();
        self
    }

    /// Restrict to rows owned by `owner` when the caller is scoped
    pub fn owned_by(self, column: &str, owner: Option<i64>) -> Self {
        self.eq_opt(column, owner)
    }

    pub fn build(self) -> Value {
        let mut clauses = self.clauses;
        if !self.any.is_empty() {
            clauses.insert("$or".to_string(), Value::Array(self.any));
        }
        Value::Object(clauses)
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Money and scores are kept at two decimals, halves away from zero
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Next `<prefix>NNNN` reference for `column`, zero padded to `width`.
///
/// Takes a transaction-scoped advisory lock on the prefix, so `conn` must be
/// the transaction that inserts the row.
pub async fn next_reference(
    conn: &mut PgConnection,
    table: &str,
    column: &str,
    prefix: &str,
    width: usize,
) -> Result<String, DatabaseError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(format!("{}.{}:{}", table, column, prefix))
        .execute(&mut *conn)
        .await?;

    let last: Option<i64> = sqlx::query_scalar(&format!(
        "SELECT MAX(substring({col} FROM char_length($1) + 1)::bigint) FROM {table} \
         WHERE left({col}, char_length($1)) = $1 \
           AND substring({col} FROM char_length($1) + 1) ~ '^[0-9]{{1,18}}$'",
        col = column,
        table = table
    ))
    .bind(prefix)
    .fetch_one(&mut *conn)
    .await?;
    Ok(format_reference(prefix, last, width))
}

fn format_reference(prefix: &str, last: Option<i64>, width: usize) -> String {
    let next = last.map_or(1, |n| n + 1);
    format!("{}{:0width$}", prefix, next, width = width)
}

/// Row count per status, with every status of `S` present
pub async fn status_counts<S>(
    pool: &PgPool,
    table: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<BTreeMap<&'static str, i64>, DatabaseError>
where
    S: Status + for<'r> sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    let rows = sqlx::query(&format!(
        "SELECT status, COUNT(*) AS count FROM {} \
         WHERE ($1::date IS NULL OR created_at >= $1::date) \
           AND ($2::date IS NULL OR created_at < $2::date + 1) \
         GROUP BY status",
        table
    ))
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    let mut counts: BTreeMap<&'static str, i64> = S::all().iter().map(|s| (s.as_str(), 0)).collect();
    for row in rows {
        let status: S = row.try_get("status")?;
        counts.insert(status.as_str(), row.try_get("count")?);
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::machines::{PurchaseOrderStatus, PURCHASE_ORDER};

    #[test]
    fn criteria_combine_ranges_and_search() {
        let criteria = Criteria::new()
            .eq("status", "valide")
            .date_range("date_commande", NaiveDate::from_ymd_opt(2024, 1, 1), None)
            .op("montant_total", "$lte", 500)
            .search(&["nom", "email"], Some("acme"))
            .build();
        assert_eq!(
            criteria,
            json!({
                "status": "valide",
                "date_commande": {"$gte": "2024-01-01"},
                "montant_total": {"$lte": 500},
                "$or": [{"nom": {"$ilike": "%acme%"}}, {"email": {"$ilike": "%acme%"}}]
            })
        );
    }

    #[test]
    fn blank_search_and_missing_owner_add_nothing() {
        let criteria = Criteria::new().search(&["nom"], Some("  ")).owned_by("user_id", None).build();
        assert_eq!(criteria, json!({}));
    }

    #[test]
    fn created_between_covers_the_last_day() {
        let criteria = Criteria::new()
            .created_between(None, NaiveDate::from_ymd_opt(2024, 3, 31))
            .build();
        assert_eq!(criteria, json!({"created_at": {"$lt": "2024-04-01"}}));
    }

    #[test]
    fn search_escapes_like_wildcards() {
        let criteria = Criteria::new().search(&["sku"], Some("50%_off")).build();
        assert_eq!(criteria["$or"][0]["sku"]["$ilike"], json!("%50\\%\\_off%"));
    }

    #[test]
    fn references_increment_and_pad() {
        assert_eq!(format_reference("CTR-2024-", None, 4), "CTR-2024-0001");
        assert_eq!(format_reference("CTR-2024-", Some(41), 4), "CTR-2024-0042");
        assert_eq!(format_reference("TVA-2024-07-", Some(9), 3), "TVA-2024-07-010");
        assert_eq!(format_reference("DV-20240309-", Some(9999), 4), "DV-20240309-10000");
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round2(Decimal::new(12345, 3)), Decimal::new(1235, 2));
        assert_eq!(round2(Decimal::new(-12345, 3)), Decimal::new(-1235, 2));
    }

    #[test]
    fn detail_flattens_record() {
        let detail = Detail::new(json!({"id": 3, "status": "valide"}), &PURCHASE_ORDER, PurchaseOrderStatus::Valide);
        let value = serde_json::to_value(&detail).unwrap();
        assert_eq!(value["id"], json!(3));
        assert_eq!(value["allowed_actions"], json!(["start", "cancel"]));
        assert!(value.get("items").is_none());
    }
}
