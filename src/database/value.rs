use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::PgArguments;
use sqlx::{FromRow, Postgres};

/// A typed bind parameter. Payloads are optional so NULL keeps its column type.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Bool(Option<bool>),
    Int(Option<i64>),
    Float(Option<f64>),
    Decimal(Option<Decimal>),
    Text(Option<String>),
    Date(Option<NaiveDate>),
    Timestamp(Option<DateTime<Utc>>),
    Json(Option<Value>),
}

impl SqlValue {
    /// Map a filter value onto a bind type. Strings shaped like dates or
    /// RFC 3339 timestamps bind as DATE / TIMESTAMPTZ so they compare
    /// against typed columns.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => SqlValue::Text(None),
            Value::Bool(b) => SqlValue::Bool(Some(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlValue::Int(Some(i))
                } else if let Some(f) = n.as_f64() {
                    SqlValue::Float(Some(f))
                } else {
                    SqlValue::Text(Some(n.to_string()))
                }
            }
            Value::String(s) => {
                if s.len() == 10 {
                    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                        return SqlValue::Date(Some(date));
                    }
                }
                if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                    return SqlValue::Timestamp(Some(ts.with_timezone(&Utc)));
                }
                SqlValue::Text(Some(s.clone()))
            }
            Value::Array(_) | Value::Object(_) => SqlValue::Json(Some(value.clone())),
        }
    }
}

macro_rules! sql_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for SqlValue {
                fn from(v: $ty) -> Self {
                    SqlValue::$variant(Some(v.into()))
                }
            }

            impl From<Option<$ty>> for SqlValue {
                fn from(v: Option<$ty>) -> Self {
                    SqlValue::$variant(v.map(Into::into))
                }
            }
        )*
    };
}

sql_value_from! {
    bool => Bool,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    f64 => Float,
    Decimal => Decimal,
    String => Text,
    &str => Text,
    NaiveDate => Date,
    DateTime<Utc> => Timestamp,
    Value => Json,
}

pub fn bind_query<'q>(
    q: sqlx::query::Query<'q, Postgres, PgArguments>,
    v: SqlValue,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match v {
        SqlValue::Bool(b) => q.bind(b),
        SqlValue::Int(i) => q.bind(i),
        SqlValue::Float(f) => q.bind(f),
        SqlValue::Decimal(d) => q.bind(d),
        SqlValue::Text(s) => q.bind(s),
        SqlValue::Date(d) => q.bind(d),
        SqlValue::Timestamp(t) => q.bind(t),
        SqlValue::Json(j) => q.bind(j),
    }
}

pub fn bind_query_as<'q, O>(
    q: sqlx::query::QueryAs<'q, Postgres, O, PgArguments>,
    v: SqlValue,
) -> sqlx::query::QueryAs<'q, Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, sqlx::postgres::PgRow>,
{
    match v {
        SqlValue::Bool(b) => q.bind(b),
        SqlValue::Int(i) => q.bind(i),
        SqlValue::Float(f) => q.bind(f),
        SqlValue::Decimal(d) => q.bind(d),
        SqlValue::Text(s) => q.bind(s),
        SqlValue::Date(d) => q.bind(d),
        SqlValue::Timestamp(t) => q.bind(t),
        SqlValue::Json(j) => q.bind(j),
    }
}

pub fn bind_query_scalar<'q, O>(
    q: sqlx::query::QueryScalar<'q, Postgres, O, PgArguments>,
    v: SqlValue,
) -> sqlx::query::QueryScalar<'q, Postgres, O, PgArguments> {
    match v {
        SqlValue::Bool(b) => q.bind(b),
        SqlValue::Int(i) => q.bind(i),
        SqlValue::Float(f) => q.bind(f),
        SqlValue::Decimal(d) => q.bind(d),
        SqlValue::Text(s) => q.bind(s),
        SqlValue::Date(d) => q.bind(d),
        SqlValue::Timestamp(t) => q.bind(t),
        SqlValue::Json(j) => q.bind(j),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sniffs_dates_and_timestamps() {
        assert_eq!(
            SqlValue::from_json(&json!("2024-03-01")),
            SqlValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1))
        );
        assert!(matches!(
            SqlValue::from_json(&json!("2024-03-01T10:00:00Z")),
            SqlValue::Timestamp(Some(_))
        ));
        assert_eq!(
            SqlValue::from_json(&json!("en_attente")),
            SqlValue::Text(Some("en_attente".to_string()))
        );
    }

    #[test]
    fn numbers_prefer_integers() {
        assert_eq!(SqlValue::from_json(&json!(42)), SqlValue::Int(Some(42)));
        assert_eq!(SqlValue::from_json(&json!(12.5)), SqlValue::Float(Some(12.5)));
    }

    #[test]
    fn options_keep_their_type_when_null() {
        let none: Option<NaiveDate> = None;
        assert_eq!(SqlValue::from(none), SqlValue::Date(None));
        assert_eq!(SqlValue::from(Some(3_i32)), SqlValue::Int(Some(3)));
    }
}
