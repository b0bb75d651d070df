use sqlx::{self, postgres::PgRow, FromRow, PgExecutor, Row};

use crate::database::manager::DatabaseError;
use crate::database::value::{bind_query, bind_query_as, SqlValue};
use crate::filter::types::SqlResult;
use crate::filter::{Filter, FilterData};

pub struct QueryBuilder<T> {
    table_name: String,
    filter: Filter,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> QueryBuilder<T>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    pub fn new(table_name: impl Into<String>) -> Result<Self, DatabaseError> {
        let name = table_name.into();
        // Reuse Filter table name validation
        let filter = Filter::new(&name).map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        Ok(Self {
            table_name: name,
            filter,
            _phantom: std::marker::PhantomData,
        })
    }

    pub fn filter(mut self, filter_data: FilterData) -> Result<Self, DatabaseError> {
        self.filter
            .assign(filter_data)
            .map_err(|e| DatabaseError::QueryError(format!("{}: {}", self.table_name, e)))?;
        Ok(self)
    }

    pub async fn select_all<'c, E: PgExecutor<'c>>(self, executor: E) -> Result<Vec<T>, DatabaseError> {
        let sql_result = self.sql_result()?;
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_query_as(q, SqlValue::from_json(p));
        }
        Ok(q.fetch_all(executor).await?)
    }

    pub async fn select_optional<'c, E: PgExecutor<'c>>(self, executor: E) -> Result<Option<T>, DatabaseError> {
        let sql_result = self.sql_result()?;
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_query_as(q, SqlValue::from_json(p));
        }
        Ok(q.fetch_optional(executor).await?)
    }

    pub async fn count<'c, E: PgExecutor<'c>>(self, executor: E) -> Result<i64, DatabaseError> {
        let sql_result = self
            .filter
            .to_count_sql()
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_query(q, SqlValue::from_json(p));
        }
        let row = q.fetch_one(executor).await?;
        let count: i64 = row.try_get("count")?;
        Ok(count)
    }

    fn sql_result(&self) -> Result<SqlResult, DatabaseError> {
        self.filter
            .to_sql()
            .map_err(|e| DatabaseError::QueryError(e.to_string()))
    }
}
