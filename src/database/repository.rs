use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::{self, postgres::PgRow, FromRow, PgPool};

use crate::config::CONFIG;
use crate::database::manager::DatabaseError;
use crate::database::query_builder::QueryBuilder;
use crate::filter::FilterData;

/// `page` / `per_page` as received on list endpoints
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageRequest {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self { page, per_page }
    }

    pub fn page(&self) -> u32 {
        self.page.filter(|p| *p > 0).unwrap_or(1)
    }

    pub fn per_page(&self) -> u32 {
        let max = CONFIG.filter.max_limit.map(|m| m.max(1) as u32).unwrap_or(u32::MAX);
        self.per_page
            .filter(|p| *p > 0)
            .unwrap_or(CONFIG.api.default_per_page)
            .min(max)
    }

    pub fn offset(&self) -> u32 {
        (self.page() - 1).saturating_mul(self.per_page())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pagination {
    pub current_page: u32,
    pub last_page: u32,
    pub per_page: u32,
    pub total: i64,
}

impl Pagination {
    pub fn new(request: &PageRequest, total: i64) -> Self {
        let per_page = request.per_page();
        let last_page = ((total.max(0) as u64 + per_page as u64 - 1) / per_page as u64).max(1) as u32;
        Self {
            current_page: request.page(),
            last_page,
            per_page,
            total,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

pub struct Repository<T> {
    table_name: &'static str,
    pool: PgPool,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Repository<T>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    pub fn new(table_name: &'static str, pool: &PgPool) -> Self {
        Self {
            table_name,
            pool: pool.clone(),
            _phantom: std::marker::PhantomData,
        }
    }

    pub async fn select_any(&self, filter_data: FilterData) -> Result<Vec<T>, DatabaseError> {
        QueryBuilder::<T>::new(self.table_name)?
            .filter(filter_data)?
            .select_all(&self.pool)
            .await
    }

    pub async fn select_one(&self, filter_data: FilterData) -> Result<Option<T>, DatabaseError> {
        QueryBuilder::<T>::new(self.table_name)?
            .filter(filter_data)?
            .select_optional(&self.pool)
            .await
    }

    pub async fn select_404(&self, filter_data: FilterData) -> Result<T, DatabaseError> {
        self.select_one(filter_data)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("Record not found".to_string()))
    }

    /// Fetch by id, optionally restricted to rows owned through `owner_column`
    pub async fn find(&self, id: i64, owner: Option<(&str, i64)>) -> Result<T, DatabaseError> {
        let mut where_clause = json!({ "id": id });
        if let Some((column, user_id)) = owner {
            where_clause[column] = json!(user_id);
        }
        self.select_404(FilterData::where_(where_clause)).await
    }

    pub async fn count(&self, where_clause: Value) -> Result<i64, DatabaseError> {
        QueryBuilder::<T>::new(self.table_name)?
            .filter(FilterData::where_(where_clause))?
            .count(&self.pool)
            .await
    }

    /// One page of rows matching `where_clause`, plus the total count
    pub async fn page(&self, where_clause: Value, order: &str, request: &PageRequest) -> Result<Page<T>, DatabaseError> {
        let total = self.count(where_clause.clone()).await?;
        let items = self
            .select_any(FilterData {
                select: None,
                where_clause: Some(where_clause),
                order: Some(json!(order)),
                limit: Some(request.per_page() as i32),
                offset: Some(request.offset() as i32),
            })
            .await?;
        Ok(Page {
            items,
            pagination: Pagination::new(request, total),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_and_offsets() {
        let request = PageRequest::new(None, None);
        assert_eq!(request.page(), 1);
        assert_eq!(request.per_page(), 15);
        assert_eq!(request.offset(), 0);

        let request = PageRequest::new(Some(3), Some(20));
        assert_eq!(request.offset(), 40);
    }

    #[test]
    fn zero_values_fall_back_to_defaults() {
        let request = PageRequest::new(Some(0), Some(0));
        assert_eq!(request.page(), 1);
        assert_eq!(request.per_page(), 15);
    }

    #[test]
    fn last_page_rounds_up_and_never_drops_below_one() {
        let request = PageRequest::new(Some(1), Some(10));
        assert_eq!(Pagination::new(&request, 0).last_page, 1);
        assert_eq!(Pagination::new(&request, 10).last_page, 1);
        assert_eq!(Pagination::new(&request, 11).last_page, 2);
    }
}
