use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

use crate::workflow::machines::SalaryStatus;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Salary {
    pub id: i64,
    pub employee_id: i64,
    pub period: String,
    pub base_salary: Decimal,
    pub allowances: Decimal,
    pub deductions: Decimal,
    pub gross_salary: Decimal,
    pub tax_amount: Decimal,
    pub social_security: Decimal,
    pub net_salary: Decimal,
    pub salary_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub status: SalaryStatus,
    pub rejection_reason: Option<String>,
    pub approved_by: Option<i64>,
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
