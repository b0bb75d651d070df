use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

use crate::workflow::machines::ContractStatus;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Contract {
    pub id: i64,
    pub contract_number: String,
    pub employee_id: i64,
    pub contract_type: String,
    pub position: String,
    pub department: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub gross_salary: Decimal,
    pub net_salary: Decimal,
    pub work_schedule: Option<String>,
    pub notes: Option<String>,
    pub status: ContractStatus,
    pub approved_by: Option<i64>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub termination_reason: Option<String>,
    pub termination_date: Option<NaiveDate>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
