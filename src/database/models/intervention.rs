use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

use crate::workflow::machines::InterventionStatus;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Intervention {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub intervention_type: String,
    pub priority: String,
    pub location: Option<String>,
    pub client_name: Option<String>,
    pub scheduled_date: NaiveDate,
    pub estimated_duration: Option<i32>,
    pub actual_duration: Option<i32>,
    pub cost: Option<Decimal>,
    pub equipment: Option<String>,
    pub notes: Option<String>,
    pub completion_notes: Option<String>,
    pub status: InterventionStatus,
    pub created_by: i64,
    pub approved_by: Option<i64>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
