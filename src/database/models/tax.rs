use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

use crate::workflow::machines::TaxStatus;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Tax {
    pub id: i64,
    pub reference: String,
    pub category: String,
    pub period: String,
    pub base_amount: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub due_date: NaiveDate,
    pub description: Option<String>,
    pub status: TaxStatus,
    pub validated_by: Option<i64>,
    pub validated_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub comptable_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
