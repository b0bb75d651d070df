use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

use crate::workflow::machines::EquipmentStatus;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Equipment {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub serial_number: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_price: Option<Decimal>,
    pub warranty_expiry: Option<NaiveDate>,
    pub location: Option<String>,
    pub assigned_to: Option<i64>,
    pub status: EquipmentStatus,
    pub condition: String,
    pub notes: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
