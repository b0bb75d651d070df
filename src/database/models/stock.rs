use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

use crate::workflow::machines::StockStatus;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Stock {
    pub id: i64,
    pub name: String,
    pub sku: String,
    pub category: String,
    pub unit: String,
    pub quantity: Decimal,
    pub min_quantity: Decimal,
    pub max_quantity: Option<Decimal>,
    pub unit_cost: Decimal,
    pub location: Option<String>,
    pub status: StockStatus,
    pub rejection_reason: Option<String>,
    pub notes: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StockMovement {
    pub id: i64,
    pub stock_id: i64,
    /// in, out or adjustment
    pub kind: String,
    pub quantity: Decimal,
    pub reason: String,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}
