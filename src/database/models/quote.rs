use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

use crate::workflow::machines::QuoteStatus;

/// Devis issued to a client
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Quote {
    pub id: i64,
    pub client_id: i64,
    pub reference: String,
    pub date_creation: NaiveDate,
    pub date_validite: Option<NaiveDate>,
    pub notes: Option<String>,
    pub remise_globale: Decimal,
    pub tva: Decimal,
    pub conditions: Option<String>,
    pub status: QuoteStatus,
    pub rejection_reason: Option<String>,
    pub user_id: i64,
    pub accepted_by: Option<i64>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct QuoteItem {
    pub id: i64,
    pub quote_id: i64,
    pub designation: String,
    pub quantite: i32,
    pub prix_unitaire: Decimal,
    pub remise: Decimal,
    pub created_at: DateTime<Utc>,
}
