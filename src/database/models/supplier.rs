use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

use crate::workflow::machines::SupplierStatus;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Supplier {
    pub id: i64,
    pub nom: String,
    pub email: String,
    pub telephone: String,
    pub adresse: String,
    pub ville: String,
    pub pays: String,
    pub contact_principal: Option<String>,
    pub note_evaluation: Option<Decimal>,
    pub commentaires: Option<String>,
    pub rejection_reason: Option<String>,
    pub status: SupplierStatus,
    pub validated_by: Option<i64>,
    pub validated_at: Option<DateTime<Utc>>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
