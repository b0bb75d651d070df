use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

use crate::workflow::machines::EnterpriseOrderStatus;

/// Commande entreprise placed by a client
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EnterpriseOrder {
    pub id: i64,
    pub client_id: i64,
    pub reference: String,
    pub date_commande: NaiveDate,
    pub montant_total: Decimal,
    pub notes: Option<String>,
    pub status: EnterpriseOrderStatus,
    pub rejection_reason: Option<String>,
    pub is_invoiced: bool,
    pub invoiced_at: Option<DateTime<Utc>>,
    pub user_id: i64,
    pub validated_by: Option<i64>,
    pub validated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EnterpriseOrderItem {
    pub id: i64,
    pub enterprise_order_id: i64,
    pub designation: String,
    pub quantite: i32,
    pub prix_unitaire: Decimal,
    pub created_at: DateTime<Utc>,
}
