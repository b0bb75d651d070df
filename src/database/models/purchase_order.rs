use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

use crate::workflow::machines::PurchaseOrderStatus;

/// Bon de commande issued to a supplier
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PurchaseOrder {
    pub id: i64,
    pub fournisseur_id: i64,
    pub numero_commande: String,
    pub date_commande: NaiveDate,
    pub montant_total: Decimal,
    pub description: Option<String>,
    pub commentaire: Option<String>,
    pub conditions_paiement: Option<String>,
    pub delai_livraison: Option<i32>,
    pub status: PurchaseOrderStatus,
    pub user_id: i64,
    pub validated_by: Option<i64>,
    pub validated_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PurchaseOrderItem {
    pub id: i64,
    pub purchase_order_id: i64,
    #[sqlx(rename = "ref")]
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    pub designation: String,
    pub quantite: i32,
    pub prix_unitaire: Decimal,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}
