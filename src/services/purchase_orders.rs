//! Bons de commande and their line items.

use chrono::{NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

use crate::auth::role::APPROVERS;
use crate::database::models::{PurchaseOrder, PurchaseOrderItem};
use crate::database::{Changes, DatabaseError, Page, PageRequest, Repository};
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::notify::{EntityRef, NotificationEvent};
use crate::services::transition::{self, ActionInput, TransitionSpec};
use crate::services::{round2, Criteria, Detail, LIST_ORDER};
use crate::state::AppState;
use crate::validation::Validator;
use crate::workflow::machines::{PurchaseOrderStatus, PURCHASE_ORDER};
use crate::workflow::Action;

const TABLE: &str = "purchase_orders";
const ITEMS: &str = "purchase_order_items";

pub static SPEC: TransitionSpec<PurchaseOrderStatus> = TransitionSpec {
    table: TABLE,
    entity: EntityRef {
        entity_type: "purchase_order",
        label: "Bon de commande",
        route: "/purchase-orders",
    },
    machine: &PURCHASE_ORDER,
    owner: "t.user_id",
};

#[derive(Debug, Default, Deserialize)]
pub struct PurchaseOrderQuery {
    pub status: Option<PurchaseOrderStatus>,
    pub fournisseur_id: Option<i64>,
    pub montant_min: Option<Decimal>,
    pub montant_max: Option<Decimal>,
    pub date_debut: Option<NaiveDate>,
    pub date_fin: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemInput {
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    pub designation: Option<String>,
    pub quantite: Option<i32>,
    pub prix_unitaire: Option<Decimal>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PurchaseOrderInput {
    pub fournisseur_id: Option<i64>,
    pub numero_commande: Option<String>,
    pub date_commande: Option<NaiveDate>,
    pub montant_total: Option<Decimal>,
    pub description: Option<String>,
    pub commentaire: Option<String>,
    pub conditions_paiement: Option<String>,
    pub delai_livraison: Option<i32>,
    pub items: Option<Vec<ItemInput>>,
}

impl PurchaseOrderInput {
    fn validate(&self, creating: bool) -> Result<(), ApiError> {
        let mut v = Validator::new();
        if creating {
            v.required("fournisseur_id", &self.fournisseur_id)
                .required_str("numero_commande", &self.numero_commande)
                .required("date_commande", &self.date_commande);
            let has_items = self.items.as_ref().is_some_and(|items| !items.is_empty());
            if !has_items {
                v.required("montant_total", &self.montant_total);
            }
        }
        v.positive("montant_total", &self.montant_total)
            .range_i64("delai_livraison", self.delai_livraison.map(i64::from), 1, i64::MAX);
        if let Some(items) = &self.items {
            validate_items(&mut v, items);
        }
        v.finish()
    }

    /// Header columns; `montant_total` comes from the items when they are given
    fn changes(&self) -> Changes {
        let total = match &self.items {
            Some(items) if !items.is_empty() => Some(items_total(items)),
            _ => self.montant_total,
        };
        Changes::new()
            .set_opt("fournisseur_id", self.fournisseur_id)
            .set_opt("numero_commande", self.numero_commande.clone())
            .set_opt("date_commande", self.date_commande)
            .set_opt("montant_total", total)
            .set_opt("description", self.description.clone())
            .set_opt("commentaire", self.commentaire.clone())
            .set_opt("conditions_paiement", self.conditions_paiement.clone())
            .set_opt("delai_livraison", self.delai_livraison)
    }
}

fn validate_items(v: &mut Validator, items: &[ItemInput]) {
    for (i, item) in items.iter().enumerate() {
        v.required_str(&format!("items.{}.designation", i), &item.designation)
            .required(&format!("items.{}.quantite", i), &item.quantite)
            .required(&format!("items.{}.prix_unitaire", i), &item.prix_unitaire)
            .range_i64(
                &format!("items.{}.quantite", i),
                item.quantite.map(i64::from),
                1,
                i64::MAX,
            )
            .non_negative(&format!("items.{}.prix_unitaire", i), &item.prix_unitaire);
    }
}

/// Σ quantite × prix_unitaire
pub fn items_total(items: &[ItemInput]) -> Decimal {
    let total = items
        .iter()
        .map(|item| Decimal::from(item.quantite.unwrap_or(0)) * item.prix_unitaire.unwrap_or(Decimal::ZERO))
        .sum();
    round2(total)
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct StatusTotal {
    pub status: PurchaseOrderStatus,
    pub count: i64,
    pub amount: Decimal,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct SupplierTotal {
    pub fournisseur_id: i64,
    pub count: i64,
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct PurchaseOrderStats {
    pub total_count: i64,
    pub total_amount: Decimal,
    pub by_status: Vec<StatusTotal>,
    pub by_supplier: Vec<SupplierTotal>,
}

pub struct PurchaseOrderService {
    state: AppState,
}

impl PurchaseOrderService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    fn repo(&self) -> Repository<PurchaseOrder> {
        Repository::new(TABLE, &self.state.pool)
    }

    async fn items(&self, id: i64) -> Result<Vec<PurchaseOrderItem>, ApiError> {
        Ok(
            sqlx::query_as::<_, PurchaseOrderItem>(
                "SELECT * FROM purchase_order_items WHERE purchase_order_id = $1 ORDER BY id",
            )
            .bind(id)
            .fetch_all(&self.state.pool)
            .await?,
        )
    }

    /// 404 when the order does not exist or the caller may not see it
    async fn visible(&self, id: i64, actor: &Actor) -> Result<PurchaseOrder, ApiError> {
        let owner = actor.scoped_owner().map(|user_id| ("user_id", user_id));
        Ok(self.repo().find(id, owner).await?)
    }

    pub async fn list(&self, query: &PurchaseOrderQuery, actor: &Actor) -> Result<Page<PurchaseOrder>, ApiError> {
        let criteria = Criteria::new()
            .eq_opt("status", query.status.map(PurchaseOrderStatus::to_filter))
            .eq_opt("fournisseur_id", query.fournisseur_id)
            .op_opt("montant_total", "$gte", query.montant_min.and_then(|m| m.to_f64()))
            .op_opt("montant_total", "$lte", query.montant_max.and_then(|m| m.to_f64()))
            .date_range("date_commande", query.date_debut, query.date_fin)
            .owned_by("user_id", actor.scoped_owner())
            .build();
        let request = PageRequest::new(query.page, query.per_page);
        Ok(self.repo().page(criteria, LIST_ORDER, &request).await?)
    }

    pub async fn show(&self, id: i64, actor: &Actor) -> Result<Detail<PurchaseOrder, PurchaseOrderItem>, ApiError> {
        let order = self.visible(id, actor).await?;
        let items = self.items(id).await?;
        let status = order.status;
        Ok(Detail::with_items(order, items, &PURCHASE_ORDER, status))
    }

    pub async fn create(
        &self,
        input: PurchaseOrderInput,
        actor: &Actor,
    ) -> Result<Detail<PurchaseOrder, PurchaseOrderItem>, ApiError> {
        input.validate(true)?;
        let changes = input
            .changes()
            .set("status", PURCHASE_ORDER.initial)
            .set("user_id", actor.user_id);

        let mut tx = self.state.pool.begin().await?;
        let order: PurchaseOrder = changes.insert(TABLE, &mut *tx).await?;
        let items = insert_items(&mut *tx, order.id, input.items.as_deref().unwrap_or_default()).await?;
        let event = NotificationEvent::submission(&SPEC.entity, order.id, actor);
        self.state.notifier.dispatch(&mut *tx, &event).await?;
        tx.commit().await?;

        tracing::info!(
            purchase_order_id = order.id,
            numero = %order.numero_commande,
            montant_total = %order.montant_total,
            "purchase order created"
        );
        let status = order.status;
        Ok(Detail::with_items(order, items, &PURCHASE_ORDER, status))
    }

    pub async fn update(
        &self,
        id: i64,
        input: PurchaseOrderInput,
        actor: &Actor,
    ) -> Result<Detail<PurchaseOrder, PurchaseOrderItem>, ApiError> {
        input.validate(false)?;
        self.visible(id, actor).await?;

        let mut tx = self.state.pool.begin().await?;
        let current: PurchaseOrderStatus = transition::locked_status(&mut *tx, TABLE, id).await?;
        PURCHASE_ORDER.ensure_editable(current)?;

        let order: PurchaseOrder = input.changes().update(TABLE, id, &mut *tx).await?;
        let items = match &input.items {
            Some(items) => {
                sqlx::query("DELETE FROM purchase_order_items WHERE purchase_order_id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                insert_items(&mut *tx, id, items).await?
            }
            None => {
                sqlx::query_as::<_, PurchaseOrderItem>(
                    "SELECT * FROM purchase_order_items WHERE purchase_order_id = $1 ORDER BY id",
                )
                .bind(id)
                .fetch_all(&mut *tx)
                .await?
            }
        };
        tx.commit().await?;

        let status = order.status;
        Ok(Detail::with_items(order, items, &PURCHASE_ORDER, status))
    }

    pub async fn delete(&self, id: i64, actor: &Actor) -> Result<(), ApiError> {
        self.visible(id, actor).await?;
        transition::delete_guarded(&self.state, TABLE, &PURCHASE_ORDER, id).await
    }

    pub async fn act(
        &self,
        id: i64,
        action: Action,
        input: ActionInput,
        actor: &Actor,
    ) -> Result<PurchaseOrder, ApiError> {
        self.visible(id, actor).await?;
        let (extras, reason) = match action {
            Action::Validate => {
                actor.require(APPROVERS)?;
                let extras = Changes::new()
                    .set("validated_by", actor.user_id)
                    .set("validated_at", Utc::now());
                (extras, None)
            }
            Action::Reject => {
                actor.require(APPROVERS)?;
                let reason = input.require_reason()?;
                (Changes::new().set("commentaire", reason.clone()), Some(reason))
            }
            Action::Cancel => {
                let reason = input.require_reason()?;
                (Changes::new().set("commentaire", reason.clone()), Some(reason))
            }
            Action::Deliver => (Changes::new().set("delivered_at", Utc::now()), None),
            _ => (Changes::new(), None),
        };
        transition::transition(&self.state, &SPEC, id, actor, action, extras, reason.as_deref()).await
    }

    /// Copy header and items under `<numero>-COPY-<timestamp>`, back in en_attente
    pub async fn duplicate(&self, id: i64, actor: &Actor) -> Result<Detail<PurchaseOrder, PurchaseOrderItem>, ApiError> {
        let original = self.visible(id, actor).await?;
        let originals = self.items(id).await?;

        let changes = Changes::new()
            .set("fournisseur_id", original.fournisseur_id)
            .set("numero_commande", copy_number(&original.numero_commande, Utc::now().timestamp()))
            .set("date_commande", original.date_commande)
            .set("montant_total", original.montant_total)
            .set("description", original.description)
            .set("conditions_paiement", original.conditions_paiement)
            .set("delai_livraison", original.delai_livraison)
            .set("status", PURCHASE_ORDER.initial)
            .set("user_id", actor.user_id);
        let items: Vec<ItemInput> = originals
            .into_iter()
            .map(|item| ItemInput {
                reference: item.reference,
                designation: Some(item.designation),
                quantite: Some(item.quantite),
                prix_unitaire: Some(item.prix_unitaire),
                description: item.description,
            })
            .collect();

        let mut tx = self.state.pool.begin().await?;
        let copy: PurchaseOrder = changes.insert(TABLE, &mut *tx).await?;
        let items = insert_items(&mut *tx, copy.id, &items).await?;
        let event = NotificationEvent::submission(&SPEC.entity, copy.id, actor);
        self.state.notifier.dispatch(&mut *tx, &event).await?;
        tx.commit().await?;

        tracing::info!(from = id, purchase_order_id = copy.id, "purchase order duplicated");
        let status = copy.status;
        Ok(Detail::with_items(copy, items, &PURCHASE_ORDER, status))
    }

    pub async fn stats(&self, actor: &Actor) -> Result<PurchaseOrderStats, ApiError> {
        let owner = actor.scoped_owner();
        let by_status = sqlx::query_as::<_, StatusTotal>(
            "SELECT status, COUNT(*) AS count, COALESCE(SUM(montant_total), 0) AS amount \
             FROM purchase_orders WHERE ($1::bigint IS NULL OR user_id = $1) \
             GROUP BY status ORDER BY status",
        )
        .bind(owner)
        .fetch_all(&self.state.pool)
        .await?;
        let by_supplier = sqlx::query_as::<_, SupplierTotal>(
            "SELECT fournisseur_id, COUNT(*) AS count, COALESCE(SUM(montant_total), 0) AS amount \
             FROM purchase_orders WHERE ($1::bigint IS NULL OR user_id = $1) \
             GROUP BY fournisseur_id ORDER BY amount DESC",
        )
        .bind(owner)
        .fetch_all(&self.state.pool)
        .await?;

        Ok(PurchaseOrderStats {
            total_count: by_status.iter().map(|s| s.count).sum(),
            total_amount: by_status.iter().map(|s| s.amount).sum(),
            by_status,
            by_supplier,
        })
    }
}

async fn insert_items(
    conn: &mut PgConnection,
    order_id: i64,
    items: &[ItemInput],
) -> Result<Vec<PurchaseOrderItem>, DatabaseError> {
    let mut inserted = Vec::with_capacity(items.len());
    for item in items {
        let row: PurchaseOrderItem = Changes::new()
            .set("purchase_order_id", order_id)
            .set("ref", item.reference.clone())
            .set("designation", item.designation.clone().unwrap_or_default())
            .set("quantite", item.quantite.unwrap_or(1))
            .set("prix_unitaire", item.prix_unitaire.unwrap_or(Decimal::ZERO))
            .set("description", item.description.clone())
            .insert(ITEMS, &mut *conn)
            .await?;
        inserted.push(row);
    }
    Ok(inserted)
}

fn copy_number(numero: &str, timestamp: i64) -> String {
    format!("{}-COPY-{}", numero, timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(quantite: i32, prix: i64) -> ItemInput {
        ItemInput {
            reference: None,
            designation: Some("Ramette A4".into()),
            quantite: Some(quantite),
            prix_unitaire: Some(Decimal::from(prix)),
            description: None,
        }
    }

    #[test]
    fn total_is_derived_from_items() {
        let input = PurchaseOrderInput {
            montant_total: Some(Decimal::from(1)),
            items: Some(vec![item(3, 2500), item(2, 1000)]),
            ..Default::default()
        };
        let changes = input.changes();
        assert!(changes.contains("montant_total"));
        assert_eq!(items_total(input.items.as_deref().unwrap()), Decimal::from(9500));
    }

    #[test]
    fn total_is_required_without_items() {
        let input = PurchaseOrderInput {
            fournisseur_id: Some(1),
            numero_commande: Some("BC-001".into()),
            date_commande: NaiveDate::from_ymd_opt(2024, 5, 2),
            ..Default::default()
        };
        let err = input.validate(true).unwrap_err();
        assert_eq!(err.status_code(), 422);
        assert!(err.to_json()["errors"].get("montant_total").is_some());
    }

    #[test]
    fn rejects_bad_items_and_delay() {
        let input = PurchaseOrderInput {
            delai_livraison: Some(0),
            items: Some(vec![item(0, -5)]),
            ..Default::default()
        };
        let errors = input.validate(false).unwrap_err().to_json()["errors"].clone();
        assert!(errors.get("delai_livraison").is_some());
        assert!(errors.get("items.0.quantite").is_some());
        assert!(errors.get("items.0.prix_unitaire").is_some());
    }

    #[test]
    fn duplicate_number_carries_timestamp() {
        assert_eq!(copy_number("BC-2024-007", 1717000000), "BC-2024-007-COPY-1717000000");
        assert_eq!(json!(copy_number("X", 1)), json!("X-COPY-1"));
    }
}
