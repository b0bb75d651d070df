//! Commandes entreprise. Status is stored as a SMALLINT code.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgConnection;

use crate::auth::role::APPROVERS;
use crate::database::models::{EnterpriseOrder, EnterpriseOrderItem};
use crate::database::{Changes, DatabaseError, Page, PageRequest, Repository};
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::notify::{EntityRef, NotificationEvent};
use crate::services::transition::{self, ActionInput, TransitionSpec};
use crate::services::{next_reference, round2, today, Criteria, Detail, LIST_ORDER};
use crate::state::AppState;
use crate::validation::Validator;
use crate::workflow::machines::{EnterpriseOrderStatus, ENTERPRISE_ORDER};
use crate::workflow::{Action, Machine, WorkflowError};

const TABLE: &str = "enterprise_orders";
const ITEMS: &str = "enterprise_order_items";

pub static SPEC: TransitionSpec<EnterpriseOrderStatus> = TransitionSpec {
    table: TABLE,
    entity: EntityRef {
        entity_type: "enterprise_order",
        label: "Commande entreprise",
        route: "/enterprise-orders",
    },
    machine: &ENTERPRISE_ORDER,
    owner: "t.user_id",
};

#[derive(Debug, Default, Deserialize)]
pub struct EnterpriseOrderQuery {
    pub status: Option<EnterpriseOrderStatus>,
    pub client_id: Option<i64>,
    pub is_invoiced: Option<bool>,
    pub date_debut: Option<NaiveDate>,
    pub date_fin: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemInput {
    pub designation: Option<String>,
    pub quantite: Option<i32>,
    pub prix_unitaire: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EnterpriseOrderInput {
    pub client_id: Option<i64>,
    pub reference: Option<String>,
    pub date_commande: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Option<Vec<OrderItemInput>>,
}

impl EnterpriseOrderInput {
    fn validate(&self, creating: bool) -> Result<(), ApiError> {
        let mut v = Validator::new();
        if creating {
            v.required("client_id", &self.client_id).check(
                self.items.as_ref().is_some_and(|items| !items.is_empty()),
                "items",
                "At least one item is required",
            );
        }
        if let Some(items) = &self.items {
            for (i, item) in items.iter().enumerate() {
                v.required_str(&format!("items.{}.designation", i), &item.designation)
                    .required(&format!("items.{}.quantite", i), &item.quantite)
                    .required(&format!("items.{}.prix_unitaire", i), &item.prix_unitaire)
                    .range_i64(&format!("items.{}.quantite", i), item.quantite.map(i64::from), 1, i64::MAX)
                    .non_negative(&format!("items.{}.prix_unitaire", i), &item.prix_unitaire);
            }
        }
        v.finish()
    }

    fn changes(&self) -> Changes {
        Changes::new()
            .set_opt("client_id", self.client_id)
            .set_opt("reference", self.reference.clone())
            .set_opt("date_commande", self.date_commande)
            .set_opt("notes", self.notes.clone())
            .set_opt("montant_total", self.items.as_deref().map(order_total))
    }
}

pub fn order_total(items: &[OrderItemInput]) -> Decimal {
    round2(
        items
            .iter()
            .map(|item| Decimal::from(item.quantite.unwrap_or(0)) * item.prix_unitaire.unwrap_or(Decimal::ZERO))
            .sum(),
    )
}

pub struct EnterpriseOrderService {
    state: AppState,
}

impl EnterpriseOrderService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    fn repo(&self) -> Repository<EnterpriseOrder> {
        Repository::new(TABLE, &self.state.pool)
    }

    async fn visible(&self, id: i64, actor: &Actor) -> Result<EnterpriseOrder, ApiError> {
        let owner = actor.scoped_owner().map(|user_id| ("user_id", user_id));
        Ok(self.repo().find(id, owner).await?)
    }

    async fn items(&self, conn: &mut PgConnection, id: i64) -> Result<Vec<EnterpriseOrderItem>, ApiError> {
        Ok(sqlx::query_as::<_, EnterpriseOrderItem>(
            "SELECT * FROM enterprise_order_items WHERE enterprise_order_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(conn)
        .await?)
    }

    pub async fn list(&self, query: &EnterpriseOrderQuery, actor: &Actor) -> Result<Page<EnterpriseOrder>, ApiError> {
        let criteria = Criteria::new()
            .eq_opt("status", query.status.map(EnterpriseOrderStatus::to_filter))
            .eq_opt("client_id", query.client_id)
            .eq_opt("is_invoiced", query.is_invoiced)
            .date_range("date_commande", query.date_debut, query.date_fin)
            .owned_by("user_id", actor.scoped_owner())
            .build();
        let request = PageRequest::new(query.page, query.per_page);
        Ok(self.repo().page(criteria, LIST_ORDER, &request).await?)
    }

    pub async fn show(&self, id: i64, actor: &Actor) -> Result<Detail<EnterpriseOrder, EnterpriseOrderItem>, ApiError> {
        let order = self.visible(id, actor).await?;
        let mut conn = self.state.pool.acquire().await?;
        let items = self.items(&mut *conn, id).await?;
        let status = order.status;
        Ok(Detail::with_items(order, items, &ENTERPRISE_ORDER, status))
    }

    pub async fn create(
        &self,
        input: EnterpriseOrderInput,
        actor: &Actor,
    ) -> Result<Detail<EnterpriseOrder, EnterpriseOrderItem>, ApiError> {
        input.validate(true)?;
        let date = input.date_commande.unwrap_or_else(today);

        let mut tx = self.state.pool.begin().await?;
        let reference = match input.reference.clone() {
            Some(reference) => reference,
            None => {
                let prefix = format!("CMD-{}-", date.format("%Y%m%d"));
                next_reference(&mut *tx, TABLE, "reference", &prefix, 4).await?
            }
        };
        let order: EnterpriseOrder = input
            .changes()
            .set("reference", reference)
            .set("date_commande", date)
            .set("status", ENTERPRISE_ORDER.initial)
            .set("user_id", actor.user_id)
            .insert(TABLE, &mut *tx)
            .await?;
        let items = insert_items(&mut *tx, order.id, input.items.as_deref().unwrap_or_default()).await?;
        let event = NotificationEvent::submission(&SPEC.entity, order.id, actor);
        self.state.notifier.dispatch(&mut *tx, &event).await?;
        tx.commit().await?;

        tracing::info!(enterprise_order_id = order.id, reference = %order.reference, "enterprise order created");
        let status = order.status;
        Ok(Detail::with_items(order, items, &ENTERPRISE_ORDER, status))
    }

    pub async fn update(
        &self,
        id: i64,
        input: EnterpriseOrderInput,
        actor: &Actor,
    ) -> Result<Detail<EnterpriseOrder, EnterpriseOrderItem>, ApiError> {
        input.validate(false)?;
        self.visible(id, actor).await?;

        let mut tx = self.state.pool.begin().await?;
        let current: EnterpriseOrderStatus = transition::locked_status(&mut *tx, TABLE, id).await?;
        ENTERPRISE_ORDER.ensure_editable(current)?;
        let order: EnterpriseOrder = input.changes().update(TABLE, id, &mut *tx).await?;
        let items = match &input.items {
            Some(items) => {
                sqlx::query("DELETE FROM enterprise_order_items WHERE enterprise_order_id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                insert_items(&mut *tx, id, items).await?
            }
            None => self.items(&mut *tx, id).await?,
        };
        tx.commit().await?;

        let status = order.status;
        Ok(Detail::with_items(order, items, &ENTERPRISE_ORDER, status))
    }

    pub async fn delete(&self, id: i64, actor: &Actor) -> Result<(), ApiError> {
        self.visible(id, actor).await?;
        transition::delete_guarded(&self.state, TABLE, &ENTERPRISE_ORDER, id).await
    }

    pub async fn act(
        &self,
        id: i64,
        action: Action,
        input: ActionInput,
        actor: &Actor,
    ) -> Result<EnterpriseOrder, ApiError> {
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
                (Changes::new().set("rejection_reason", reason.clone()), Some(reason))
            }
            _ => (Changes::new(), None),
        };
        transition::transition(&self.state, &SPEC, id, actor, action, extras, reason.as_deref()).await
    }

    /// Invoicing happens once, after delivery
    pub async fn invoice(&self, id: i64, actor: &Actor) -> Result<EnterpriseOrder, ApiError> {
        self.visible(id, actor).await?;

        let mut tx = self.state.pool.begin().await?;
        let current: EnterpriseOrderStatus = transition::locked_status(&mut *tx, TABLE, id).await?;
        ensure_invoiceable(current)?;
        let already: bool = sqlx::query_scalar("SELECT is_invoiced FROM enterprise_orders WHERE id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if already {
            return Err(ApiError::conflict("Enterprise order is already invoiced"));
        }
        let order: EnterpriseOrder = Changes::new()
            .set("is_invoiced", true)
            .set("invoiced_at", Utc::now())
            .update(TABLE, id, &mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(enterprise_order_id = id, actor = actor.user_id, "enterprise order invoiced");
        Ok(order)
    }
}

fn ensure_invoiceable(current: EnterpriseOrderStatus) -> Result<(), WorkflowError> {
    Machine::<EnterpriseOrderStatus>::ensure_in(current, &[EnterpriseOrderStatus::Livre], "invoice")
}

async fn insert_items(
    conn: &mut PgConnection,
    order_id: i64,
    items: &[OrderItemInput],
) -> Result<Vec<EnterpriseOrderItem>, DatabaseError> {
    let mut inserted = Vec::with_capacity(items.len());
    for item in items {
        let row: EnterpriseOrderItem = Changes::new()
            .set("enterprise_order_id", order_id)
            .set("designation", item.designation.clone().unwrap_or_default())
            .set("quantite", item.quantite.unwrap_or(1))
            .set("prix_unitaire", item.prix_unitaire.unwrap_or(Decimal::ZERO))
            .insert(ITEMS, &mut *conn)
            .await?;
        inserted.push(row);
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantite: i32, prix: &str) -> OrderItemInput {
        OrderItemInput {
            designation: Some("Licence".into()),
            quantite: Some(quantite),
            prix_unitaire: Some(prix.parse().unwrap()),
        }
    }

    #[test]
    fn total_sums_lines() {
        assert_eq!(order_total(&[item(2, "1500.50"), item(1, "99.99")]), "3100.99".parse().unwrap());
    }

    #[test]
    fn create_needs_items() {
        let input = EnterpriseOrderInput {
            client_id: Some(4),
            ..Default::default()
        };
        let errors = input.validate(true).unwrap_err().to_json()["errors"].clone();
        assert!(errors.get("items").is_some());
    }

    #[test]
    fn only_delivered_orders_are_invoiceable() {
        assert!(ensure_invoiceable(EnterpriseOrderStatus::Livre).is_ok());
        assert!(matches!(
            ensure_invoiceable(EnterpriseOrderStatus::Valide),
            Err(WorkflowError::Locked { operation: "invoice", .. })
        ));
    }
}
