//! Stock items and their movement ledger.
//!
//! Every quantity change locks the item row and appends a movement in the
//! same transaction, so the ledger always sums to the stored quantity.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::auth::role::APPROVERS;
use crate::database::models::{Stock, StockMovement};
use crate::database::{Changes, Page, PageRequest, Repository};
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::notify::{EntityRef, NotificationEvent};
use crate::services::transition::{self, ActionInput, TransitionSpec};
use crate::services::{Criteria, Detail, LIST_ORDER};
use crate::state::AppState;
use crate::validation::Validator;
use crate::workflow::machines::{StockStatus, STOCK};
use crate::workflow::Action;

const TABLE: &str = "stocks";
const MOVEMENTS: &str = "stock_movements";

pub static SPEC: TransitionSpec<StockStatus> = TransitionSpec {
    table: TABLE,
    entity: EntityRef {
        entity_type: "stock",
        label: "Article de stock",
        route: "/stocks",
    },
    machine: &STOCK,
    owner: "t.created_by",
};

pub const REASONS: &[&str] = &[
    "purchase",
    "sale",
    "transfer",
    "adjustment",
    "return",
    "loss",
    "damage",
    "expired",
    "other",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementKind {
    In,
    Out,
    Adjustment,
}

impl MovementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MovementKind::In => "in",
            MovementKind::Out => "out",
            MovementKind::Adjustment => "adjustment",
        }
    }

    fn default_reason(self) -> &'static str {
        match self {
            MovementKind::In => "purchase",
            MovementKind::Out => "sale",
            MovementKind::Adjustment => "adjustment",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StockQuery {
    pub status: Option<StockStatus>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StockInput {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub quantity: Option<Decimal>,
    pub min_quantity: Option<Decimal>,
    pub max_quantity: Option<Decimal>,
    pub unit_cost: Option<Decimal>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

impl StockInput {
    fn validate(&self, creating: bool) -> Result<(), ApiError> {
        let mut v = Validator::new();
        if creating {
            v.required_str("name", &self.name)
                .required_str("sku", &self.sku)
                .required_str("category", &self.category);
        } else {
            v.check(
                self.quantity.is_none(),
                "quantity",
                "Use the add, remove or adjust operations to change quantities",
            );
        }
        v.non_negative("quantity", &self.quantity)
            .non_negative("min_quantity", &self.min_quantity)
            .non_negative("max_quantity", &self.max_quantity)
            .non_negative("unit_cost", &self.unit_cost);
        if let (Some(min), Some(max)) = (self.min_quantity, self.max_quantity) {
            v.check(max >= min, "max_quantity", "Must not be below the minimum quantity");
        }
        v.finish()
    }

    fn changes(self) -> Changes {
        Changes::new()
            .set_opt("name", self.name)
            .set_opt("sku", self.sku.map(|s| s.trim().to_uppercase()))
            .set_opt("category", self.category)
            .set_opt("unit", self.unit)
            .set_opt("min_quantity", self.min_quantity)
            .set_opt("max_quantity", self.max_quantity)
            .set_opt("unit_cost", self.unit_cost)
            .set_opt("location", self.location)
            .set_opt("notes", self.notes)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MovementInput {
    pub quantity: Option<Decimal>,
    pub new_quantity: Option<Decimal>,
    pub reason: Option<String>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

impl MovementInput {
    fn validate(&self, kind: MovementKind) -> Result<(), ApiError> {
        let mut v = Validator::new();
        match kind {
            MovementKind::Adjustment => {
                v.required("new_quantity", &self.new_quantity)
                    .non_negative("new_quantity", &self.new_quantity);
            }
            _ => {
                v.required("quantity", &self.quantity).positive("quantity", &self.quantity);
            }
        }
        v.one_of("reason", &self.reason, REASONS);
        v.finish()
    }
}

/// Resulting quantity and the signed delta recorded in the ledger
pub fn apply_movement(current: Decimal, kind: MovementKind, amount: Decimal) -> Result<(Decimal, Decimal), ApiError> {
    match kind {
        MovementKind::In => Ok((current + amount, amount)),
        MovementKind::Out if amount > current => Err(ApiError::conflict(format!(
            "Insufficient stock: {} available, {} requested",
            current, amount
        ))),
        MovementKind::Out => Ok((current - amount, -amount)),
        MovementKind::Adjustment => Ok((amount, amount - current)),
    }
}

pub struct StockService {
    state: AppState,
}

impl StockService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    fn repo(&self) -> Repository<Stock> {
        Repository::new(TABLE, &self.state.pool)
    }

    pub async fn list(&self, query: &StockQuery) -> Result<Page<Stock>, ApiError> {
        let criteria = Criteria::new()
            .eq_opt("status", query.status.map(StockStatus::to_filter))
            .eq_opt("category", query.category.clone())
            .search(&["name", "sku", "location"], query.search.as_deref())
            .build();
        let request = PageRequest::new(query.page, query.per_page);
        Ok(self.repo().page(criteria, LIST_ORDER, &request).await?)
    }

    pub async fn show(&self, id: i64) -> Result<Detail<Stock>, ApiError> {
        let stock = self.repo().find(id, None).await?;
        let status = stock.status;
        Ok(Detail::new(stock, &STOCK, status))
    }

    /// An initial quantity is recorded as an incoming movement
    pub async fn create(&self, input: StockInput, actor: &Actor) -> Result<Stock, ApiError> {
        input.validate(true)?;
        let initial = input.quantity.unwrap_or(Decimal::ZERO);

        let mut tx = self.state.pool.begin().await?;
        let stock: Stock = input
            .changes()
            .set("quantity", initial)
            .set("status", STOCK.initial)
            .set("created_by", actor.user_id)
            .insert(TABLE, &mut *tx)
            .await?;
        if initial > Decimal::ZERO {
            let movement = Changes::new()
                .set("stock_id", stock.id)
                .set("kind", MovementKind::In.as_str())
                .set("quantity", initial)
                .set("reason", "purchase")
                .set("notes", "Initial quantity")
                .set("user_id", actor.user_id);
            let _: StockMovement = movement.insert(MOVEMENTS, &mut *tx).await?;
        }
        let event = NotificationEvent::submission(&SPEC.entity, stock.id, actor);
        self.state.notifier.dispatch(&mut *tx, &event).await?;
        tx.commit().await?;

        tracing::info!(stock_id = stock.id, sku = %stock.sku, quantity = %stock.quantity, "stock item created");
        Ok(stock)
    }

    pub async fn update(&self, id: i64, input: StockInput) -> Result<Stock, ApiError> {
        input.validate(false)?;
        transition::update_guarded(&self.state, TABLE, &STOCK, id, input.changes()).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        transition::delete_guarded(&self.state, TABLE, &STOCK, id).await
    }

    pub async fn act(&self, id: i64, action: Action, input: ActionInput, actor: &Actor) -> Result<Stock, ApiError> {
        actor.require(APPROVERS)?;
        let (extras, reason) = match action {
            Action::Reject => {
                let reason = input.require_reason()?;
                (Changes::new().set("rejection_reason", reason.clone()), Some(reason))
            }
            _ => (Changes::new(), None),
        };
        transition::transition(&self.state, &SPEC, id, actor, action, extras, reason.as_deref()).await
    }

    pub async fn add(&self, id: i64, input: MovementInput, actor: &Actor) -> Result<Stock, ApiError> {
        self.move_stock(id, MovementKind::In, input, actor).await
    }

    pub async fn remove(&self, id: i64, input: MovementInput, actor: &Actor) -> Result<Stock, ApiError> {
        self.move_stock(id, MovementKind::Out, input, actor).await
    }

    pub async fn adjust(&self, id: i64, input: MovementInput, actor: &Actor) -> Result<Stock, ApiError> {
        self.move_stock(id, MovementKind::Adjustment, input, actor).await
    }

    async fn move_stock(&self, id: i64, kind: MovementKind, input: MovementInput, actor: &Actor) -> Result<Stock, ApiError> {
        input.validate(kind)?;
        let amount = match kind {
            MovementKind::Adjustment => input.new_quantity,
            _ => input.quantity,
        }
        .unwrap_or(Decimal::ZERO);

        let mut tx = self.state.pool.begin().await?;
        let current: Decimal = sqlx::query_scalar("SELECT quantity FROM stocks WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ApiError::not_found("Stock item not found"))?;

        let (quantity, delta) = apply_movement(current, kind, amount)?;
        let stock: Stock = Changes::new().set("quantity", quantity).update(TABLE, id, &mut *tx).await?;

        let movement: StockMovement = Changes::new()
            .set("stock_id", id)
            .set("kind", kind.as_str())
            .set("quantity", delta)
            .set("reason", input.reason.unwrap_or_else(|| kind.default_reason().to_string()))
            .set_opt("reference", input.reference)
            .set_opt("notes", input.notes)
            .set("user_id", actor.user_id)
            .insert(MOVEMENTS, &mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(
            stock_id = id,
            movement_id = movement.id,
            kind = kind.as_str(),
            from = %current,
            to = %quantity,
            "stock movement"
        );
        if stock.quantity <= stock.min_quantity {
            tracing::warn!(stock_id = id, sku = %stock.sku, quantity = %stock.quantity, "stock below minimum");
        }
        Ok(stock)
    }

    pub async fn movements(&self, id: i64, page: &PageRequest) -> Result<Page<StockMovement>, ApiError> {
        self.repo().find(id, None).await?;
        let movements: Repository<StockMovement> = Repository::new(MOVEMENTS, &self.state.pool);
        let criteria = Criteria::new().eq("stock_id", id).build();
        Ok(movements.page(criteria, LIST_ORDER, page).await?)
    }

    /// Items at or below their minimum quantity
    pub async fn low(&self) -> Result<Vec<Stock>, ApiError> {
        let stocks = sqlx::query_as::<_, Stock>(
            "SELECT * FROM stocks WHERE quantity <= min_quantity AND status <> $1 ORDER BY quantity - min_quantity, name",
        )
        .bind(StockStatus::Rejete.as_str())
        .fetch_all(&self.state.pool)
        .await?;
        Ok(stocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal_cannot_go_negative() {
        let err = apply_movement(Decimal::from(3), MovementKind::Out, Decimal::from(5)).unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert_eq!(
            apply_movement(Decimal::from(5), MovementKind::Out, Decimal::from(5)).unwrap(),
            (Decimal::ZERO, Decimal::from(-5))
        );
    }

    #[test]
    fn adjustment_records_the_difference() {
        assert_eq!(
            apply_movement(Decimal::from(10), MovementKind::Adjustment, Decimal::from(7)).unwrap(),
            (Decimal::from(7), Decimal::from(-3))
        );
        assert_eq!(
            apply_movement(Decimal::from(2), MovementKind::In, Decimal::from(8)).unwrap(),
            (Decimal::from(10), Decimal::from(8))
        );
    }

    #[test]
    fn quantities_change_only_through_movements() {
        let input = StockInput {
            quantity: Some(Decimal::from(4)),
            ..Default::default()
        };
        assert!(input.validate(false).is_err());
    }

    #[test]
    fn movement_reason_must_be_known() {
        let input = MovementInput {
            quantity: Some(Decimal::ONE),
            reason: Some("gift".into()),
            ..Default::default()
        };
        assert!(input.validate(MovementKind::In).is_err());
    }
}
