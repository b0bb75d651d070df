use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::auth::role::APPROVERS;
use crate::database::models::Tax;
use crate::database::{Changes, Page, PageRequest, Repository};
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::notify::{EntityRef, NotificationEvent};
use crate::services::transition::{self, locked_status, ActionInput, TransitionSpec};
use crate::services::{next_reference, round2, status_counts, today, Criteria, Detail, LIST_ORDER};
use crate::state::AppState;
use crate::validation::Validator;
use crate::workflow::machines::{TaxStatus, TAX};
use crate::workflow::Action;

const TABLE: &str = "taxes";

pub static SPEC: TransitionSpec<TaxStatus> = TransitionSpec {
    table: TABLE,
    entity: EntityRef {
        entity_type: "tax",
        label: "Taxe",
        route: "/taxes",
    },
    machine: &TAX,
    owner: "t.comptable_id",
};

#[derive(Debug, Default, Deserialize)]
pub struct TaxQuery {
    pub status: Option<TaxStatus>,
    pub category: Option<String>,
    pub period: Option<String>,
    pub overdue: Option<bool>,
    pub date_debut: Option<NaiveDate>,
    pub date_fin: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TaxInput {
    pub category: Option<String>,
    pub period: Option<String>,
    pub base_amount: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub description: Option<String>,
}

impl TaxInput {
    fn validate(&self, creating: bool) -> Result<(), ApiError> {
        let mut v = Validator::new();
        if creating {
            v.required_str("category", &self.category)
                .required_str("period", &self.period)
                .required("base_amount", &self.base_amount)
                .required("tax_rate", &self.tax_rate)
                .required("due_date", &self.due_date);
        }
        v.period("period", &self.period)
            .non_negative("base_amount", &self.base_amount)
            .range_decimal("tax_rate", &self.tax_rate, Decimal::ZERO, Decimal::ONE_HUNDRED);
        v.finish()
    }

    fn changes(self) -> Changes {
        Changes::new()
            .set_opt("category", self.category)
            .set_opt("period", self.period)
            .set_opt("base_amount", self.base_amount)
            .set_opt("tax_rate", self.tax_rate)
            .set_opt("due_date", self.due_date)
            .set_opt("description", self.description)
    }
}

/// Tax and total owed for a base amount at `rate` percent
pub fn tax_amounts(base: Decimal, rate: Decimal) -> (Decimal, Decimal) {
    let tax = round2(base * rate / Decimal::ONE_HUNDRED);
    (tax, base + tax)
}

/// `<CODE>-<period>-` where the code is the first four letters of the category
pub fn reference_prefix(category: &str, period: &str) -> String {
    let code: String = category
        .chars()
        .filter(|c| !c.is_whitespace())
        .take(4)
        .collect::<String>()
        .to_uppercase();
    format!("{}-{}-", code, period)
}

#[derive(Debug, Serialize)]
pub struct TaxStats {
    pub total: i64,
    pub by_status: BTreeMap<&'static str, i64>,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub remaining_amount: Decimal,
    pub overdue: i64,
}

pub struct TaxService {
    state: AppState,
}

impl TaxService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    fn repo(&self) -> Repository<Tax> {
        Repository::new(TABLE, &self.state.pool)
    }

    pub async fn list(&self, query: &TaxQuery) -> Result<Page<Tax>, ApiError> {
        let mut criteria = Criteria::new()
            .eq_opt("status", query.status.map(TaxStatus::to_filter))
            .eq_opt("category", query.category.clone())
            .eq_opt("period", query.period.clone())
            .date_range("due_date", query.date_debut, query.date_fin);
        if query.overdue == Some(true) {
            criteria = criteria
                .op("due_date", "$lt", today().to_string())
                .op("status", "$ne", TaxStatus::Paye.to_filter());
        }
        let request = PageRequest::new(query.page, query.per_page);
        Ok(self.repo().page(criteria.build(), LIST_ORDER, &request).await?)
    }

    pub async fn show(&self, id: i64) -> Result<Detail<Tax>, ApiError> {
        let tax = self.repo().find(id, None).await?;
        let status = tax.status;
        Ok(Detail::new(tax, &TAX, status))
    }

    pub async fn create(&self, input: TaxInput, actor: &Actor) -> Result<Tax, ApiError> {
        input.validate(true)?;
        let (Some(category), Some(period), Some(base), Some(rate)) = (
            input.category.clone(),
            input.period.clone(),
            input.base_amount,
            input.tax_rate,
        ) else {
            return Err(ApiError::bad_request("category, period, base_amount and tax_rate are required"));
        };
        let (tax_amount, total_amount) = tax_amounts(base, rate);

        let mut tx = self.state.pool.begin().await?;
        let reference = next_reference(&mut *tx, TABLE, "reference", &reference_prefix(&category, &period), 3).await?;
        let tax: Tax = input
            .changes()
            .set("reference", reference)
            .set("tax_amount", tax_amount)
            .set("total_amount", total_amount)
            .set("status", TAX.initial)
            .set("comptable_id", actor.user_id)
            .insert(TABLE, &mut *tx)
            .await?;
        let event = NotificationEvent::submission(&SPEC.entity, tax.id, actor);
        self.state.notifier.dispatch(&mut *tx, &event).await?;
        tx.commit().await?;

        tracing::info!(tax_id = tax.id, reference = %tax.reference, total = %tax.total_amount, "tax recorded");
        Ok(tax)
    }

    /// Amounts are recomputed from the stored base and rate when either changes
    pub async fn update(&self, id: i64, input: TaxInput) -> Result<Tax, ApiError> {
        input.validate(false)?;
        let recompute = input.base_amount.is_some() || input.tax_rate.is_some();
        let (base, rate) = (input.base_amount, input.tax_rate);

        let mut tx = self.state.pool.begin().await?;
        let current: TaxStatus = locked_status(&mut *tx, TABLE, id).await?;
        TAX.ensure_editable(current)?;
        let mut changes = input.changes();
        if recompute {
            let (stored_base, stored_rate): (Decimal, Decimal) =
                sqlx::query_as("SELECT base_amount, tax_rate FROM taxes WHERE id = $1")
                    .bind(id)
                    .fetch_one(&mut *tx)
                    .await?;
            let (tax_amount, total_amount) = tax_amounts(base.unwrap_or(stored_base), rate.unwrap_or(stored_rate));
            changes = changes.set("tax_amount", tax_amount).set("total_amount", total_amount);
        }
        let tax = changes.update(TABLE, id, &mut *tx).await?;
        tx.commit().await?;
        Ok(tax)
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        transition::delete_guarded(&self.state, TABLE, &TAX, id).await
    }

    pub async fn act(&self, id: i64, action: Action, input: ActionInput, actor: &Actor) -> Result<Tax, ApiError> {
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
            Action::Pay => (Changes::new().set("paid_at", Utc::now()), None),
            _ => (Changes::new(), None),
        };
        transition::transition(&self.state, &SPEC, id, actor, action, extras, reason.as_deref()).await
    }

    pub async fn stats(&self) -> Result<TaxStats, ApiError> {
        let pool = &self.state.pool;
        let by_status = status_counts::<TaxStatus>(pool, TABLE, None, None).await?;
        let (total_amount, paid_amount, overdue): (Decimal, Decimal, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(total_amount), 0), \
                    COALESCE(SUM(total_amount) FILTER (WHERE status = $1), 0), \
                    COUNT(*) FILTER (WHERE status <> $1 AND due_date < CURRENT_DATE) \
             FROM taxes",
        )
        .bind(TaxStatus::Paye.as_str())
        .fetch_one(pool)
        .await?;
        Ok(TaxStats {
            total: by_status.values().sum(),
            by_status,
            total_amount,
            paid_amount,
            remaining_amount: total_amount - paid_amount,
            overdue,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_tax_and_total() {
        let (tax, total) = tax_amounts(Decimal::from(1_250_000), Decimal::new(18, 0));
        assert_eq!(tax, Decimal::from(225_000));
        assert_eq!(total, Decimal::from(1_475_000));
    }

    #[test]
    fn reference_uses_category_code() {
        assert_eq!(reference_prefix("TVA", "2024-07"), "TVA-2024-07-");
        assert_eq!(reference_prefix("Impot sur societes", "2024-12"), "IMPO-2024-12-");
    }

    #[test]
    fn rate_is_a_percentage() {
        let input = TaxInput {
            tax_rate: Some(Decimal::from(120)),
            ..Default::default()
        };
        assert!(input.validate(false).is_err());
    }
}
