use chrono::{NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::auth::role::APPROVERS;
use crate::database::models::Expense;
use crate::database::{Changes, Page, PageRequest, Repository};
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::notify::EntityRef;
use crate::services::transition::{self, ActionInput, TransitionSpec};
use crate::services::{status_counts, Criteria, Detail, LIST_ORDER};
use crate::state::AppState;
use crate::validation::Validator;
use crate::workflow::machines::{ExpenseStatus, EXPENSE};
use crate::workflow::Action;

const TABLE: &str = "expenses";

pub static SPEC: TransitionSpec<ExpenseStatus> = TransitionSpec {
    table: TABLE,
    entity: EntityRef {
        entity_type: "expense",
        label: "Dépense",
        route: "/expenses",
    },
    machine: &EXPENSE,
    owner: "t.user_id",
};

pub const DEFAULT_CURRENCY: &str = "XOF";

#[derive(Debug, Default, Deserialize)]
pub struct ExpenseQuery {
    pub status: Option<ExpenseStatus>,
    pub category: Option<String>,
    pub employee_id: Option<i64>,
    pub montant_min: Option<Decimal>,
    pub montant_max: Option<Decimal>,
    pub date_debut: Option<NaiveDate>,
    pub date_fin: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExpenseInput {
    pub category: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub expense_date: Option<NaiveDate>,
    pub receipt_number: Option<String>,
    pub employee_id: Option<i64>,
}

impl ExpenseInput {
    fn validate(&self, creating: bool) -> Result<(), ApiError> {
        let mut v = Validator::new();
        if creating {
            v.required_str("category", &self.category)
                .required_str("title", &self.title)
                .required("amount", &self.amount)
                .required("expense_date", &self.expense_date);
        }
        v.length("title", &self.title, 1, 255)
            .positive("amount", &self.amount)
            .length("currency", &self.currency, 3, 3);
        v.finish()
    }

    fn changes(self) -> Changes {
        Changes::new()
            .set_opt("category", self.category)
            .set_opt("title", self.title)
            .set_opt("description", self.description)
            .set_opt("amount", self.amount)
            .set_opt("currency", self.currency.map(|c| c.to_uppercase()))
            .set_opt("expense_date", self.expense_date)
            .set_opt("receipt_number", self.receipt_number)
            .set_opt("employee_id", self.employee_id)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub date_debut: Option<NaiveDate>,
    pub date_fin: Option<NaiveDate>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct StatusAmount {
    pub status: ExpenseStatus,
    pub count: i64,
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct ExpenseStats {
    pub total: i64,
    pub by_status: BTreeMap<&'static str, i64>,
    pub amounts: Vec<StatusAmount>,
    /// Submitted or under review, waiting for an approver
    pub pending_amount: Decimal,
    pub paid_amount: Decimal,
}

pub struct ExpenseService {
    state: AppState,
}

impl ExpenseService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    fn repo(&self) -> Repository<Expense> {
        Repository::new(TABLE, &self.state.pool)
    }

    pub async fn list(&self, query: &ExpenseQuery) -> Result<Page<Expense>, ApiError> {
        let criteria = Criteria::new()
            .eq_opt("status", query.status.map(ExpenseStatus::to_filter))
            .eq_opt("category", query.category.clone())
            .eq_opt("employee_id", query.employee_id)
            .op_opt("amount", "$gte", query.montant_min.and_then(|d| d.to_f64()))
            .op_opt("amount", "$lte", query.montant_max.and_then(|d| d.to_f64()))
            .date_range("expense_date", query.date_debut, query.date_fin)
            .build();
        let request = PageRequest::new(query.page, query.per_page);
        Ok(self.repo().page(criteria, LIST_ORDER, &request).await?)
    }

    pub async fn show(&self, id: i64) -> Result<Detail<Expense>, ApiError> {
        let expense = self.repo().find(id, None).await?;
        let status = expense.status;
        Ok(Detail::new(expense, &EXPENSE, status))
    }

    /// Expenses start as drafts; nobody is told until `submit`
    pub async fn create(&self, input: ExpenseInput, actor: &Actor) -> Result<Expense, ApiError> {
        input.validate(true)?;
        let mut changes = input
            .changes()
            .set("status", EXPENSE.initial)
            .set("user_id", actor.user_id);
        if !changes.contains("currency") {
            changes = changes.set("currency", DEFAULT_CURRENCY);
        }
        let expense: Expense = changes.insert(TABLE, &self.state.pool).await?;
        tracing::info!(expense_id = expense.id, amount = %expense.amount, "expense drafted");
        Ok(expense)
    }

    pub async fn update(&self, id: i64, input: ExpenseInput) -> Result<Expense, ApiError> {
        input.validate(false)?;
        transition::update_guarded(&self.state, TABLE, &EXPENSE, id, input.changes()).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        transition::delete_guarded(&self.state, TABLE, &EXPENSE, id).await
    }

    pub async fn act(&self, id: i64, action: Action, input: ActionInput, actor: &Actor) -> Result<Expense, ApiError> {
        let (extras, reason) = match action {
            Action::Approve => {
                actor.require(APPROVERS)?;
                let extras = Changes::new()
                    .set("approved_by", actor.user_id)
                    .set("approved_at", Utc::now());
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

    pub async fn stats(&self, query: &StatsQuery) -> Result<ExpenseStats, ApiError> {
        let pool = &self.state.pool;
        let by_status = status_counts::<ExpenseStatus>(pool, TABLE, query.date_debut, query.date_fin).await?;
        let amounts = sqlx::query_as::<_, StatusAmount>(
            "SELECT status, COUNT(*) AS count, COALESCE(SUM(amount), 0) AS amount FROM expenses \
             WHERE ($1::date IS NULL OR expense_date >= $1) AND ($2::date IS NULL OR expense_date <= $2) \
             GROUP BY status ORDER BY status",
        )
        .bind(query.date_debut)
        .bind(query.date_fin)
        .fetch_all(pool)
        .await?;

        let sum_of = |statuses: &[ExpenseStatus]| -> Decimal {
            amounts
                .iter()
                .filter(|a| statuses.contains(&a.status))
                .map(|a| a.amount)
                .sum()
        };
        let pending_amount = sum_of(&[ExpenseStatus::Submitted, ExpenseStatus::UnderReview]);
        let paid_amount = sum_of(&[ExpenseStatus::Paid]);

        Ok(ExpenseStats {
            total: by_status.values().sum(),
            by_status,
            pending_amount,
            paid_amount,
            amounts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_must_be_positive() {
        let input = ExpenseInput {
            category: Some("transport".into()),
            title: Some("Taxi Dakar".into()),
            amount: Some(Decimal::ZERO),
            expense_date: NaiveDate::from_ymd_opt(2024, 5, 2),
            ..Default::default()
        };
        let errors = input.validate(true).unwrap_err().to_json()["errors"].clone();
        assert!(errors.get("amount").is_some());
    }

    #[test]
    fn currency_is_normalised() {
        let input = ExpenseInput {
            currency: Some("eur".into()),
            ..Default::default()
        };
        assert!(input.validate(false).is_ok());
        let changes = input.changes();
        assert!(changes.contains("currency"));
        assert!(!changes.contains("amount"));
    }
}
