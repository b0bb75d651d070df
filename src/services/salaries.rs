use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::auth::role::APPROVERS;
use crate::config::CONFIG;
use crate::database::models::Salary;
use crate::database::{Changes, Page, PageRequest, Repository};
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::notify::EntityRef;
use crate::services::transition::{self, ActionInput, TransitionSpec};
use crate::services::{round2, Criteria, Detail};
use crate::state::AppState;
use crate::validation::Validator;
use crate::workflow::machines::{SalaryStatus, SALARY};
use crate::workflow::Action;

const TABLE: &str = "salaries";

pub static SPEC: TransitionSpec<SalaryStatus> = TransitionSpec {
    table: TABLE,
    entity: EntityRef {
        entity_type: "salary",
        label: "Salaire",
        route: "/salaries",
    },
    machine: &SALARY,
    owner: "(SELECT e.user_id FROM employees e WHERE e.id = t.employee_id)",
};

#[derive(Debug, Default, Deserialize)]
pub struct SalaryQuery {
    pub status: Option<SalaryStatus>,
    pub employee_id: Option<i64>,
    pub period: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SalaryInput {
    pub employee_id: Option<i64>,
    pub period: Option<String>,
    pub base_salary: Option<Decimal>,
    pub allowances: Option<Decimal>,
    pub deductions: Option<Decimal>,
    pub salary_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl SalaryInput {
    fn validate(&self, creating: bool) -> Result<(), ApiError> {
        let mut v = Validator::new();
        if creating {
            v.required("employee_id", &self.employee_id)
                .required_str("period", &self.period)
                .required("base_salary", &self.base_salary);
        }
        v.period("period", &self.period)
            .positive("base_salary", &self.base_salary)
            .non_negative("allowances", &self.allowances)
            .non_negative("deductions", &self.deductions);
        v.finish()
    }

    fn changes(self) -> Changes {
        Changes::new()
            .set_opt("employee_id", self.employee_id)
            .set_opt("period", self.period)
            .set_opt("base_salary", self.base_salary)
            .set_opt("allowances", self.allowances)
            .set_opt("deductions", self.deductions)
            .set_opt("salary_date", self.salary_date)
            .set_opt("notes", self.notes)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SalaryStatsQuery {
    pub date_debut: Option<NaiveDate>,
    pub date_fin: Option<NaiveDate>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct SalaryStatsRow {
    pub status: SalaryStatus,
    pub period: String,
    pub count: i64,
    pub net: Decimal,
}

#[derive(Debug, Default, Serialize)]
pub struct PeriodTotal {
    pub count: i64,
    pub net: Decimal,
}

#[derive(Debug, Serialize)]
pub struct SalaryStats {
    pub total: i64,
    pub by_status: BTreeMap<&'static str, i64>,
    /// Net amounts per status
    pub amounts: BTreeMap<&'static str, Decimal>,
    /// Drafts and calculated payslips still awaiting approval
    pub pending_amount: Decimal,
    pub paid_amount: Decimal,
    pub by_period: BTreeMap<String, PeriodTotal>,
}

impl SalaryStats {
    pub fn from_rows(rows: &[SalaryStatsRow]) -> Self {
        let mut stats = SalaryStats {
            total: 0,
            by_status: SalaryStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect(),
            amounts: SalaryStatus::ALL.iter().map(|s| (s.as_str(), Decimal::ZERO)).collect(),
            pending_amount: Decimal::ZERO,
            paid_amount: Decimal::ZERO,
            by_period: BTreeMap::new(),
        };
        for row in rows {
            stats.total += row.count;
            *stats.by_status.entry(row.status.as_str()).or_default() += row.count;
            *stats.amounts.entry(row.status.as_str()).or_default() += row.net;
            match row.status {
                SalaryStatus::Draft | SalaryStatus::Calculated => stats.pending_amount += row.net,
                SalaryStatus::Paid => stats.paid_amount += row.net,
                _ => {}
            }
            let period = stats.by_period.entry(row.period.clone()).or_default();
            period.count += row.count;
            period.net += row.net;
        }
        stats
    }
}

/// Payslip amounts derived from the base and the configured rates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payslip {
    pub gross_salary: Decimal,
    pub tax_amount: Decimal,
    pub social_security: Decimal,
    pub net_salary: Decimal,
}

impl Payslip {
    /// Rates are percentages
    pub fn compute(
        base: Decimal,
        allowances: Decimal,
        deductions: Decimal,
        tax_rate: Decimal,
        social_security_rate: Decimal,
    ) -> Self {
        let gross = round2(base + allowances - deductions);
        let tax = round2(gross * tax_rate / Decimal::ONE_HUNDRED);
        let social = round2(gross * social_security_rate / Decimal::ONE_HUNDRED);
        Self {
            gross_salary: gross,
            tax_amount: tax,
            social_security: social,
            net_salary: gross - tax - social,
        }
    }

    fn for_salary(salary: &Salary) -> Self {
        Self::compute(
            salary.base_salary,
            salary.allowances,
            salary.deductions,
            CONFIG.payroll.tax_rate,
            CONFIG.payroll.social_security_rate,
        )
    }

    fn changes(self) -> Changes {
        self.apply(Changes::new())
    }

    fn apply(self, changes: Changes) -> Changes {
        changes
            .set("gross_salary", self.gross_salary)
            .set("tax_amount", self.tax_amount)
            .set("social_security", self.social_security)
            .set("net_salary", self.net_salary)
    }
}

pub struct SalaryService {
    state: AppState,
}

impl SalaryService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    fn repo(&self) -> Repository<Salary> {
        Repository::new(TABLE, &self.state.pool)
    }

    pub async fn list(&self, query: &SalaryQuery) -> Result<Page<Salary>, ApiError> {
        let criteria = Criteria::new()
            .eq_opt("status", query.status.map(SalaryStatus::to_filter))
            .eq_opt("employee_id", query.employee_id)
            .eq_opt("period", query.period.clone())
            .build();
        let request = PageRequest::new(query.page, query.per_page);
        Ok(self.repo().page(criteria, "period desc, id desc", &request).await?)
    }

    pub async fn show(&self, id: i64) -> Result<Detail<Salary>, ApiError> {
        let salary = self.repo().find(id, None).await?;
        let status = salary.status;
        Ok(Detail::new(salary, &SALARY, status))
    }

    /// Figures over salaries whose salary date falls in the range
    pub async fn stats(&self, query: &SalaryStatsQuery) -> Result<SalaryStats, ApiError> {
        let mut v = Validator::new();
        v.date_not_before("date_fin", query.date_debut, query.date_fin);
        v.finish()?;

        let rows = sqlx::query_as::<_, SalaryStatsRow>(
            "SELECT status, period, COUNT(*) AS count, COALESCE(SUM(net_salary), 0) AS net FROM salaries \
             WHERE ($1::date IS NULL OR salary_date >= $1) AND ($2::date IS NULL OR salary_date <= $2) \
             GROUP BY status, period",
        )
        .bind(query.date_debut)
        .bind(query.date_fin)
        .fetch_all(&self.state.pool)
        .await?;
        Ok(SalaryStats::from_rows(&rows))
    }

    pub async fn create(&self, input: SalaryInput, actor: &Actor) -> Result<Salary, ApiError> {
        input.validate(true)?;
        let salary: Salary = input
            .changes()
            .set("status", SALARY.initial)
            .set("created_by", actor.user_id)
            .insert(TABLE, &self.state.pool)
            .await?;
        tracing::info!(salary_id = salary.id, employee_id = salary.employee_id, period = %salary.period, "salary drafted");
        Ok(salary)
    }

    pub async fn update(&self, id: i64, input: SalaryInput) -> Result<Salary, ApiError> {
        input.validate(false)?;
        transition::update_guarded(&self.state, TABLE, &SALARY, id, input.changes()).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        transition::delete_guarded(&self.state, TABLE, &SALARY, id).await
    }

    pub async fn act(&self, id: i64, action: Action, input: ActionInput, actor: &Actor) -> Result<Salary, ApiError> {
        let (extras, reason) = match action {
            Action::Calculate => {
                let salary = self.repo().find(id, None).await?;
                let payslip = Payslip::for_salary(&salary);
                tracing::debug!(salary_id = id, gross = %payslip.gross_salary, net = %payslip.net_salary, "payslip computed");
                (payslip.changes(), None)
            }
            Action::Approve => {
                actor.require(APPROVERS)?;
                let salary = self.repo().find(id, None).await?;
                let mut extras = Changes::new()
                    .set("approved_by", actor.user_id)
                    .set("approved_at", Utc::now());
                // Drafts are approved with their payslip computed on the spot
                if salary.status == SalaryStatus::Draft || salary.net_salary.is_zero() {
                    let payslip = Payslip::for_salary(&salary);
                    if payslip.net_salary <= Decimal::ZERO {
                        return Err(ApiError::conflict("A salary with no net amount cannot be approved"));
                    }
                    extras = payslip.apply(extras);
                }
                (extras, None)
            }
            Action::Reject => {
                actor.require(APPROVERS)?;
                let reason = input.require_reason()?;
                (Changes::new().set("rejection_reason", reason.clone()), Some(reason))
            }
            Action::Pay => {
                let salary = self.repo().find(id, None).await?;
                if salary.net_salary <= Decimal::ZERO {
                    return Err(ApiError::conflict("A salary with no net amount cannot be paid"));
                }
                (Changes::new().set("paid_at", Utc::now()), None)
            }
            _ => (Changes::new(), None),
        };
        transition::transition(&self.state, &SPEC, id, actor, action, extras, reason.as_deref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payslip_applies_rates_to_gross() {
        let payslip = Payslip::compute(
            Decimal::from(400_000),
            Decimal::from(50_000),
            Decimal::from(10_000),
            Decimal::from(20),
            Decimal::from(15),
        );
        assert_eq!(payslip.gross_salary, Decimal::from(440_000));
        assert_eq!(payslip.tax_amount, Decimal::from(88_000));
        assert_eq!(payslip.social_security, Decimal::from(66_000));
        assert_eq!(payslip.net_salary, Decimal::from(286_000));
    }

    #[test]
    fn payslip_rounds_each_amount() {
        let payslip = Payslip::compute(
            Decimal::new(100_001, 2),
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::new(125, 1),
            Decimal::ZERO,
        );
        assert_eq!(payslip.tax_amount, Decimal::new(12_500, 2));
        assert_eq!(payslip.net_salary, Decimal::new(87_501, 2));
    }

    #[test]
    fn stats_split_pending_and_paid_amounts() {
        let row = |status, period: &str, count, net: i64| SalaryStatsRow {
            status,
            period: period.into(),
            count,
            net: Decimal::from(net),
        };
        let stats = SalaryStats::from_rows(&[
            row(SalaryStatus::Draft, "2024-06", 1, 0),
            row(SalaryStatus::Calculated, "2024-06", 2, 572_000),
            row(SalaryStatus::Paid, "2024-05", 3, 858_000),
        ]);
        assert_eq!(stats.total, 6);
        assert_eq!(stats.by_status["approved"], 0);
        assert_eq!(stats.pending_amount, Decimal::from(572_000));
        assert_eq!(stats.paid_amount, Decimal::from(858_000));
        assert_eq!(stats.by_period["2024-06"].count, 3);
        assert_eq!(stats.by_period["2024-05"].net, Decimal::from(858_000));
    }

    #[test]
    fn period_must_be_year_month() {
        let input = SalaryInput {
            period: Some("2024-13".into()),
            ..Default::default()
        };
        assert!(input.validate(false).is_err());
    }
}
