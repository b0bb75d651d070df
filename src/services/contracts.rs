//! Employment contracts. Outcomes are announced to the employee's user account.

use chrono::{Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::auth::role::APPROVERS;
use crate::database::models::Contract;
use crate::database::{Changes, Page, PageRequest, Repository};
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::notify::EntityRef;
use crate::services::employees::CONTRACT_TYPES;
use crate::services::transition::{self, ActionInput, TransitionSpec};
use crate::services::{next_reference, today, Criteria, Detail, LIST_ORDER};
use crate::state::AppState;
use crate::validation::Validator;
use crate::workflow::machines::{ContractStatus, CONTRACT};
use crate::workflow::Action;

const TABLE: &str = "contracts";

pub static SPEC: TransitionSpec<ContractStatus> = TransitionSpec {
    table: TABLE,
    entity: EntityRef {
        entity_type: "contract",
        label: "Contrat",
        route: "/contracts",
    },
    machine: &CONTRACT,
    owner: "(SELECT e.user_id FROM employees e WHERE e.id = t.employee_id)",
};

#[derive(Debug, Default, Deserialize)]
pub struct ContractQuery {
    pub status: Option<ContractStatus>,
    pub employee_id: Option<i64>,
    pub contract_type: Option<String>,
    pub date_debut: Option<NaiveDate>,
    pub date_fin: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExpiringQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContractInput {
    pub employee_id: Option<i64>,
    pub contract_type: Option<String>,
    pub position: Option<String>,
    pub department: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub gross_salary: Option<Decimal>,
    pub net_salary: Option<Decimal>,
    pub work_schedule: Option<String>,
    pub notes: Option<String>,
}

impl ContractInput {
    fn validate(&self, creating: bool) -> Result<(), ApiError> {
        let mut v = Validator::new();
        if creating {
            v.required("employee_id", &self.employee_id)
                .required_str("contract_type", &self.contract_type)
                .required_str("position", &self.position)
                .required_str("department", &self.department)
                .required("start_date", &self.start_date)
                .required("gross_salary", &self.gross_salary)
                .required("net_salary", &self.net_salary);
        }
        v.one_of("contract_type", &self.contract_type, CONTRACT_TYPES)
            .positive("gross_salary", &self.gross_salary)
            .positive("net_salary", &self.net_salary)
            .date_after("end_date", self.start_date, self.end_date);
        if self.contract_type.as_deref() == Some("cdd") {
            v.required("end_date", &self.end_date);
        }
        if let (Some(gross), Some(net)) = (self.gross_salary, self.net_salary) {
            v.check(net <= gross, "net_salary", "Must not exceed the gross salary");
        }
        v.finish()
    }

    /// Re-runs the cross-field rules on the row as it will be stored
    fn validate_against(&self, current: &Contract) -> Result<(), ApiError> {
        let merged = ContractInput {
            contract_type: self.contract_type.clone().or_else(|| Some(current.contract_type.clone())),
            start_date: self.start_date.or(Some(current.start_date)),
            end_date: self.end_date.or(current.end_date),
            gross_salary: self.gross_salary.or(Some(current.gross_salary)),
            net_salary: self.net_salary.or(Some(current.net_salary)),
            ..Default::default()
        };
        merged.validate(false)
    }

    fn changes(self) -> Changes {
        Changes::new()
            .set_opt("employee_id", self.employee_id)
            .set_opt("contract_type", self.contract_type)
            .set_opt("position", self.position)
            .set_opt("department", self.department)
            .set_opt("start_date", self.start_date)
            .set_opt("end_date", self.end_date)
            .set_opt("gross_salary", self.gross_salary)
            .set_opt("net_salary", self.net_salary)
            .set_opt("work_schedule", self.work_schedule)
            .set_opt("notes", self.notes)
    }
}

pub struct ContractService {
    state: AppState,
}

impl ContractService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    fn repo(&self) -> Repository<Contract> {
        Repository::new(TABLE, &self.state.pool)
    }

    pub async fn list(&self, query: &ContractQuery) -> Result<Page<Contract>, ApiError> {
        let criteria = Criteria::new()
            .eq_opt("status", query.status.map(ContractStatus::to_filter))
            .eq_opt("employee_id", query.employee_id)
            .eq_opt("contract_type", query.contract_type.clone())
            .date_range("start_date", query.date_debut, query.date_fin)
            .build();
        let request = PageRequest::new(query.page, query.per_page);
        Ok(self.repo().page(criteria, LIST_ORDER, &request).await?)
    }

    pub async fn show(&self, id: i64) -> Result<Detail<Contract>, ApiError> {
        let contract = self.repo().find(id, None).await?;
        let status = contract.status;
        Ok(Detail::new(contract, &CONTRACT, status))
    }

    /// Drafts get the next `CTR-<year>-NNNN` number
    pub async fn create(&self, input: ContractInput, actor: &Actor) -> Result<Contract, ApiError> {
        input.validate(true)?;
        let mut tx = self.state.pool.begin().await?;
        let number = next_reference(&mut *tx, TABLE, "contract_number", &number_prefix(today()), 4).await?;
        let contract: Contract = input
            .changes()
            .set("contract_number", number)
            .set("status", CONTRACT.initial)
            .set("created_by", actor.user_id)
            .insert(TABLE, &mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(contract_id = contract.id, number = %contract.contract_number, "contract drafted");
        Ok(contract)
    }

    pub async fn update(&self, id: i64, input: ContractInput) -> Result<Contract, ApiError> {
        input.validate(false)?;
        let current = self.repo().find(id, None).await?;
        input.validate_against(&current)?;
        transition::update_guarded(&self.state, TABLE, &CONTRACT, id, input.changes()).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        transition::delete_guarded(&self.state, TABLE, &CONTRACT, id).await
    }

    pub async fn act(&self, id: i64, action: Action, input: ActionInput, actor: &Actor) -> Result<Contract, ApiError> {
        let (extras, reason) = match action {
            Action::Approve => {
                actor.require(APPROVERS)?;
                let extras = Changes::new()
                    .set("approved_by", actor.user_id)
                    .set("approved_at", Utc::now());
                (extras, None)
            }
            Action::Reject | Action::Cancel => {
                let reason = input.require_reason()?;
                (Changes::new().set("rejection_reason", reason.clone()), Some(reason))
            }
            Action::Terminate => {
                let reason = input.require_reason()?;
                let extras = Changes::new()
                    .set("termination_reason", reason.clone())
                    .set("termination_date", input.date.unwrap_or_else(today));
                (extras, Some(reason))
            }
            _ => (Changes::new(), None),
        };
        transition::transition(&self.state, &SPEC, id, actor, action, extras, reason.as_deref()).await
    }

    /// Active contracts whose end date falls within the next `days` days
    pub async fn expiring(&self, query: &ExpiringQuery) -> Result<Vec<Contract>, ApiError> {
        let days = query.days.unwrap_or(30).clamp(1, 365);
        let from = today();
        let criteria = Criteria::new()
            .eq("status", ContractStatus::Active.to_filter())
            .date_range("end_date", Some(from), Some(from + Duration::days(days)))
            .build();
        let contracts = self
            .repo()
            .select_any(crate::filter::FilterData {
                where_clause: Some(criteria),
                order: Some(serde_json::json!("end_date asc")),
                ..Default::default()
            })
            .await?;
        Ok(contracts)
    }
}

fn number_prefix(date: NaiveDate) -> String {
    format!("CTR-{}-", date.year())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cdd() -> ContractInput {
        ContractInput {
            employee_id: Some(1),
            contract_type: Some("cdd".into()),
            position: Some("Comptable".into()),
            department: Some("Finance".into()),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            gross_salary: Some(Decimal::from(500_000)),
            net_salary: Some(Decimal::from(420_000)),
            ..Default::default()
        }
    }

    #[test]
    fn fixed_term_needs_an_end_date() {
        let errors = cdd().validate(true).unwrap_err().to_json()["errors"].clone();
        assert!(errors.get("end_date").is_some());

        let input = ContractInput {
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31),
            ..cdd()
        };
        assert!(input.validate(true).is_ok());
    }

    #[test]
    fn end_date_must_follow_start() {
        let input = ContractInput {
            end_date: NaiveDate::from_ymd_opt(2023, 12, 31),
            ..cdd()
        };
        let errors = input.validate(true).unwrap_err().to_json()["errors"].clone();
        assert_eq!(errors["end_date"], "Must be after the start date");
    }

    fn stored(contract_type: &str, end_date: Option<NaiveDate>) -> Contract {
        Contract {
            id: 7,
            contract_number: "CTR-2024-0007".into(),
            employee_id: 1,
            contract_type: contract_type.into(),
            position: "Comptable".into(),
            department: "Finance".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end_date,
            gross_salary: Decimal::from(500_000),
            net_salary: Decimal::from(420_000),
            work_schedule: None,
            notes: None,
            status: ContractStatus::Draft,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            termination_reason: None,
            termination_date: None,
            created_by: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn updates_are_checked_against_the_stored_dates() {
        let input = ContractInput {
            end_date: NaiveDate::from_ymd_opt(2024, 2, 1),
            ..Default::default()
        };
        assert!(input.validate(false).is_ok());
        let errors = input.validate_against(&stored("cdi", None)).unwrap_err().to_json()["errors"].clone();
        assert_eq!(errors["end_date"], "Must be after the start date");
    }

    #[test]
    fn switching_to_fixed_term_needs_a_stored_end_date() {
        let input = ContractInput {
            contract_type: Some("cdd".into()),
            ..Default::default()
        };
        assert!(input.validate_against(&stored("cdi", None)).is_err());
        let end = NaiveDate::from_ymd_opt(2025, 2, 28);
        assert!(input.validate_against(&stored("cdi", end)).is_ok());
    }

    #[test]
    fn net_salary_is_compared_with_the_stored_gross() {
        let input = ContractInput {
            net_salary: Some(Decimal::from(600_000)),
            ..Default::default()
        };
        assert!(input.validate_against(&stored("cdi", None)).is_err());
    }

    #[test]
    fn numbers_are_yearly() {
        assert_eq!(number_prefix(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()), "CTR-2025-");
    }
}
