use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::database::models::Employee;
use crate::database::{Changes, Page, PageRequest, Repository};
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::notify::EntityRef;
use crate::services::transition::{self, ActionInput, TransitionSpec};
use crate::services::{status_counts, today, Criteria, Detail, LIST_ORDER};
use crate::state::AppState;
use crate::validation::Validator;
use crate::workflow::machines::{EmployeeStatus, EMPLOYEE};
use crate::workflow::Action;

const TABLE: &str = "employees";

pub static SPEC: TransitionSpec<EmployeeStatus> = TransitionSpec {
    table: TABLE,
    entity: EntityRef {
        entity_type: "employee",
        label: "Employé",
        route: "/employees",
    },
    machine: &EMPLOYEE,
    owner: "t.user_id",
};

pub const CONTRACT_TYPES: &[&str] = &["cdi", "cdd", "stage", "freelance"];

#[derive(Debug, Default, Deserialize)]
pub struct EmployeeQuery {
    pub status: Option<EmployeeStatus>,
    pub department: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EmployeeInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub hire_date: Option<NaiveDate>,
    pub salary: Option<Decimal>,
    pub contract_type: Option<String>,
    pub user_id: Option<i64>,
}

impl EmployeeInput {
    fn validate(&self, creating: bool) -> Result<(), ApiError> {
        let mut v = Validator::new();
        if creating {
            v.required_str("first_name", &self.first_name)
                .required_str("last_name", &self.last_name)
                .required_str("email", &self.email);
        }
        v.email("email", &self.email)
            .non_negative("salary", &self.salary)
            .one_of("contract_type", &self.contract_type, CONTRACT_TYPES);
        v.finish()
    }

    fn changes(self) -> Changes {
        Changes::new()
            .set_opt("first_name", self.first_name)
            .set_opt("last_name", self.last_name)
            .set_opt("email", self.email)
            .set_opt("phone", self.phone)
            .set_opt("department", self.department)
            .set_opt("position", self.position)
            .set_opt("hire_date", self.hire_date)
            .set_opt("salary", self.salary)
            .set_opt("contract_type", self.contract_type)
            .set_opt("user_id", self.user_id)
    }
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DepartmentCount {
    pub department: Option<String>,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct EmployeeStats {
    pub total: i64,
    pub by_status: BTreeMap<&'static str, i64>,
    pub by_department: Vec<DepartmentCount>,
}

pub struct EmployeeService {
    state: AppState,
}

impl EmployeeService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    fn repo(&self) -> Repository<Employee> {
        Repository::new(TABLE, &self.state.pool)
    }

    pub async fn list(&self, query: &EmployeeQuery) -> Result<Page<Employee>, ApiError> {
        let criteria = Criteria::new()
            .eq_opt("status", query.status.map(EmployeeStatus::to_filter))
            .eq_opt("department", query.department.clone())
            .search(&["first_name", "last_name", "email", "position"], query.search.as_deref())
            .build();
        let request = PageRequest::new(query.page, query.per_page);
        Ok(self.repo().page(criteria, LIST_ORDER, &request).await?)
    }

    pub async fn show(&self, id: i64) -> Result<Detail<Employee>, ApiError> {
        let employee = self.repo().find(id, None).await?;
        let status = employee.status;
        Ok(Detail::new(employee, &EMPLOYEE, status))
    }

    pub async fn create(&self, input: EmployeeInput, actor: &Actor) -> Result<Employee, ApiError> {
        input.validate(true)?;
        let employee: Employee = input
            .changes()
            .set("status", EMPLOYEE.initial)
            .insert(TABLE, &self.state.pool)
            .await?;
        tracing::info!(employee_id = employee.id, actor = actor.user_id, "employee created");
        Ok(employee)
    }

    pub async fn update(&self, id: i64, input: EmployeeInput) -> Result<Employee, ApiError> {
        input.validate(false)?;
        transition::update_guarded(&self.state, TABLE, &EMPLOYEE, id, input.changes()).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        transition::delete_guarded(&self.state, TABLE, &EMPLOYEE, id).await
    }

    pub async fn act(&self, id: i64, action: Action, input: ActionInput, actor: &Actor) -> Result<Employee, ApiError> {
        let (extras, reason) = match action {
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

    pub async fn stats(&self) -> Result<EmployeeStats, ApiError> {
        let by_status = status_counts::<EmployeeStatus>(&self.state.pool, TABLE, None, None).await?;
        let by_department = sqlx::query_as::<_, DepartmentCount>(
            "SELECT department, COUNT(*) AS count FROM employees GROUP BY department ORDER BY count DESC",
        )
        .fetch_all(&self.state.pool)
        .await?;
        Ok(EmployeeStats {
            total: by_status.values().sum(),
            by_status,
            by_department,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_type_must_be_known() {
        let input = EmployeeInput {
            contract_type: Some("interim".into()),
            ..Default::default()
        };
        assert_eq!(input.validate(false).unwrap_err().status_code(), 422);
    }

    #[test]
    fn create_requires_identity() {
        let input = EmployeeInput {
            first_name: Some("Awa".into()),
            last_name: Some("Ndiaye".into()),
            email: Some("awa.ndiaye@example.sn".into()),
            ..Default::default()
        };
        assert!(input.validate(true).is_ok());
        assert!(EmployeeInput::default().validate(true).is_err());
    }
}
