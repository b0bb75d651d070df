use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::auth::role::APPROVERS;
use crate::database::models::Intervention;
use crate::database::{Changes, Page, PageRequest, Repository};
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::Actor;
use crate::notify::{EntityRef, NotificationEvent};
use crate::services::transition::{self, ActionInput, TransitionSpec};
use crate::services::{today, Criteria, Detail, LIST_ORDER};
use crate::state::AppState;
use crate::validation::Validator;
use crate::workflow::machines::{InterventionStatus, INTERVENTION};
use crate::workflow::Action;

const TABLE: &str = "interventions";

pub static SPEC: TransitionSpec<InterventionStatus> = TransitionSpec {
    table: TABLE,
    entity: EntityRef {
        entity_type: "intervention",
        label: "Intervention",
        route: "/interventions",
    },
    machine: &INTERVENTION,
    owner: "t.created_by",
};

pub const TYPES: &[&str] = &["external", "on_site"];
pub const PRIORITIES: &[&str] = &["low", "medium", "high", "urgent"];

#[derive(Debug, Default, Deserialize)]
pub struct InterventionQuery {
    pub status: Option<InterventionStatus>,
    pub priority: Option<String>,
    pub intervention_type: Option<String>,
    pub search: Option<String>,
    pub date_debut: Option<NaiveDate>,
    pub date_fin: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InterventionInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub intervention_type: Option<String>,
    pub priority: Option<String>,
    pub location: Option<String>,
    pub client_name: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub estimated_duration: Option<i32>,
    pub equipment: Option<String>,
    pub notes: Option<String>,
}

impl InterventionInput {
    fn validate(&self, creating: bool) -> Result<(), ApiError> {
        let mut v = Validator::new();
        if creating {
            v.required_str("title", &self.title)
                .required_str("description", &self.description)
                .required_str("intervention_type", &self.intervention_type)
                .required("scheduled_date", &self.scheduled_date);
        }
        v.one_of("intervention_type", &self.intervention_type, TYPES)
            .one_of("priority", &self.priority, PRIORITIES)
            .range_i64("estimated_duration", self.estimated_duration.map(i64::from), 1, 10_000);
        if self.intervention_type.as_deref() == Some("external") {
            v.required_str("location", &self.location);
        }
        v.finish()
    }

    fn changes(self) -> Changes {
        Changes::new()
            .set_opt("title", self.title)
            .set_opt("description", self.description)
            .set_opt("intervention_type", self.intervention_type)
            .set_opt("priority", self.priority)
            .set_opt("location", self.location)
            .set_opt("client_name", self.client_name)
            .set_opt("scheduled_date", self.scheduled_date)
            .set_opt("estimated_duration", self.estimated_duration)
            .set_opt("equipment", self.equipment)
            .set_opt("notes", self.notes)
    }
}

pub struct InterventionService {
    state: AppState,
}

impl InterventionService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    fn repo(&self) -> Repository<Intervention> {
        Repository::new(TABLE, &self.state.pool)
    }

    pub async fn list(&self, query: &InterventionQuery) -> Result<Page<Intervention>, ApiError> {
        let criteria = Criteria::new()
            .eq_opt("status", query.status.map(InterventionStatus::to_filter))
            .eq_opt("priority", query.priority.clone())
            .eq_opt("intervention_type", query.intervention_type.clone())
            .search(&["title", "client_name", "location"], query.search.as_deref())
            .date_range("scheduled_date", query.date_debut, query.date_fin)
            .build();
        let request = PageRequest::new(query.page, query.per_page);
        Ok(self.repo().page(criteria, LIST_ORDER, &request).await?)
    }

    pub async fn show(&self, id: i64) -> Result<Detail<Intervention>, ApiError> {
        let intervention = self.repo().find(id, None).await?;
        let status = intervention.status;
        Ok(Detail::new(intervention, &INTERVENTION, status))
    }

    pub async fn create(&self, input: InterventionInput, actor: &Actor) -> Result<Intervention, ApiError> {
        input.validate(true)?;
        let mut changes = input
            .changes()
            .set("status", INTERVENTION.initial)
            .set("created_by", actor.user_id);
        if !changes.contains("priority") {
            changes = changes.set("priority", "medium");
        }

        let mut tx = self.state.pool.begin().await?;
        let intervention: Intervention = changes.insert(TABLE, &mut *tx).await?;
        let event = NotificationEvent::submission(&SPEC.entity, intervention.id, actor);
        self.state.notifier.dispatch(&mut *tx, &event).await?;
        tx.commit().await?;

        tracing::info!(intervention_id = intervention.id, priority = %intervention.priority, "intervention requested");
        Ok(intervention)
    }

    pub async fn update(&self, id: i64, input: InterventionInput) -> Result<Intervention, ApiError> {
        input.validate(false)?;
        transition::update_guarded(&self.state, TABLE, &INTERVENTION, id, input.changes()).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        transition::delete_guarded(&self.state, TABLE, &INTERVENTION, id).await
    }

    pub async fn act(&self, id: i64, action: Action, input: ActionInput, actor: &Actor) -> Result<Intervention, ApiError> {
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
            Action::Start => (Changes::new().set("started_at", Utc::now()), None),
            Action::Complete => (completion(&input)?, None),
            _ => (Changes::new(), None),
        };
        transition::transition(&self.state, &SPEC, id, actor, action, extras, reason.as_deref()).await
    }

    /// Scheduled before today and not completed yet
    pub async fn overdue(&self) -> Result<Vec<Intervention>, ApiError> {
        let open: Vec<_> = [
            InterventionStatus::Pending,
            InterventionStatus::Approved,
            InterventionStatus::InProgress,
        ]
        .into_iter()
        .map(InterventionStatus::to_filter)
        .collect();
        let criteria = Criteria::new()
            .op("scheduled_date", "$lt", today().to_string())
            .op("status", "$in", open)
            .build();
        let interventions = self
            .repo()
            .select_any(FilterData {
                where_clause: Some(criteria),
                order: Some(serde_json::json!("scheduled_date asc")),
                ..Default::default()
            })
            .await?;
        Ok(interventions)
    }
}

/// Columns written when work is reported finished
fn completion(input: &ActionInput) -> Result<Changes, ApiError> {
    let mut v = Validator::new();
    v.range_i64("actual_duration", input.actual_duration.map(i64::from), 1, 10_000)
        .non_negative("cost", &input.cost);
    v.finish()?;
    Ok(Changes::new()
        .set("completed_at", Utc::now())
        .set_opt("completion_notes", input.notes.clone())
        .set_opt("actual_duration", input.actual_duration)
        .set_opt::<Decimal>("cost", input.cost))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_interventions_need_a_location() {
        let input = InterventionInput {
            title: Some("Panne climatisation".into()),
            description: Some("Climatiseur bureau 2".into()),
            intervention_type: Some("external".into()),
            scheduled_date: NaiveDate::from_ymd_opt(2024, 9, 10),
            ..Default::default()
        };
        let errors = input.validate(true).unwrap_err().to_json()["errors"].clone();
        assert!(errors.get("location").is_some());
    }

    #[test]
    fn completion_records_report() {
        let input = ActionInput {
            notes: Some("Compresseur remplacé".into()),
            actual_duration: Some(90),
            cost: Some(Decimal::new(4500000, 2)),
            ..Default::default()
        };
        let changes = completion(&input).unwrap();
        assert!(changes.contains("completion_notes"));
        assert!(changes.contains("completed_at"));
        assert!(changes.contains("cost"));
    }

    #[test]
    fn negative_cost_is_rejected() {
        let input = ActionInput {
            cost: Some(Decimal::from(-1)),
            ..Default::default()
        };
        assert!(completion(&input).is_err());
    }
}
