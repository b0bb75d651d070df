//! Performance evaluations. The evaluated employee signs first, HR finalises.

use chrono::{NaiveDate, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::auth::role::HR;
use crate::database::models::Evaluation;
use crate::database::{Changes, Page, PageRequest, Repository};
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::notify::EntityRef;
use crate::services::transition::{self, ActionInput, TransitionSpec};
use crate::services::{round2, Criteria, Detail, LIST_ORDER};
use crate::state::AppState;
use crate::validation::Validator;
use crate::workflow::machines::{EvaluationStatus, EVALUATION};
use crate::workflow::Action;

const TABLE: &str = "evaluations";

pub static SPEC: TransitionSpec<EvaluationStatus> = TransitionSpec {
    table: TABLE,
    entity: EntityRef {
        entity_type: "evaluation",
        label: "Évaluation",
        route: "/evaluations",
    },
    machine: &EVALUATION,
    owner: "t.employee_id",
};

pub const TYPES: &[&str] = &["annual", "semi_annual", "probation", "project"];
pub const MAX_SCORE: f64 = 20.0;

#[derive(Debug, Default, Deserialize)]
pub struct EvaluationQuery {
    pub status: Option<EvaluationStatus>,
    pub employee_id: Option<i64>,
    pub evaluator_id: Option<i64>,
    pub evaluation_type: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EvaluationInput {
    pub employee_id: Option<i64>,
    pub evaluation_type: Option<String>,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub criteria: Option<Map<String, Value>>,
    pub commentaires_evaluateur: Option<String>,
}

impl EvaluationInput {
    fn validate(&self, creating: bool) -> Result<(), ApiError> {
        let mut v = Validator::new();
        if creating {
            v.required("employee_id", &self.employee_id)
                .required_str("evaluation_type", &self.evaluation_type)
                .required("period_start", &self.period_start)
                .required("period_end", &self.period_end)
                .required("criteria", &self.criteria);
        }
        v.one_of("evaluation_type", &self.evaluation_type, TYPES)
            .date_after("period_end", self.period_start, self.period_end);
        if let Some(criteria) = &self.criteria {
            v.check(!criteria.is_empty(), "criteria", "At least one criterion is required");
            for (name, score) in criteria {
                let valid = score.as_f64().is_some_and(|s| (0.0..=MAX_SCORE).contains(&s));
                v.check(valid, &format!("criteria.{}", name), "Score must be a number between 0 and 20");
            }
        }
        v.finish()
    }

    fn changes(self) -> Changes {
        let note = self.criteria.as_ref().map(overall_score);
        Changes::new()
            .set_opt("employee_id", self.employee_id)
            .set_opt("evaluation_type", self.evaluation_type)
            .set_opt("period_start", self.period_start)
            .set_opt("period_end", self.period_end)
            .set_opt("note_globale", note)
            .set_opt("criteria", self.criteria.map(Value::Object))
            .set_opt("commentaires_evaluateur", self.commentaires_evaluateur)
    }
}

/// Mean of the criterion scores, two decimals
pub fn overall_score(criteria: &Map<String, Value>) -> Decimal {
    let scores: Vec<Decimal> = criteria
        .values()
        .filter_map(Value::as_f64)
        .filter_map(Decimal::from_f64)
        .collect();
    if scores.is_empty() {
        return Decimal::ZERO;
    }
    let total: Decimal = scores.iter().sum();
    round2(total / Decimal::from(scores.len()))
}

pub struct EvaluationService {
    state: AppState,
}

impl EvaluationService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    fn repo(&self) -> Repository<Evaluation> {
        Repository::new(TABLE, &self.state.pool)
    }

    /// HR sees all evaluations; everyone else only their own
    fn scope(actor: &Actor) -> Option<i64> {
        actor.require(HR).is_err().then_some(actor.user_id)
    }

    pub async fn list(&self, query: &EvaluationQuery, actor: &Actor) -> Result<Page<Evaluation>, ApiError> {
        let criteria = Criteria::new()
            .eq_opt("status", query.status.map(EvaluationStatus::to_filter))
            .eq_opt("employee_id", Self::scope(actor).or(query.employee_id))
            .eq_opt("evaluator_id", query.evaluator_id)
            .eq_opt("evaluation_type", query.evaluation_type.clone())
            .build();
        let request = PageRequest::new(query.page, query.per_page);
        Ok(self.repo().page(criteria, LIST_ORDER, &request).await?)
    }

    pub async fn mine(&self, query: &EvaluationQuery, actor: &Actor) -> Result<Page<Evaluation>, ApiError> {
        let criteria = Criteria::new()
            .eq("employee_id", actor.user_id)
            .eq_opt("status", query.status.map(EvaluationStatus::to_filter))
            .build();
        let request = PageRequest::new(query.page, query.per_page);
        Ok(self.repo().page(criteria, "period_end desc, id desc", &request).await?)
    }

    pub async fn show(&self, id: i64, actor: &Actor) -> Result<Detail<Evaluation>, ApiError> {
        let owner = Self::scope(actor).map(|user_id| ("employee_id", user_id));
        let evaluation = self.repo().find(id, owner).await?;
        let status = evaluation.status;
        Ok(Detail::new(evaluation, &EVALUATION, status))
    }

    pub async fn create(&self, input: EvaluationInput, actor: &Actor) -> Result<Evaluation, ApiError> {
        input.validate(true)?;
        let evaluation: Evaluation = input
            .changes()
            .set("evaluator_id", actor.user_id)
            .set("status", EVALUATION.initial)
            .insert(TABLE, &self.state.pool)
            .await?;
        tracing::info!(
            evaluation_id = evaluation.id,
            employee_id = evaluation.employee_id,
            note = %evaluation.note_globale,
            "evaluation drafted"
        );
        Ok(evaluation)
    }

    pub async fn update(&self, id: i64, input: EvaluationInput) -> Result<Evaluation, ApiError> {
        input.validate(false)?;
        transition::update_guarded(&self.state, TABLE, &EVALUATION, id, input.changes()).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        transition::delete_guarded(&self.state, TABLE, &EVALUATION, id).await
    }

    pub async fn act(&self, id: i64, action: Action, input: ActionInput, actor: &Actor) -> Result<Evaluation, ApiError> {
        let extras = match action {
            Action::SignEmployee => {
                let evaluation = self.repo().find(id, None).await?;
                if evaluation.employee_id != actor.user_id {
                    return Err(ApiError::forbidden("Only the evaluated employee can sign this evaluation"));
                }
                if evaluation.signed_by_employee_at.is_some() {
                    return Err(ApiError::conflict("Evaluation already signed by the employee"));
                }
                Changes::new()
                    .set("signed_by_employee_at", Utc::now())
                    .set_opt("commentaires_employe", input.comments)
            }
            Action::Finalize => {
                actor.require(HR)?;
                Changes::new().set("signed_by_evaluator_at", Utc::now())
            }
            _ => Changes::new(),
        };
        transition::transition(&self.state, &SPEC, id, actor, action, extras, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn criteria(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn overall_score_is_the_mean() {
        let scores = criteria(json!({"ponctualite": 15, "qualite": 16.5, "initiative": 12}));
        assert_eq!(overall_score(&scores), Decimal::new(1450, 2));
        assert_eq!(overall_score(&Map::new()), Decimal::ZERO);
    }

    #[test]
    fn mean_rounds_to_two_decimals() {
        let scores = criteria(json!({"a": 10, "b": 10, "c": 11}));
        assert_eq!(overall_score(&scores), Decimal::new(1033, 2));
    }

    #[test]
    fn scores_are_bounded() {
        let input = EvaluationInput {
            criteria: Some(criteria(json!({"qualite": 21}))),
            ..Default::default()
        };
        let errors = input.validate(false).unwrap_err().to_json()["errors"].clone();
        assert!(errors.get("criteria.qualite").is_some());
    }
}
