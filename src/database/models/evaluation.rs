use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;

use crate::workflow::machines::EvaluationStatus;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Evaluation {
    pub id: i64,
    /// users.id of the evaluated employee
    pub employee_id: i64,
    pub evaluator_id: i64,
    pub evaluation_type: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub criteria: Value,
    pub note_globale: Decimal,
    pub commentaires_evaluateur: Option<String>,
    pub commentaires_employe: Option<String>,
    pub signed_by_employee_at: Option<DateTime<Utc>>,
    pub signed_by_evaluator_at: Option<DateTime<Utc>>,
    pub status: EvaluationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
