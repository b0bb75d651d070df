use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::workflow::machines::{ApplicationStatus, RecruitmentRequestStatus};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RecruitmentRequest {
    pub id: i64,
    pub title: String,
    pub department: String,
    pub position: String,
    pub description: String,
    pub requirements: Option<String>,
    pub number_of_positions: i32,
    pub employment_type: String,
    pub salary_range: Option<String>,
    pub application_deadline: Option<NaiveDate>,
    pub status: RecruitmentRequestStatus,
    pub rejection_reason: Option<String>,
    pub approved_by: Option<i64>,
    pub approved_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RecruitmentApplication {
    pub id: i64,
    pub recruitment_request_id: i64,
    pub candidate_name: String,
    pub candidate_email: String,
    pub candidate_phone: Option<String>,
    pub cover_letter: Option<String>,
    pub status: ApplicationStatus,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
