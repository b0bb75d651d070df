//! Recruitment requests and the applications received for them.

use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::auth::role::APPROVERS;
use crate::database::models::{RecruitmentApplication, RecruitmentRequest};
use crate::database::{Changes, Page, PageRequest, Repository};
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::notify::{EntityRef, NotificationEvent};
use crate::services::transition::{self, ActionInput, TransitionSpec};
use crate::services::{today, Criteria, Detail, LIST_ORDER};
use crate::state::AppState;
use crate::validation::Validator;
use crate::workflow::machines::{ApplicationStatus, RecruitmentRequestStatus, APPLICATION, RECRUITMENT_REQUEST};
use crate::workflow::Action;

const REQUESTS: &str = "recruitment_requests";
const APPLICATIONS: &str = "recruitment_applications";

pub static REQUEST_SPEC: TransitionSpec<RecruitmentRequestStatus> = TransitionSpec {
    table: REQUESTS,
    entity: EntityRef {
        entity_type: "recruitment_request",
        label: "Demande de recrutement",
        route: "/recruitment-requests",
    },
    machine: &RECRUITMENT_REQUEST,
    owner: "t.created_by",
};

/// Candidates have no account; outcomes go to the request's author
pub static APPLICATION_SPEC: TransitionSpec<ApplicationStatus> = TransitionSpec {
    table: APPLICATIONS,
    entity: EntityRef {
        entity_type: "recruitment_application",
        label: "Candidature",
        route: "/recruitment-applications",
    },
    machine: &APPLICATION,
    owner: "(SELECT r.created_by FROM recruitment_requests r WHERE r.id = t.recruitment_request_id)",
};

pub const EMPLOYMENT_TYPES: &[&str] = &["full_time", "part_time", "contract", "internship"];

#[derive(Debug, Default, Deserialize)]
pub struct RequestQuery {
    pub status: Option<RecruitmentRequestStatus>,
    pub department: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RequestInput {
    pub title: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub number_of_positions: Option<i32>,
    pub employment_type: Option<String>,
    pub salary_range: Option<String>,
    pub application_deadline: Option<NaiveDate>,
}

impl RequestInput {
    fn validate(&self, creating: bool) -> Result<(), ApiError> {
        let mut v = Validator::new();
        if creating {
            v.required_str("title", &self.title)
                .required_str("department", &self.department)
                .required_str("position", &self.position)
                .required_str("description", &self.description)
                .required_str("employment_type", &self.employment_type);
        }
        v.range_i64("number_of_positions", self.number_of_positions.map(i64::from), 1, 1000)
            .one_of("employment_type", &self.employment_type, EMPLOYMENT_TYPES);
        if let Some(deadline) = self.application_deadline {
            v.check(deadline >= today(), "application_deadline", "Must not be in the past");
        }
        v.finish()
    }

    fn changes(self) -> Changes {
        Changes::new()
            .set_opt("title", self.title)
            .set_opt("department", self.department)
            .set_opt("position", self.position)
            .set_opt("description", self.description)
            .set_opt("requirements", self.requirements)
            .set_opt("number_of_positions", self.number_of_positions)
            .set_opt("employment_type", self.employment_type)
            .set_opt("salary_range", self.salary_range)
            .set_opt("application_deadline", self.application_deadline)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplicationQuery {
    pub status: Option<ApplicationStatus>,
    pub recruitment_request_id: Option<i64>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplicationInput {
    pub recruitment_request_id: Option<i64>,
    pub candidate_name: Option<String>,
    pub candidate_email: Option<String>,
    pub candidate_phone: Option<String>,
    pub cover_letter: Option<String>,
    pub notes: Option<String>,
}

impl ApplicationInput {
    fn validate(&self, creating: bool) -> Result<(), ApiError> {
        let mut v = Validator::new();
        if creating {
            v.required("recruitment_request_id", &self.recruitment_request_id)
                .required_str("candidate_name", &self.candidate_name)
                .required_str("candidate_email", &self.candidate_email);
        }
        v.email("candidate_email", &self.candidate_email)
            .length("cover_letter", &self.cover_letter, 0, 5000);
        v.finish()
    }
}

/// Applications are accepted while the request is published and open
fn ensure_open(request: &RecruitmentRequest, on: NaiveDate) -> Result<(), ApiError> {
    if request.status != RecruitmentRequestStatus::Published {
        return Err(ApiError::conflict(format!(
            "Recruitment request is {}, applications are closed",
            request.status
        )));
    }
    if request.application_deadline.is_some_and(|deadline| deadline < on) {
        return Err(ApiError::conflict("The application deadline has passed"));
    }
    Ok(())
}

pub struct RecruitmentService {
    state: AppState,
}

impl RecruitmentService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    fn requests(&self) -> Repository<RecruitmentRequest> {
        Repository::new(REQUESTS, &self.state.pool)
    }

    fn applications(&self) -> Repository<RecruitmentApplication> {
        Repository::new(APPLICATIONS, &self.state.pool)
    }

    pub async fn list_requests(&self, query: &RequestQuery) -> Result<Page<RecruitmentRequest>, ApiError> {
        let criteria = Criteria::new()
            .eq_opt("status", query.status.map(RecruitmentRequestStatus::to_filter))
            .eq_opt("department", query.department.clone())
            .search(&["title", "position"], query.search.as_deref())
            .build();
        let request = PageRequest::new(query.page, query.per_page);
        Ok(self.requests().page(criteria, LIST_ORDER, &request).await?)
    }

    pub async fn show_request(&self, id: i64) -> Result<Detail<RecruitmentRequest>, ApiError> {
        let request = self.requests().find(id, None).await?;
        let status = request.status;
        Ok(Detail::new(request, &RECRUITMENT_REQUEST, status))
    }

    pub async fn create_request(&self, input: RequestInput, actor: &Actor) -> Result<RecruitmentRequest, ApiError> {
        input.validate(true)?;
        let mut changes = input
            .changes()
            .set("status", RECRUITMENT_REQUEST.initial)
            .set("created_by", actor.user_id);
        if !changes.contains("number_of_positions") {
            changes = changes.set("number_of_positions", 1_i32);
        }

        let mut tx = self.state.pool.begin().await?;
        let request: RecruitmentRequest = changes.insert(REQUESTS, &mut *tx).await?;
        let event = NotificationEvent::submission(&REQUEST_SPEC.entity, request.id, actor);
        self.state.notifier.dispatch(&mut *tx, &event).await?;
        tx.commit().await?;

        tracing::info!(request_id = request.id, title = %request.title, "recruitment request created");
        Ok(request)
    }

    pub async fn update_request(&self, id: i64, input: RequestInput) -> Result<RecruitmentRequest, ApiError> {
        input.validate(false)?;
        transition::update_guarded(&self.state, REQUESTS, &RECRUITMENT_REQUEST, id, input.changes()).await
    }

    pub async fn delete_request(&self, id: i64) -> Result<(), ApiError> {
        transition::delete_guarded(&self.state, REQUESTS, &RECRUITMENT_REQUEST, id).await
    }

    pub async fn act_request(
        &self,
        id: i64,
        action: Action,
        input: ActionInput,
        actor: &Actor,
    ) -> Result<RecruitmentRequest, ApiError> {
        let (extras, reason) = match action {
            Action::Approve => {
                actor.require(APPROVERS)?;
                let extras = Changes::new()
                    .set("approved_by", actor.user_id)
                    .set("approved_at", Utc::now());
                (extras, None)
            }
            Action::Publish => (Changes::new().set("published_at", Utc::now()), None),
            Action::Cancel => {
                let reason = input.require_reason()?;
                (Changes::new().set("rejection_reason", reason.clone()), Some(reason))
            }
            _ => (Changes::new(), None),
        };
        transition::transition(&self.state, &REQUEST_SPEC, id, actor, action, extras, reason.as_deref()).await
    }

    pub async fn list_applications(&self, query: &ApplicationQuery) -> Result<Page<RecruitmentApplication>, ApiError> {
        let criteria = Criteria::new()
            .eq_opt("status", query.status.map(ApplicationStatus::to_filter))
            .eq_opt("recruitment_request_id", query.recruitment_request_id)
            .search(&["candidate_name", "candidate_email"], query.search.as_deref())
            .build();
        let request = PageRequest::new(query.page, query.per_page);
        Ok(self.applications().page(criteria, LIST_ORDER, &request).await?)
    }

    pub async fn show_application(&self, id: i64) -> Result<Detail<RecruitmentApplication>, ApiError> {
        let application = self.applications().find(id, None).await?;
        let status = application.status;
        Ok(Detail::new(application, &APPLICATION, status))
    }

    /// The request row stays locked until the application is stored
    pub async fn create_application(&self, input: ApplicationInput) -> Result<RecruitmentApplication, ApiError> {
        input.validate(true)?;
        let Some(request_id) = input.recruitment_request_id else {
            return Err(ApiError::field("recruitment_request_id", "This field is required"));
        };

        let mut tx = self.state.pool.begin().await?;
        let request = sqlx::query_as::<_, RecruitmentRequest>(
            "SELECT * FROM recruitment_requests WHERE id = $1 FOR SHARE",
        )
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Recruitment request not found"))?;
        ensure_open(&request, today())?;

        let application: RecruitmentApplication = Changes::new()
            .set("recruitment_request_id", request_id)
            .set_opt("candidate_name", input.candidate_name)
            .set_opt("candidate_email", input.candidate_email.map(|e| e.trim().to_lowercase()))
            .set_opt("candidate_phone", input.candidate_phone)
            .set_opt("cover_letter", input.cover_letter)
            .set_opt("notes", input.notes)
            .set("status", APPLICATION.initial)
            .insert(APPLICATIONS, &mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(application_id = application.id, request_id, "application received");
        Ok(application)
    }

    pub async fn update_application(&self, id: i64, input: ApplicationInput) -> Result<RecruitmentApplication, ApiError> {
        input.validate(false)?;
        let changes = Changes::new()
            .set_opt("candidate_name", input.candidate_name)
            .set_opt("candidate_email", input.candidate_email.map(|e| e.trim().to_lowercase()))
            .set_opt("candidate_phone", input.candidate_phone)
            .set_opt("cover_letter", input.cover_letter)
            .set_opt("notes", input.notes);
        transition::update_guarded(&self.state, APPLICATIONS, &APPLICATION, id, changes).await
    }

    pub async fn delete_application(&self, id: i64) -> Result<(), ApiError> {
        transition::delete_guarded(&self.state, APPLICATIONS, &APPLICATION, id).await
    }

    pub async fn act_application(
        &self,
        id: i64,
        action: Action,
        input: ActionInput,
        actor: &Actor,
    ) -> Result<RecruitmentApplication, ApiError> {
        let mut extras = Changes::new()
            .set("reviewed_by", actor.user_id)
            .set("reviewed_at", Utc::now())
            .set_opt("notes", input.notes.clone());
        let reason = match action {
            Action::Reject => {
                let reason = input.require_reason()?;
                extras = extras.set("rejection_reason", reason.clone());
                Some(reason)
            }
            _ => None,
        };
        transition::transition(&self.state, &APPLICATION_SPEC, id, actor, action, extras, reason.as_deref()).await
    }
}
