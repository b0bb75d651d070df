//! Leave requests with working-day counting and overlap detection.

use chrono::{Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgExecutor;
use std::collections::{BTreeMap, HashMap};

use crate::auth::role::HR;
use crate::auth::Role;
use crate::config::config;
use crate::database::models::LeaveRequest;
use crate::database::{Changes, Page, PageRequest, Repository};
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::notify::{EntityRef, NotificationEvent};
use crate::services::transition::{self, ActionInput, TransitionSpec};
use crate::services::{today, Criteria, Detail, LIST_ORDER};
use crate::state::AppState;
use crate::validation::Validator;
use crate::workflow::machines::{LeaveStatus, LEAVE_REQUEST};
use crate::workflow::Action;

const TABLE: &str = "leave_requests";

pub static SPEC: TransitionSpec<LeaveStatus> = TransitionSpec {
    table: TABLE,
    entity: EntityRef {
        entity_type: "leave_request",
        label: "Demande de congé",
        route: "/leave-requests",
    },
    machine: &LEAVE_REQUEST,
    owner: "t.created_by",
};

pub const LEAVE_TYPES: &[&str] = &["annual", "sick", "maternity", "paternity", "personal", "emergency", "unpaid"];

#[derive(Debug, Default, Deserialize)]
pub struct LeaveQuery {
    pub status: Option<LeaveStatus>,
    pub employee_id: Option<i64>,
    pub leave_type: Option<String>,
    pub date_debut: Option<NaiveDate>,
    pub date_fin: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LeaveInput {
    pub employee_id: Option<i64>,
    pub leave_type: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub reason: Option<String>,
    pub comments: Option<String>,
}

impl LeaveInput {
    fn validate(&self, creating: bool) -> Result<(), ApiError> {
        let mut v = Validator::new();
        if creating {
            v.required("employee_id", &self.employee_id)
                .required_str("leave_type", &self.leave_type)
                .required("start_date", &self.start_date)
                .required("end_date", &self.end_date)
                .required_str("reason", &self.reason);
        }
        v.one_of("leave_type", &self.leave_type, LEAVE_TYPES)
            .date_years("start_date", self.start_date, YEARS.0, YEARS.1)
            .date_years("end_date", self.end_date, YEARS.0, YEARS.1)
            .date_after("end_date", self.start_date, self.end_date)
            .length("reason", &self.reason, 10, 1000);
        v.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct ConflictQuery {
    pub employee_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub exclude_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ConflictReport {
    pub has_conflicts: bool,
    pub conflicts: Vec<LeaveRequest>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LeaveStatsQuery {
    pub employee_id: Option<i64>,
    pub date_debut: Option<NaiveDate>,
    pub date_fin: Option<NaiveDate>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct LeaveStatsRow {
    pub status: LeaveStatus,
    pub leave_type: String,
    /// `YYYY-MM` of the start date
    pub month: String,
    pub count: i64,
    pub days: i64,
}

#[derive(Debug, Serialize)]
pub struct LeaveStats {
    pub total: i64,
    pub by_status: BTreeMap<&'static str, i64>,
    pub by_type: BTreeMap<String, i64>,
    pub by_month: BTreeMap<String, i64>,
    /// Working days covered by approved requests
    pub approved_days: i64,
}

impl LeaveStats {
    pub fn from_rows(rows: &[LeaveStatsRow]) -> Self {
        let mut stats = LeaveStats {
            total: 0,
            by_status: LeaveStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect(),
            by_type: LEAVE_TYPES.iter().map(|t| (t.to_string(), 0)).collect(),
            by_month: BTreeMap::new(),
            approved_days: 0,
        };
        for row in rows {
            stats.total += row.count;
            *stats.by_status.entry(row.status.as_str()).or_default() += row.count;
            *stats.by_type.entry(row.leave_type.clone()).or_default() += row.count;
            *stats.by_month.entry(row.month.clone()).or_default() += row.count;
            if row.status == LeaveStatus::Approved {
                stats.approved_days += row.days;
            }
        }
        stats
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BalanceQuery {
    pub year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceLine {
    pub leave_type: &'static str,
    pub allowance: i64,
    pub used: i64,
    pub remaining: i64,
}

#[derive(Debug, Serialize)]
pub struct LeaveBalance {
    pub employee_id: i64,
    pub year: i32,
    pub balances: Vec<BalanceLine>,
}

/// Leave types drawn from a yearly allowance; the others are unlimited
fn allowances() -> [(&'static str, i64); 3] {
    let leave = &config().leave;
    [
        ("annual", leave.annual_days),
        ("sick", leave.sick_days),
        ("personal", leave.personal_days),
    ]
}

pub fn balance_lines(allowances: &[(&'static str, i64)], used: &HashMap<String, i64>) -> Vec<BalanceLine> {
    allowances
        .iter()
        .map(|&(leave_type, allowance)| {
            let used = used.get(leave_type).copied().unwrap_or(0);
            BalanceLine {
                leave_type,
                allowance,
                used,
                remaining: (allowance - used).max(0),
            }
        })
        .collect()
}

/// Approved working days per leave type for leaves starting in `year`
async fn used_days<'c, E: PgExecutor<'c>>(
    executor: E,
    employee_id: i64,
    year: i32,
) -> Result<HashMap<String, i64>, ApiError> {
    let (Some(from), Some(to)) = (NaiveDate::from_ymd_opt(year, 1, 1), NaiveDate::from_ymd_opt(year + 1, 1, 1)) else {
        return Err(ApiError::field("year", "Must be a calendar year"));
    };
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT leave_type, COALESCE(SUM(total_days), 0)::bigint FROM leave_requests \
         WHERE employee_id = $1 AND status = $2 AND start_date >= $3 AND start_date < $4 \
         GROUP BY leave_type",
    )
    .bind(employee_id)
    .bind(LeaveStatus::Approved.as_str())
    .bind(from)
    .bind(to)
    .fetch_all(executor)
    .await?;
    Ok(rows.into_iter().collect())
}

/// Leave dates outside this span are refused
const YEARS: (i32, i32) = (1900, 2200);

/// Monday to Friday, both ends included
pub fn working_days(start: NaiveDate, end: NaiveDate) -> i32 {
    if end < start {
        return 0;
    }
    let span = (end - start).num_days() + 1;
    // Every full week holds five working days; the remainder repeats the
    // weekdays that follow `start`
    let mut days = span / 7 * 5;
    let mut day = start;
    for _ in 0..span % 7 {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            days += 1;
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    i32::try_from(days).unwrap_or(i32::MAX)
}

pub struct LeaveService {
    state: AppState,
}

impl LeaveService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    fn repo(&self) -> Repository<LeaveRequest> {
        Repository::new(TABLE, &self.state.pool)
    }

    /// HR sees every request; other callers only the ones they filed
    fn scope(actor: &Actor) -> Option<i64> {
        actor.require(HR).is_err().then_some(actor.user_id)
    }

    pub async fn list(&self, query: &LeaveQuery, actor: &Actor) -> Result<Page<LeaveRequest>, ApiError> {
        let criteria = Criteria::new()
            .eq_opt("status", query.status.map(LeaveStatus::to_filter))
            .eq_opt("employee_id", query.employee_id)
            .eq_opt("leave_type", query.leave_type.clone())
            .date_range("start_date", query.date_debut, query.date_fin)
            .owned_by("created_by", Self::scope(actor))
            .build();
        let request = PageRequest::new(query.page, query.per_page);
        Ok(self.repo().page(criteria, LIST_ORDER, &request).await?)
    }

    async fn visible(&self, id: i64, actor: &Actor) -> Result<LeaveRequest, ApiError> {
        let owner = Self::scope(actor).map(|user_id| ("created_by", user_id));
        Ok(self.repo().find(id, owner).await?)
    }

    pub async fn show(&self, id: i64, actor: &Actor) -> Result<Detail<LeaveRequest>, ApiError> {
        let leave = self.visible(id, actor).await?;
        let status = leave.status;
        Ok(Detail::new(leave, &LEAVE_REQUEST, status))
    }

    /// Approved leaves of the employee overlapping `[start, end]`
    pub async fn conflicts(&self, query: &ConflictQuery) -> Result<ConflictReport, ApiError> {
        let conflicts = sqlx::query_as::<_, LeaveRequest>(
            "SELECT * FROM leave_requests \
             WHERE employee_id = $1 AND status = $2 \
               AND start_date <= $4 AND end_date >= $3 \
               AND ($5::bigint IS NULL OR id <> $5) \
             ORDER BY start_date",
        )
        .bind(query.employee_id)
        .bind(LeaveStatus::Approved.as_str())
        .bind(query.start_date)
        .bind(query.end_date)
        .bind(query.exclude_id)
        .fetch_all(&self.state.pool)
        .await?;
        Ok(ConflictReport {
            has_conflicts: !conflicts.is_empty(),
            conflicts,
        })
    }

    pub async fn stats(&self, query: &LeaveStatsQuery) -> Result<LeaveStats, ApiError> {
        let mut v = Validator::new();
        v.date_not_before("date_fin", query.date_debut, query.date_fin);
        v.finish()?;

        let rows = sqlx::query_as::<_, LeaveStatsRow>(
            "SELECT status, leave_type, to_char(start_date, 'YYYY-MM') AS month, \
                    COUNT(*) AS count, COALESCE(SUM(total_days), 0)::bigint AS days \
             FROM leave_requests \
             WHERE ($1::bigint IS NULL OR employee_id = $1) \
               AND ($2::date IS NULL OR start_date >= $2) \
               AND ($3::date IS NULL OR start_date <= $3) \
             GROUP BY status, leave_type, month",
        )
        .bind(query.employee_id)
        .bind(query.date_debut)
        .bind(query.date_fin)
        .fetch_all(&self.state.pool)
        .await?;
        Ok(LeaveStats::from_rows(&rows))
    }

    /// Remaining allowance of an employee; non-HR callers only see their own
    pub async fn balance(&self, employee_id: i64, query: &BalanceQuery, actor: &Actor) -> Result<LeaveBalance, ApiError> {
        let year = query.year.unwrap_or_else(|| today().year());
        let mut v = Validator::new();
        v.range_i64("year", Some(i64::from(year)), i64::from(YEARS.0), i64::from(YEARS.1));
        v.finish()?;

        let owner: Option<Option<i64>> = sqlx::query_scalar("SELECT user_id FROM employees WHERE id = $1")
            .bind(employee_id)
            .fetch_optional(&self.state.pool)
            .await?;
        let visible = match (owner, Self::scope(actor)) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(user_id), Some(caller)) => user_id == Some(caller),
        };
        if !visible {
            return Err(ApiError::not_found("Employee not found"));
        }

        let used = used_days(&self.state.pool, employee_id, year).await?;
        Ok(LeaveBalance {
            employee_id,
            year,
            balances: balance_lines(&allowances(), &used),
        })
    }

    /// Approval draws the leave's working days from the allowance of its year
    async fn ensure_allowance(&self, id: i64) -> Result<(), ApiError> {
        let leave = self.repo().find(id, None).await?;
        let year = leave.start_date.year();
        let used = used_days(&self.state.pool, leave.employee_id, year).await?;
        let line = balance_lines(&allowances(), &used)
            .into_iter()
            .find(|line| line.leave_type == leave.leave_type);
        match line {
            Some(line) if i64::from(leave.total_days) > line.remaining => Err(ApiError::conflict(format!(
                "Only {} day(s) of {} leave left for {}",
                line.remaining, line.leave_type, year
            ))),
            _ => Ok(()),
        }
    }

    /// 400 with the overlapping approved leaves in `data`
    async fn ensure_no_conflict(
        &self,
        employee_id: i64,
        start: NaiveDate,
        end: NaiveDate,
        exclude_id: Option<i64>,
    ) -> Result<(), ApiError> {
        let report = self
            .conflicts(&ConflictQuery {
                employee_id,
                start_date: start,
                end_date: end,
                exclude_id,
            })
            .await?;
        if report.has_conflicts {
            return Err(ApiError::bad_request_with_data(
                "The requested period overlaps an approved leave",
                json!({ "conflicts": report.conflicts }),
            ));
        }
        Ok(())
    }

    pub async fn create(&self, input: LeaveInput, actor: &Actor) -> Result<LeaveRequest, ApiError> {
        input.validate(true)?;
        let (Some(employee_id), Some(start), Some(end)) = (input.employee_id, input.start_date, input.end_date) else {
            return Err(ApiError::bad_request("employee_id, start_date and end_date are required"));
        };

        self.ensure_no_conflict(employee_id, start, end, None).await?;

        let changes = Changes::new()
            .set("employee_id", employee_id)
            .set_opt("leave_type", input.leave_type)
            .set("start_date", start)
            .set("end_date", end)
            .set("total_days", working_days(start, end))
            .set_opt("reason", input.reason)
            .set_opt("comments", input.comments)
            .set("status", LEAVE_REQUEST.initial)
            .set("created_by", actor.user_id);

        let mut tx = self.state.pool.begin().await?;
        let leave: LeaveRequest = changes.insert(TABLE, &mut *tx).await?;
        for role in [Role::Rh, Role::Patron] {
            let event = NotificationEvent::submission_to(&SPEC.entity, leave.id, actor, role);
            self.state.notifier.dispatch(&mut *tx, &event).await?;
        }
        tx.commit().await?;

        tracing::info!(leave_id = leave.id, employee_id, total_days = leave.total_days, "leave requested");
        Ok(leave)
    }

    pub async fn update(&self, id: i64, input: LeaveInput, actor: &Actor) -> Result<LeaveRequest, ApiError> {
        input.validate(false)?;
        let current = self.visible(id, actor).await?;

        let start = input.start_date.unwrap_or(current.start_date);
        let end = input.end_date.unwrap_or(current.end_date);
        let mut v = Validator::new();
        v.date_after("end_date", Some(start), Some(end));
        v.finish()?;

        let moved = input.start_date.is_some() || input.end_date.is_some();
        if moved {
            self.ensure_no_conflict(current.employee_id, start, end, Some(id)).await?;
        }

        let mut changes = Changes::new()
            .set_opt("leave_type", input.leave_type)
            .set_opt("start_date", input.start_date)
            .set_opt("end_date", input.end_date)
            .set_opt("reason", input.reason)
            .set_opt("comments", input.comments);
        if moved {
            changes = changes.set("total_days", working_days(start, end));
        }
        transition::update_guarded(&self.state, TABLE, &LEAVE_REQUEST, id, changes).await
    }

    pub async fn delete(&self, id: i64, actor: &Actor) -> Result<(), ApiError> {
        self.visible(id, actor).await?;
        transition::delete_guarded(&self.state, TABLE, &LEAVE_REQUEST, id).await
    }

    pub async fn act(&self, id: i64, action: Action, input: ActionInput, actor: &Actor) -> Result<LeaveRequest, ApiError> {
        let (extras, reason) = match action {
            Action::Approve => {
                actor.require(HR)?;
                self.ensure_allowance(id).await?;
                let extras = Changes::new()
                    .set("approved_by", actor.user_id)
                    .set("approved_at", Utc::now())
                    .set_opt("comments", input.comments);
                (extras, None)
            }
            Action::Reject => {
                actor.require(HR)?;
                let reason = input.require_reason()?;
                (Changes::new().set("rejection_reason", reason.clone()), Some(reason))
            }
            _ => {
                self.visible(id, actor).await?;
                (Changes::new(), input.reason)
            }
        };
        transition::transition(&self.state, &SPEC, id, actor, action, extras, reason.as_deref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    #[test]
    fn counts_weekdays_only() {
        // 2024-07-01 is a Monday
        assert_eq!(working_days(date(1), date(5)), 5);
        assert_eq!(working_days(date(1), date(7)), 5);
        assert_eq!(working_days(date(5), date(8)), 2);
        assert_eq!(working_days(date(6), date(7)), 0);
    }

    #[test]
    fn long_ranges_count_whole_weeks() {
        // Four full weeks plus Monday to Wednesday
        assert_eq!(working_days(date(1), date(31)), 23);
        assert_eq!(working_days(date(8), date(1)), 0);
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        assert_eq!(working_days(start, end), 262);
    }

    #[test]
    fn the_last_calendar_day_does_not_overflow() {
        let last = NaiveDate::MAX;
        let before = last.pred_opt().unwrap();
        assert!(working_days(before, last) <= 2);
        assert!(working_days(NaiveDate::MIN, last) > 0);
    }

    #[test]
    fn dates_far_in_the_future_are_invalid() {
        let input = LeaveInput {
            start_date: Some(NaiveDate::MAX.pred_opt().unwrap()),
            end_date: Some(NaiveDate::MAX),
            ..Default::default()
        };
        let errors = input.validate(false).unwrap_err().to_json()["errors"].clone();
        assert!(errors.get("start_date").is_some());
        assert!(errors.get("end_date").is_some());
    }

    #[test]
    fn balance_subtracts_approved_days() {
        let allowances = [("annual", 25), ("sick", 10), ("personal", 5)];
        let used: HashMap<String, i64> = [("annual".to_string(), 12), ("personal".to_string(), 7)].into();
        let lines = balance_lines(&allowances, &used);
        assert_eq!(
            lines[0],
            BalanceLine {
                leave_type: "annual",
                allowance: 25,
                used: 12,
                remaining: 13
            }
        );
        assert_eq!(lines[1].remaining, 10);
        // Overdrawn allowances bottom out at zero
        assert_eq!(lines[2].remaining, 0);
    }

    #[test]
    fn stats_fold_counts_and_approved_days() {
        let row = |status, leave_type: &str, month: &str, count, days| LeaveStatsRow {
            status,
            leave_type: leave_type.into(),
            month: month.into(),
            count,
            days,
        };
        let stats = LeaveStats::from_rows(&[
            row(LeaveStatus::Approved, "annual", "2024-07", 2, 9),
            row(LeaveStatus::Pending, "annual", "2024-07", 1, 3),
            row(LeaveStatus::Approved, "sick", "2024-08", 1, 2),
        ]);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.by_status["approved"], 3);
        assert_eq!(stats.by_status["rejected"], 0);
        assert_eq!(stats.by_type["annual"], 3);
        assert_eq!(stats.by_type["unpaid"], 0);
        assert_eq!(stats.by_month["2024-07"], 3);
        assert_eq!(stats.approved_days, 11);
    }

    #[test]
    fn reason_length_is_bounded() {
        let input = LeaveInput {
            employee_id: Some(1),
            leave_type: Some("annual".into()),
            start_date: Some(date(1)),
            end_date: Some(date(5)),
            reason: Some("repos".into()),
            comments: None,
        };
        let errors = input.validate(true).unwrap_err().to_json()["errors"].clone();
        assert!(errors.get("reason").is_some());
    }

    #[test]
    fn unknown_leave_type_is_rejected() {
        let input = LeaveInput {
            leave_type: Some("sabbatical".into()),
            ..Default::default()
        };
        assert!(input.validate(false).is_err());
    }
}
