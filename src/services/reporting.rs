//! Cross-resource dashboard figures.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Row};
use std::collections::BTreeMap;

use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::services::status_counts;
use crate::state::AppState;
use crate::validation::Validator;
use crate::workflow::machines::*;
use crate::workflow::Status;

type Counts = BTreeMap<&'static str, i64>;

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub date_debut: Option<NaiveDate>,
    pub date_fin: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub period: Period,
    /// Entity type to row count per status
    pub counts: BTreeMap<&'static str, Counts>,
    pub purchase_amounts: BTreeMap<&'static str, Decimal>,
    pub expense_amounts: BTreeMap<&'static str, Decimal>,
    /// Entity type to documents waiting for an approver
    pub pending: Counts,
    pub pending_approvals: i64,
}

#[derive(Debug, Serialize)]
pub struct Period {
    pub date_debut: Option<NaiveDate>,
    pub date_fin: Option<NaiveDate>,
}

pub struct ReportingService {
    state: AppState,
}

impl ReportingService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub async fn dashboard(&self, query: &DashboardQuery) -> Result<Dashboard, ApiError> {
        let mut v = Validator::new();
        v.date_not_before("date_fin", query.date_debut, query.date_fin);
        v.finish()?;

        let pool = &self.state.pool;
        let (from, to) = (query.date_debut, query.date_fin);
        let mut counts = BTreeMap::new();
        let mut pending = Counts::new();

        macro_rules! tally {
            ($status:ty, $table:expr, [$($waiting:expr),*]) => {{
                let by_status = status_counts::<$status>(pool, $table, from, to).await?;
                let waiting: i64 = [$($waiting),*].iter().map(|s: &$status| by_status[s.as_str()]).sum();
                pending.insert(<$status as Status>::ENTITY, waiting);
                counts.insert(<$status as Status>::ENTITY, by_status);
            }};
        }

        tally!(PurchaseOrderStatus, "purchase_orders", [PurchaseOrderStatus::EnAttente]);
        tally!(EnterpriseOrderStatus, "enterprise_orders", [EnterpriseOrderStatus::Soumis]);
        tally!(QuoteStatus, "quotes", [QuoteStatus::Envoye]);
        tally!(ClientStatus, "clients", [ClientStatus::EnAttente]);
        tally!(SupplierStatus, "suppliers", [SupplierStatus::EnAttente]);
        tally!(ContractStatus, "contracts", [ContractStatus::Pending]);
        tally!(ExpenseStatus, "expenses", [ExpenseStatus::Submitted, ExpenseStatus::UnderReview]);
        tally!(LeaveStatus, "leave_requests", [LeaveStatus::Pending]);
        tally!(InterventionStatus, "interventions", [InterventionStatus::Pending]);
        tally!(RecruitmentRequestStatus, "recruitment_requests", [RecruitmentRequestStatus::Draft]);
        tally!(ApplicationStatus, "recruitment_applications", []);
        tally!(TaxStatus, "taxes", [TaxStatus::EnAttente]);
        tally!(StockStatus, "stocks", [StockStatus::EnAttente]);
        tally!(SalaryStatus, "salaries", [SalaryStatus::Draft, SalaryStatus::Calculated]);
        tally!(EvaluationStatus, "evaluations", []);
        tally!(EmployeeStatus, "employees", []);
        tally!(EquipmentStatus, "equipment", []);

        let purchase_amounts = amounts_by_status::<PurchaseOrderStatus>(pool, "purchase_orders", "montant_total", from, to).await?;
        let expense_amounts = amounts_by_status::<ExpenseStatus>(pool, "expenses", "amount", from, to).await?;

        tracing::debug!(tables = counts.len(), "dashboard computed");
        Ok(Dashboard {
            period: Period {
                date_debut: from,
                date_fin: to,
            },
            pending_approvals: pending.values().sum(),
            counts,
            purchase_amounts,
            expense_amounts,
            pending,
        })
    }
}

/// Sum of `column` per status, every status present
async fn amounts_by_status<S>(
    pool: &PgPool,
    table: &str,
    column: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<BTreeMap<&'static str, Decimal>, DatabaseError>
where
    S: Status + for<'r> sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    let rows = sqlx::query(&format!(
        "SELECT status, COALESCE(SUM({column}), 0) AS amount FROM {table} \
         WHERE ($1::date IS NULL OR created_at >= $1::date) \
           AND ($2::date IS NULL OR created_at < $2::date + 1) \
         GROUP BY status",
        column = column,
        table = table
    ))
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    let mut amounts: BTreeMap<&'static str, Decimal> = S::all().iter().map(|s| (s.as_str(), Decimal::ZERO)).collect();
    for row in rows {
        let status: S = row.try_get("status")?;
        amounts.insert(status.as_str(), row.try_get("amount")?);
    }
    Ok(amounts)
}
