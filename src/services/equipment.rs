//! Equipment inventory. Status is set freely on update; `retired` is final.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::database::models::Equipment;
use crate::database::{Changes, Page, PageRequest, Repository};
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::Actor;
use crate::services::transition::locked_status;
use crate::services::{today, Criteria, LIST_ORDER};
use crate::state::AppState;
use crate::validation::Validator;
use crate::workflow::machines::EquipmentStatus;
use crate::workflow::Machine;

const TABLE: &str = "equipment";

pub const CONDITIONS: &[&str] = &["excellent", "good", "fair", "poor", "critical"];

/// Statuses from which equipment can be handed to someone
const ASSIGNABLE: &[EquipmentStatus] = &[
    EquipmentStatus::Active,
    EquipmentStatus::Inactive,
    EquipmentStatus::Maintenance,
];

const MODIFIABLE: &[EquipmentStatus] = &[
    EquipmentStatus::Active,
    EquipmentStatus::Inactive,
    EquipmentStatus::Maintenance,
    EquipmentStatus::Broken,
];

#[derive(Debug, Default, Deserialize)]
pub struct EquipmentQuery {
    pub status: Option<EquipmentStatus>,
    pub category: Option<String>,
    pub condition: Option<String>,
    pub assigned_to: Option<i64>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EquipmentInput {
    pub name: Option<String>,
    pub category: Option<String>,
    pub serial_number: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_price: Option<Decimal>,
    pub warranty_expiry: Option<NaiveDate>,
    pub location: Option<String>,
    pub status: Option<EquipmentStatus>,
    pub condition: Option<String>,
    pub notes: Option<String>,
}

impl EquipmentInput {
    fn validate(&self, creating: bool) -> Result<(), ApiError> {
        let mut v = Validator::new();
        if creating {
            v.required_str("name", &self.name).required_str("category", &self.category);
        }
        v.one_of("condition", &self.condition, CONDITIONS)
            .non_negative("purchase_price", &self.purchase_price)
            .date_after("warranty_expiry", self.purchase_date, self.warranty_expiry);
        v.finish()
    }

    fn changes(self) -> Changes {
        Changes::new()
            .set_opt("name", self.name)
            .set_opt("category", self.category)
            .set_opt("serial_number", self.serial_number)
            .set_opt("brand", self.brand)
            .set_opt("model", self.model)
            .set_opt("purchase_date", self.purchase_date)
            .set_opt("purchase_price", self.purchase_price)
            .set_opt("warranty_expiry", self.warranty_expiry)
            .set_opt("location", self.location)
            .set_opt("status", self.status)
            .set_opt("condition", self.condition)
            .set_opt("notes", self.notes)
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignInput {
    pub user_id: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct WarrantyQuery {
    pub days: Option<i64>,
}

/// Equipment plus whether it can be handed out right now
#[derive(Debug, Serialize)]
pub struct EquipmentDetail {
    #[serde(flatten)]
    pub equipment: Equipment,
    pub assignable: bool,
}

pub struct EquipmentService {
    state: AppState,
}

impl EquipmentService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    fn repo(&self) -> Repository<Equipment> {
        Repository::new(TABLE, &self.state.pool)
    }

    pub async fn list(&self, query: &EquipmentQuery) -> Result<Page<Equipment>, ApiError> {
        let criteria = Criteria::new()
            .eq_opt("status", query.status.map(EquipmentStatus::to_filter))
            .eq_opt("category", query.category.clone())
            .eq_opt("condition", query.condition.clone())
            .eq_opt("assigned_to", query.assigned_to)
            .search(&["name", "serial_number", "brand", "model"], query.search.as_deref())
            .build();
        let request = PageRequest::new(query.page, query.per_page);
        Ok(self.repo().page(criteria, LIST_ORDER, &request).await?)
    }

    pub async fn show(&self, id: i64) -> Result<EquipmentDetail, ApiError> {
        let equipment = self.repo().find(id, None).await?;
        Ok(EquipmentDetail {
            assignable: ASSIGNABLE.contains(&equipment.status),
            equipment,
        })
    }

    pub async fn create(&self, input: EquipmentInput, actor: &Actor) -> Result<Equipment, ApiError> {
        input.validate(true)?;
        let mut changes = input.changes().set("created_by", actor.user_id);
        if !changes.contains("status") {
            changes = changes.set("status", EquipmentStatus::Active);
        }
        let equipment: Equipment = changes.insert(TABLE, &self.state.pool).await?;
        tracing::info!(equipment_id = equipment.id, name = %equipment.name, "equipment registered");
        Ok(equipment)
    }

    pub async fn update(&self, id: i64, input: EquipmentInput) -> Result<Equipment, ApiError> {
        input.validate(false)?;
        self.locked(id, MODIFIABLE, "update", input.changes()).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.repo().find(id, None).await?;
        sqlx::query("DELETE FROM equipment WHERE id = $1")
            .bind(id)
            .execute(&self.state.pool)
            .await?;
        tracing::info!(equipment_id = id, "equipment deleted");
        Ok(())
    }

    pub async fn assign(&self, id: i64, input: AssignInput) -> Result<Equipment, ApiError> {
        let user_exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1 AND is_active)")
            .bind(input.user_id)
            .fetch_one(&self.state.pool)
            .await?;
        if !user_exists {
            return Err(ApiError::field("user_id", "Unknown or inactive user"));
        }
        let changes = Changes::new().set("assigned_to", input.user_id);
        let equipment = self.locked(id, ASSIGNABLE, "assign", changes).await?;
        tracing::info!(equipment_id = id, user_id = input.user_id, "equipment assigned");
        Ok(equipment)
    }

    pub async fn unassign(&self, id: i64) -> Result<Equipment, ApiError> {
        let changes = Changes::new().set("assigned_to", None::<i64>);
        let equipment = self.locked(id, MODIFIABLE, "return", changes).await?;
        tracing::info!(equipment_id = id, "equipment returned");
        Ok(equipment)
    }

    /// Warranty ending between today and `days` from now
    pub async fn warranty_expiring(&self, query: &WarrantyQuery) -> Result<Vec<Equipment>, ApiError> {
        let days = query.days.unwrap_or(30).clamp(1, 365);
        let from = today();
        let criteria = Criteria::new()
            .op("status", "$ne", EquipmentStatus::Retired.to_filter())
            .date_range("warranty_expiry", Some(from), Some(from + Duration::days(days)))
            .build();
        let equipment = self
            .repo()
            .select_any(FilterData {
                where_clause: Some(criteria),
                order: Some(serde_json::json!("warranty_expiry asc")),
                ..Default::default()
            })
            .await?;
        Ok(equipment)
    }

    async fn locked(
        &self,
        id: i64,
        allowed: &[EquipmentStatus],
        operation: &'static str,
        changes: Changes,
    ) -> Result<Equipment, ApiError> {
        let mut tx = self.state.pool.begin().await?;
        let current: EquipmentStatus = locked_status(&mut *tx, TABLE, id).await?;
        Machine::<EquipmentStatus>::ensure_in(current, allowed, operation)?;
        let equipment = changes.update(TABLE, id, &mut *tx).await?;
        tx.commit().await?;
        Ok(equipment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retired_and_broken_cannot_be_assigned() {
        assert!(Machine::<EquipmentStatus>::ensure_in(EquipmentStatus::Retired, ASSIGNABLE, "assign").is_err());
        assert!(Machine::<EquipmentStatus>::ensure_in(EquipmentStatus::Broken, ASSIGNABLE, "assign").is_err());
        assert!(Machine::<EquipmentStatus>::ensure_in(EquipmentStatus::Maintenance, ASSIGNABLE, "assign").is_ok());
    }

    #[test]
    fn retired_equipment_is_frozen() {
        let err = Machine::<EquipmentStatus>::ensure_in(EquipmentStatus::Retired, MODIFIABLE, "update").unwrap_err();
        assert_eq!(err.to_string(), "Cannot update equipment in status 'retired'");
    }

    #[test]
    fn condition_must_be_known() {
        let input = EquipmentInput {
            condition: Some("broken".into()),
            ..Default::default()
        };
        assert!(input.validate(false).is_err());
    }
}
