use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::auth::role::{APPROVERS, FINANCE};
use crate::database::models::Supplier;
use crate::database::{Changes, Page, PageRequest, Repository};
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::notify::{EntityRef, NotificationEvent};
use crate::services::transition::{self, ActionInput, TransitionSpec};
use crate::services::{status_counts, Criteria, Detail, LIST_ORDER};
use crate::state::AppState;
use crate::validation::Validator;
use crate::workflow::machines::{SupplierStatus, SUPPLIER};
use crate::workflow::Action;

const TABLE: &str = "suppliers";

pub static SPEC: TransitionSpec<SupplierStatus> = TransitionSpec {
    table: TABLE,
    entity: EntityRef {
        entity_type: "supplier",
        label: "Fournisseur",
        route: "/suppliers",
    },
    machine: &SUPPLIER,
    owner: "t.created_by",
};

#[derive(Debug, Default, Deserialize)]
pub struct SupplierQuery {
    pub status: Option<SupplierStatus>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SupplierInput {
    pub nom: Option<String>,
    pub email: Option<String>,
    pub telephone: Option<String>,
    pub adresse: Option<String>,
    pub ville: Option<String>,
    pub pays: Option<String>,
    pub contact_principal: Option<String>,
    pub note_evaluation: Option<Decimal>,
    pub commentaires: Option<String>,
}

impl SupplierInput {
    fn validate(&self, creating: bool) -> Result<(), ApiError> {
        let mut v = Validator::new();
        if creating {
            v.required_str("nom", &self.nom)
                .required_str("email", &self.email)
                .required_str("telephone", &self.telephone)
                .required_str("adresse", &self.adresse)
                .required_str("ville", &self.ville)
                .required_str("pays", &self.pays);
        }
        v.length("nom", &self.nom, 1, 255)
            .email("email", &self.email)
            .range_decimal("note_evaluation", &self.note_evaluation, Decimal::ZERO, Decimal::from(5));
        v.finish()
    }

    fn changes(self) -> Changes {
        Changes::new()
            .set_opt("nom", self.nom)
            .set_opt("email", self.email)
            .set_opt("telephone", self.telephone)
            .set_opt("adresse", self.adresse)
            .set_opt("ville", self.ville)
            .set_opt("pays", self.pays)
            .set_opt("contact_principal", self.contact_principal)
            .set_opt("note_evaluation", self.note_evaluation)
            .set_opt("commentaires", self.commentaires)
    }
}

#[derive(Debug, Deserialize)]
pub struct RatingInput {
    pub note: Option<Decimal>,
    pub commentaires: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SupplierStats {
    pub total: i64,
    pub by_status: std::collections::BTreeMap<&'static str, i64>,
    pub average_rating: Option<Decimal>,
}

pub struct SupplierService {
    state: AppState,
}

impl SupplierService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    fn repo(&self) -> Repository<Supplier> {
        Repository::new(TABLE, &self.state.pool)
    }

    pub async fn list(&self, query: &SupplierQuery) -> Result<Page<Supplier>, ApiError> {
        let criteria = Criteria::new()
            .eq_opt("status", query.status.map(SupplierStatus::to_filter))
            .search(&["nom", "email", "ville"], query.search.as_deref())
            .build();
        let request = PageRequest::new(query.page, query.per_page);
        Ok(self.repo().page(criteria, LIST_ORDER, &request).await?)
    }

    pub async fn show(&self, id: i64) -> Result<Detail<Supplier>, ApiError> {
        let supplier = self.repo().find(id, None).await?;
        let status = supplier.status;
        Ok(Detail::new(supplier, &SUPPLIER, status))
    }

    pub async fn create(&self, input: SupplierInput, actor: &Actor) -> Result<Supplier, ApiError> {
        input.validate(true)?;
        let changes = input
            .changes()
            .set("status", SUPPLIER.initial)
            .set("created_by", actor.user_id);

        let mut tx = self.state.pool.begin().await?;
        let supplier: Supplier = changes.insert(TABLE, &mut *tx).await?;
        let event = NotificationEvent::submission(&SPEC.entity, supplier.id, actor);
        self.state.notifier.dispatch(&mut *tx, &event).await?;
        tx.commit().await?;

        tracing::info!(supplier_id = supplier.id, actor = actor.user_id, "supplier created");
        Ok(supplier)
    }

    pub async fn update(&self, id: i64, input: SupplierInput) -> Result<Supplier, ApiError> {
        input.validate(false)?;
        transition::update_guarded(&self.state, TABLE, &SUPPLIER, id, input.changes()).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        transition::delete_guarded(&self.state, TABLE, &SUPPLIER, id).await
    }

    pub async fn act(&self, id: i64, action: Action, input: ActionInput, actor: &Actor) -> Result<Supplier, ApiError> {
        let (extras, reason) = match action {
            Action::Validate => {
                actor.require(APPROVERS)?;
                let extras = Changes::new()
                    .set("validated_by", actor.user_id)
                    .set("validated_at", Utc::now());
                (extras, None)
            }
            Action::Reject => {
                actor.require(APPROVERS)?;
                let reason = input.require_reason()?;
                (Changes::new().set("rejection_reason", reason.clone()), Some(reason))
            }
            _ => {
                actor.require(FINANCE)?;
                (Changes::new(), None)
            }
        };
        transition::transition(&self.state, &SPEC, id, actor, action, extras, reason.as_deref()).await
    }

    pub async fn rate(&self, id: i64, input: RatingInput) -> Result<Supplier, ApiError> {
        let mut v = Validator::new();
        v.required("note", &input.note)
            .range_decimal("note", &input.note, Decimal::ONE, Decimal::from(5));
        v.finish()?;

        let changes = Changes::new()
            .set_opt("note_evaluation", input.note)
            .set_opt("commentaires", input.commentaires);
        Ok(changes.update(TABLE, id, &self.state.pool).await?)
    }

    pub async fn stats(&self) -> Result<SupplierStats, ApiError> {
        let by_status = status_counts::<SupplierStatus>(&self.state.pool, TABLE, None, None).await?;
        let average_rating: Option<Decimal> =
            sqlx::query_scalar("SELECT ROUND(AVG(note_evaluation), 2) FROM suppliers WHERE note_evaluation IS NOT NULL")
                .fetch_one(&self.state.pool)
                .await?;
        Ok(SupplierStats {
            total: by_status.values().sum(),
            by_status,
            average_rating,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_requires_contact_fields() {
        let input = SupplierInput {
            nom: Some("ACME".into()),
            email: Some("acme@example.com".into()),
            ..Default::default()
        };
        assert_eq!(input.validate(true).unwrap_err().status_code(), 422);
        assert!(input.validate(false).is_ok());
    }

    #[test]
    fn rating_outside_scale_is_rejected() {
        let input = SupplierInput {
            note_evaluation: Some(Decimal::from(6)),
            ..Default::default()
        };
        let err = input.validate(false).unwrap_err();
        assert_eq!(err.to_json()["errors"]["note_evaluation"], json!("Must be between 0 and 5"));
    }

    #[test]
    fn update_never_touches_status() {
        let changes = SupplierInput {
            ville: Some("Dakar".into()),
            ..Default::default()
        }
        .changes();
        assert!(!changes.contains("status"));
        assert!(changes.contains("ville"));
    }
}
