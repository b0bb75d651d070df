use serde::Deserialize;

use crate::auth::role::APPROVERS;
use crate::database::models::Client;
use crate::database::{Changes, Page, PageRequest, Repository};
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::notify::{EntityRef, NotificationEvent};
use crate::services::transition::{self, ActionInput, TransitionSpec};
use crate::services::{Criteria, Detail, LIST_ORDER};
use crate::state::AppState;
use crate::validation::Validator;
use crate::workflow::machines::{ClientStatus, CLIENT};
use crate::workflow::Action;

const TABLE: &str = "clients";

pub static SPEC: TransitionSpec<ClientStatus> = TransitionSpec {
    table: TABLE,
    entity: EntityRef {
        entity_type: "client",
        label: "Client",
        route: "/clients",
    },
    machine: &CLIENT,
    owner: "t.user_id",
};

#[derive(Debug, Default, Deserialize)]
pub struct ClientQuery {
    pub status: Option<ClientStatus>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClientInput {
    pub nom: Option<String>,
    pub prenom: Option<String>,
    pub email: Option<String>,
    pub telephone: Option<String>,
    pub adresse: Option<String>,
    pub nom_entreprise: Option<String>,
    pub situation_geographique: Option<String>,
}

impl ClientInput {
    fn validate(&self, creating: bool) -> Result<(), ApiError> {
        let mut v = Validator::new();
        if creating {
            v.required_str("nom", &self.nom).required_str("email", &self.email);
        }
        v.length("nom", &self.nom, 1, 255).email("email", &self.email);
        v.finish()
    }

    fn changes(self) -> Changes {
        Changes::new()
            .set_opt("nom", self.nom)
            .set_opt("prenom", self.prenom)
            .set_opt("email", self.email)
            .set_opt("telephone", self.telephone)
            .set_opt("adresse", self.adresse)
            .set_opt("nom_entreprise", self.nom_entreprise)
            .set_opt("situation_geographique", self.situation_geographique)
    }
}

pub struct ClientService {
    state: AppState,
}

impl ClientService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    fn repo(&self) -> Repository<Client> {
        Repository::new(TABLE, &self.state.pool)
    }

    async fn visible(&self, id: i64, actor: &Actor) -> Result<Client, ApiError> {
        let owner = actor.scoped_owner().map(|user_id| ("user_id", user_id));
        Ok(self.repo().find(id, owner).await?)
    }

    pub async fn list(&self, query: &ClientQuery, actor: &Actor) -> Result<Page<Client>, ApiError> {
        let criteria = Criteria::new()
            .eq_opt("status", query.status.map(ClientStatus::to_filter))
            .search(&["nom", "prenom", "email", "nom_entreprise"], query.search.as_deref())
            .owned_by("user_id", actor.scoped_owner())
            .build();
        let request = PageRequest::new(query.page, query.per_page);
        Ok(self.repo().page(criteria, LIST_ORDER, &request).await?)
    }

    pub async fn show(&self, id: i64, actor: &Actor) -> Result<Detail<Client>, ApiError> {
        let client = self.visible(id, actor).await?;
        let status = client.status;
        Ok(Detail::new(client, &CLIENT, status))
    }

    pub async fn create(&self, input: ClientInput, actor: &Actor) -> Result<Client, ApiError> {
        input.validate(true)?;
        let changes = input
            .changes()
            .set("status", CLIENT.initial)
            .set("user_id", actor.user_id);

        let mut tx = self.state.pool.begin().await?;
        let client: Client = changes.insert(TABLE, &mut *tx).await?;
        let event = NotificationEvent::submission(&SPEC.entity, client.id, actor);
        self.state.notifier.dispatch(&mut *tx, &event).await?;
        tx.commit().await?;

        tracing::info!(client_id = client.id, actor = actor.user_id, "client created");
        Ok(client)
    }

    pub async fn update(&self, id: i64, input: ClientInput, actor: &Actor) -> Result<Client, ApiError> {
        input.validate(false)?;
        self.visible(id, actor).await?;
        transition::update_guarded(&self.state, TABLE, &CLIENT, id, input.changes()).await
    }

    pub async fn delete(&self, id: i64, actor: &Actor) -> Result<(), ApiError> {
        self.visible(id, actor).await?;
        transition::delete_guarded(&self.state, TABLE, &CLIENT, id).await
    }

    /// Both client transitions belong to approvers
    pub async fn act(&self, id: i64, action: Action, input: ActionInput, actor: &Actor) -> Result<Client, ApiError> {
        actor.require(APPROVERS)?;
        let (extras, reason) = match action {
            Action::Reject => {
                let reason = input.require_reason()?;
                (Changes::new().set("rejection_reason", reason.clone()), Some(reason))
            }
            _ => (Changes::new(), None),
        };
        transition::transition(&self.state, &SPEC, id, actor, action, extras, reason.as_deref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_requires_name_and_email() {
        let err = ClientInput::default().validate(true).unwrap_err();
        let errors = err.to_json()["errors"].clone();
        assert!(errors.get("nom").is_some());
        assert!(errors.get("email").is_some());
    }

    #[test]
    fn partial_update_only_sets_given_fields() {
        let changes = ClientInput {
            telephone: Some("+221 77 000 00 00".into()),
            ..Default::default()
        }
        .changes();
        assert!(changes.contains("telephone"));
        assert!(!changes.contains("nom"));
    }
}
