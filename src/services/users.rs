//! Staff directory backing role checks and notification fan-out.

use serde::Deserialize;

use crate::auth::Role;
use crate::database::models::User;
use crate::database::{Changes, Page, PageRequest, Repository};
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::services::Criteria;
use crate::state::AppState;
use crate::validation::Validator;

const TABLE: &str = "users";

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

impl UserInput {
    fn validate(&self) -> Result<(), ApiError> {
        let mut v = Validator::new();
        v.required_str("name", &self.name)
            .required_str("email", &self.email)
            .required("role", &self.role)
            .email("email", &self.email);
        v.finish()
    }
}

pub struct UserService {
    state: AppState,
}

impl UserService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    fn repo(&self) -> Repository<User> {
        Repository::new(TABLE, &self.state.pool)
    }

    pub async fn list(&self, query: &UserQuery) -> Result<Page<User>, ApiError> {
        let criteria = Criteria::new()
            .eq_opt("role", query.role.map(Role::code))
            .eq_opt("is_active", query.is_active)
            .search(&["name", "email"], query.search.as_deref())
            .build();
        let request = PageRequest::new(query.page, query.per_page);
        Ok(self.repo().page(criteria, "name asc, id asc", &request).await?)
    }

    pub async fn show(&self, id: i64) -> Result<User, ApiError> {
        Ok(self.repo().find(id, None).await?)
    }

    pub async fn create(&self, input: UserInput, actor: &Actor) -> Result<User, ApiError> {
        input.validate()?;
        let user: User = Changes::new()
            .set_opt("name", input.name.map(|n| n.trim().to_string()))
            .set_opt("email", input.email.map(|e| e.trim().to_lowercase()))
            .set_opt("role", input.role)
            .insert(TABLE, &self.state.pool)
            .await?;
        tracing::info!(user_id = user.id, role = %user.role, created_by = actor.user_id, "user created");
        Ok(user)
    }

    pub async fn activate(&self, id: i64) -> Result<User, ApiError> {
        self.set_active(id, true).await
    }

    /// Inactive users stop receiving role notifications
    pub async fn deactivate(&self, id: i64, actor: &Actor) -> Result<User, ApiError> {
        if id == actor.user_id {
            return Err(ApiError::conflict("You cannot deactivate your own account"));
        }
        self.set_active(id, false).await
    }

    async fn set_active(&self, id: i64, active: bool) -> Result<User, ApiError> {
        let user: User = Changes::new()
            .set("is_active", active)
            .update(TABLE, id, &self.state.pool)
            .await?;
        tracing::info!(user_id = id, active, "user activation changed");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_is_read_from_its_code() {
        let input: UserInput = serde_json::from_value(json!({
            "name": "Fatou Sarr",
            "email": "fatou@example.sn",
            "role": 4
        }))
        .unwrap();
        assert_eq!(input.role, Some(Role::Rh));
        assert!(input.validate().is_ok());
    }

    #[test]
    fn unknown_role_codes_fail_to_parse() {
        let result = serde_json::from_value::<UserInput>(json!({"name": "X", "email": "x@example.sn", "role": 9}));
        assert!(result.is_err());
    }
}
