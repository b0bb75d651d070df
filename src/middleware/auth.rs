use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use crate::auth::{decode_jwt, Claims, Role};
use crate::error::ApiError;

/// Authenticated caller, decoded from the bearer token on every protected route
#[derive(Clone, Debug)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
    pub name: String,
}

impl From<Claims> for Actor {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            role: claims.role,
            name: claims.name,
        }
    }
}

impl Actor {
    /// 403 unless the caller's role belongs to `group`
    pub fn require(&self, group: &[Role]) -> Result<(), ApiError> {
        if group.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "Role {} is not allowed to perform this operation",
                self.role
            )))
        }
    }

    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }

    /// Commercial users only see the sales documents they created
    pub fn scoped_owner(&self) -> Option<i64> {
        self.is(Role::Commercial).then_some(self.user_id)
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_jwt_from_headers(&parts.headers).map_err(ApiError::unauthorized)?;
        let claims = decode_jwt(&token).map_err(|e| ApiError::unauthorized(e.to_string()))?;
        Ok(Actor::from(claims))
    }
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        Some(_) => Err("Empty JWT token".to_string()),
        None => Err("Authorization header must use Bearer token format".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(extract_jwt_from_headers(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(extract_jwt_from_headers(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(extract_jwt_from_headers(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_jwt_from_headers(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn role_checks() {
        let actor = Actor {
            user_id: 9,
            role: Role::Commercial,
            name: "Moussa".into(),
        };
        assert!(actor.require(crate::auth::role::SALES).is_ok());
        assert_eq!(actor.require(crate::auth::role::HR).unwrap_err().status_code(), 403);
        assert_eq!(actor.scoped_owner(), Some(9));

        let patron = Actor {
            role: Role::Patron,
            ..actor
        };
        assert_eq!(patron.scoped_owner(), None);
    }
}
