//! Access control gate: Bearer-token verification producing an [`Actor`].
//!
//! Credential issuance lives in a separate service; this side only verifies the
//! HS256 token it issued and attaches the caller's identity and role. A missing
//! or invalid token short-circuits before any handler logic runs.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::ApiError, AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Supplier listing products and fulfilling orders.
    Admin,
    /// Buyer.
    Client,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: i64,
}

/// Authenticated caller, attached to every protected request.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        match self.role {
            Role::Admin => Ok(()),
            Role::Client => Err(ApiError::Forbidden("Access denied. Admin role required")),
        }
    }

    pub fn require_client(&self) -> Result<(), ApiError> {
        match self.role {
            Role::Client => Ok(()),
            Role::Admin => Err(ApiError::Forbidden("Access denied. Client role required")),
        }
    }
}

pub fn verify_token(token: &str, secret: &str) -> Result<Actor, ApiError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthenticated("Invalid or expired token"))?;
    Ok(Actor { id: data.claims.sub, role: data.claims.role })
}

#[async_trait]
impl FromRequestParts<AppState> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthenticated("No token provided"))?;
        verify_token(token, &state.config.jwt_secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn issue(role: Role, secret: &str, exp: i64) -> String {
        let claims = Claims { sub: Uuid::new_v4(), role, exp };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_verify_roundtrip() {
        let exp = chrono::Utc::now().timestamp() + 600;
        let token = issue(Role::Client, "secret", exp);
        let actor = verify_token(&token, "secret").unwrap();
        assert_eq!(actor.role, Role::Client);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let exp = chrono::Utc::now().timestamp() + 600;
        let token = issue(Role::Admin, "secret", exp);
        assert!(matches!(verify_token(&token, "other"), Err(ApiError::Unauthenticated(_))));
    }

    #[test]
    fn test_expired_rejected() {
        let token = issue(Role::Admin, "secret", chrono::Utc::now().timestamp() - 600);
        assert!(matches!(verify_token(&token, "secret"), Err(ApiError::Unauthenticated(_))));
    }

    #[test]
    fn test_role_gates() {
        let admin = Actor { id: Uuid::new_v4(), role: Role::Admin };
        let client = Actor { id: Uuid::new_v4(), role: Role::Client };
        assert!(admin.require_admin().is_ok());
        assert!(client.require_admin().is_err());
        assert!(client.require_client().is_ok());
        assert!(admin.require_client().is_err());
    }
}
