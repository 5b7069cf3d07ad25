//! JWT issuance/validation, Argon2 password hashing, and the request
//! extractors that gate handlers on an authenticated (or admin) user.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header, request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::user::UserRole;
use crate::errors::ServiceError;

/// JWT claims carried by every access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub name: String,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub token_ttl_hours: i64,
}

impl AuthConfig {
    pub fn new(jwt_secret: String, jwt_issuer: String, token_ttl_hours: i64) -> Self {
        Self {
            jwt_secret,
            jwt_issuer,
            token_ttl_hours,
        }
    }
}

/// Hashes a password with Argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::InternalError(format!("password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, ServiceError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| ServiceError::InternalError(format!("stored hash is malformed: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Issues a signed access token for the given user.
pub fn issue_token(
    config: &AuthConfig,
    user_id: Uuid,
    name: &str,
    role: UserRole,
) -> Result<String, ServiceError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        name: name.to_string(),
        role,
        iat: now.timestamp(),
        exp: (now + Duration::hours(config.token_ttl_hours)).timestamp(),
        iss: config.jwt_issuer.clone(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| ServiceError::InternalError(format!("token signing failed: {}", e)))
}

/// Validates signature, expiry and issuer, returning the decoded claims.
pub fn decode_token(config: &AuthConfig, token: &str) -> Result<Claims, ServiceError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.jwt_issuer]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| ServiceError::Unauthorized("invalid or expired token".into()))
}

/// Authenticated user extracted from the `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub name: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden("admin access required".into()))
        }
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, ServiceError> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| ServiceError::Unauthorized("missing bearer token".into()))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AuthConfig: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AuthConfig::from_ref(state);
        let claims = decode_token(&config, bearer_token(parts)?)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ServiceError::Unauthorized("malformed subject claim".into()))?;

        Ok(AuthUser {
            user_id,
            name: claims.name,
            role: claims.role,
        })
    }
}

/// Like [`AuthUser`] but yields `None` instead of rejecting when the
/// request carries no credentials. Used where guest checkout is allowed.
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalAuthUser
where
    S: Send + Sync,
    AuthConfig: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if parts.headers.get(header::AUTHORIZATION).is_none() {
            return Ok(OptionalAuthUser(None));
        }
        AuthUser::from_request_parts(parts, state)
            .await
            .map(|user| OptionalAuthUser(Some(user)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn test_config() -> AuthConfig {
        AuthConfig::new("unit-test-secret".into(), "musclezone".into(), 24)
    }

    #[test]
    fn token_round_trips() {
        let config = test_config();
        let user_id = Uuid::new_v4();
        let token = issue_token(&config, user_id, "Asha", UserRole::Admin).unwrap();

        let claims = decode_token(&config, &token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.name, "Asha");
        assert_eq!(claims.role, UserRole::Admin);
        assert_eq!(claims.iss, "musclezone");
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let config = test_config();
        let other = AuthConfig::new("different-secret".into(), "musclezone".into(), 24);
        let token = issue_token(&other, Uuid::new_v4(), "Asha", UserRole::User).unwrap();

        assert_matches!(
            decode_token(&config, &token),
            Err(ServiceError::Unauthorized(_))
        );
    }

    #[test]
    fn token_from_other_issuer_is_rejected() {
        let config = test_config();
        let other = AuthConfig::new("unit-test-secret".into(), "somewhere-else".into(), 24);
        let token = issue_token(&other, Uuid::new_v4(), "Asha", UserRole::User).unwrap();

        assert_matches!(
            decode_token(&config, &token),
            Err(ServiceError::Unauthorized(_))
        );
    }

    #[test]
    fn password_hash_verifies_and_rejects() {
        let hash = hash_password("s3cret-pass").unwrap();
        assert!(verify_password("s3cret-pass", &hash).unwrap());
        assert!(!verify_password("wrong-pass", &hash).unwrap());
    }

    #[test]
    fn require_admin_gates_regular_users() {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            name: "Asha".into(),
            role: UserRole::User,
        };
        assert_matches!(user.require_admin(), Err(ServiceError::Forbidden(_)));
    }
}
