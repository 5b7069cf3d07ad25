//! Account service: registration, login and profile lookup.

use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{self, AuthConfig};
use crate::entities::user::{
    self, ActiveModel as UserActiveModel, Entity as UserEntity, Model as UserModel, UserRole,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 10, message = "Phone must have at least 10 digits"))]
    pub phone: String,
    /// Optional; phone-first signups get a placeholder address.
    #[validate(email(message = "Email must be valid"))]
    pub email: Option<String>,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: UserRole,
}

impl From<UserModel> for UserResponse {
    fn from(model: UserModel) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            phone: model.phone,
            role: model.role,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    auth_config: AuthConfig,
    event_sender: Option<Arc<EventSender>>,
}

impl UserService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        auth_config: AuthConfig,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            auth_config,
            event_sender,
        }
    }

    /// Registers a phone-first account and signs the caller in.
    #[instrument(skip(self, request), fields(phone = %request.phone))]
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, ServiceError> {
        request.validate()?;

        let email = request
            .email
            .clone()
            .unwrap_or_else(|| format!("{}@musclezone.com", request.phone));

        let taken = UserEntity::find()
            .filter(
                Condition::any()
                    .add(user::Column::Phone.eq(request.phone.clone()))
                    .add(user::Column::Email.eq(email.clone())),
            )
            .one(&*self.db)
            .await?;
        if taken.is_some() {
            return Err(ServiceError::Conflict(
                "an account with this phone or email already exists".into(),
            ));
        }

        let user = UserActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.clone()),
            email: Set(email),
            phone: Set(request.phone.clone()),
            password_hash: Set(auth::hash_password(&request.password)?),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(user_id = %user.id, "user registered");
        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::UserRegistered(user.id)).await;
        }

        self.sign_in_response(user)
    }

    /// Verifies credentials against the stored Argon2 hash. Unknown phone
    /// and wrong password return the same error.
    #[instrument(skip(self, request), fields(phone = %request.phone))]
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, ServiceError> {
        request.validate()?;

        let user = UserEntity::find()
            .filter(user::Column::Phone.eq(request.phone.clone()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("invalid phone or password".into()))?;

        if !auth::verify_password(&request.password, &user.password_hash)? {
            return Err(ServiceError::Unauthorized("invalid phone or password".into()));
        }

        info!(user_id = %user.id, "user logged in");
        self.sign_in_response(user)
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<UserResponse, ServiceError> {
        let user = UserEntity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {} not found", user_id)))?;
        Ok(user.into())
    }

    fn sign_in_response(&self, user: UserModel) -> Result<AuthResponse, ServiceError> {
        let token = auth::issue_token(&self.auth_config, user.id, &user.name, user.role)?;
        Ok(AuthResponse {
            token,
            user: user.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_accepts_missing_email() {
        let json = r#"{"name": "Asha", "phone": "9876543210", "password": "secret1"}"#;
        let request: RegisterRequest = serde_json::from_str(json).unwrap();
        assert!(request.validate().is_ok());
        assert!(request.email.is_none());
    }

    #[test]
    fn short_password_fails_validation() {
        let request = RegisterRequest {
            name: "Asha".into(),
            phone: "9876543210".into(),
            email: None,
            password: "abc".into(),
        };
        assert!(request.validate().is_err());
    }
}
