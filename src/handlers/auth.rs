use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::handlers::common::{created_response, success_response};
use crate::services::users::{LoginRequest, RegisterRequest};
use crate::AppState;

/// Register a new account
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created and signed in"),
        (status = 409, description = "Phone or email already registered", body = crate::errors::ErrorResponse),
        (status = 422, description = "Invalid registration data", body = crate::errors::ErrorResponse),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.services.users.register(request).await?;
    Ok(created_response(response))
}

/// Log in with phone and password
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in"),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.services.users.login(request).await?;
    Ok(success_response(response))
}

/// Current user's profile
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Profile for the authenticated user"),
        (status = 401, description = "Missing or invalid token", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let profile = state.services.users.get_profile(auth_user.user_id).await?;
    Ok(success_response(profile))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
}
