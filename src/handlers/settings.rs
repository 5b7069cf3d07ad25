use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::handlers::common::{created_response, no_content_response, success_response};
use crate::services::settings::{
    CreateBannerRequest, UpdateAnnouncementRequest, UpdateBannerRequest,
};
use crate::AppState;

/// List hero banners
#[utoipa::path(
    get,
    path = "/api/v1/settings/hero",
    responses(
        (status = 200, description = "Banners in position order"),
    )
)]
pub async fn list_banners(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let banners = state.services.settings.list_banners().await?;
    Ok(success_response(banners))
}

/// Add a hero banner
#[utoipa::path(
    post,
    path = "/api/v1/settings/hero",
    request_body = CreateBannerRequest,
    responses(
        (status = 201, description = "Banner created"),
        (status = 403, description = "Admin only", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_banner(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreateBannerRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;
    let banner = state.services.settings.create_banner(request).await?;
    Ok(created_response(banner))
}

/// Update a hero banner
#[utoipa::path(
    put,
    path = "/api/v1/settings/hero/{id}",
    params(("id" = Uuid, Path, description = "Banner id")),
    request_body = UpdateBannerRequest,
    responses(
        (status = 200, description = "Banner updated"),
        (status = 404, description = "Unknown banner", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_banner(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateBannerRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;
    let banner = state.services.settings.update_banner(id, request).await?;
    Ok(success_response(banner))
}

/// Remove a hero banner
#[utoipa::path(
    delete,
    path = "/api/v1/settings/hero/{id}",
    params(("id" = Uuid, Path, description = "Banner id")),
    responses(
        (status = 204, description = "Banner deleted"),
        (status = 404, description = "Unknown banner", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_banner(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;
    state.services.settings.delete_banner(id).await?;
    Ok(no_content_response())
}

/// Announcement bar text
#[utoipa::path(
    get,
    path = "/api/v1/settings/announcement",
    responses(
        (status = 200, description = "Current announcement, created with default text on first read"),
    )
)]
pub async fn get_announcement(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let announcement = state.services.settings.get_announcement().await?;
    Ok(success_response(announcement))
}

/// Update the announcement bar
#[utoipa::path(
    put,
    path = "/api/v1/settings/announcement",
    request_body = UpdateAnnouncementRequest,
    responses(
        (status = 200, description = "Announcement updated"),
        (status = 403, description = "Admin only", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_announcement(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<UpdateAnnouncementRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;
    let announcement = state.services.settings.update_announcement(request).await?;
    Ok(success_response(announcement))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/settings/hero", get(list_banners).post(create_banner))
        .route(
            "/settings/hero/:id",
            put(update_banner).delete(delete_banner),
        )
        .route(
            "/settings/announcement",
            get(get_announcement).put(update_announcement),
        )
}
