use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::handlers::common::{no_content_response, success_response};
use crate::services::catalog::UpsertCategoryRequest;
use crate::AppState;

/// List categories
#[utoipa::path(
    get,
    path = "/api/v1/categories",
    responses(
        (status = 200, description = "All categories, alphabetical"),
    )
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let categories = state.services.catalog.list_categories().await?;
    Ok(success_response(categories))
}

/// Create or update a category
#[utoipa::path(
    post,
    path = "/api/v1/categories",
    request_body = UpsertCategoryRequest,
    responses(
        (status = 200, description = "Category written"),
        (status = 403, description = "Admin only", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn upsert_category(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<UpsertCategoryRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;
    let category = state.services.catalog.upsert_category(request).await?;
    Ok(success_response(category))
}

/// Delete a category
#[utoipa::path(
    delete,
    path = "/api/v1/categories/{id}",
    params(("id" = String, Path, description = "Category slug")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "Unknown category", body = crate::errors::ErrorResponse),
        (status = 409, description = "Category still has products", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_category(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;
    state.services.catalog.delete_category(&id).await?;
    Ok(no_content_response())
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(upsert_category))
        .route("/categories/:id", delete(delete_category))
}
