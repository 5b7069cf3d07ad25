use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::auth::AuthUser;
use crate::catalog::parse_bulk_payload;
use crate::errors::ServiceError;
use crate::handlers::common::{created_response, no_content_response, success_response};
use crate::services::catalog::{CreateProductRequest, ProductFilter, UpdateProductRequest};
use crate::AppState;

/// List products with their variants
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(
        ("category" = Option<String>, Query, description = "Filter by category slug"),
        ("bestseller" = Option<bool>, Query, description = "Filter by bestseller flag"),
        ("search" = Option<String>, Query, description = "Substring match on name and brand"),
    ),
    responses(
        (status = 200, description = "Products with variants in position order"),
    )
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    let products = state.services.catalog.list_products(filter).await?;
    Ok(success_response(products))
}

/// Fetch one product with variants
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = String, Path, description = "Product id (group key)")),
    responses(
        (status = 200, description = "Product with variants"),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.catalog.get_product(&id).await?;
    Ok(success_response(product))
}

/// Create a product
#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created"),
        (status = 403, description = "Admin only", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product with this brand and name exists", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_product(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;
    let product = state.services.catalog.create_product(request).await?;
    Ok(created_response(product))
}

/// Update a product
#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    params(("id" = String, Path, description = "Product id")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated"),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_product(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateProductRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;
    let product = state.services.catalog.update_product(&id, request).await?;
    Ok(success_response(product))
}

/// Delete a product and its variants
#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_product(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;
    state.services.catalog.delete_product(&id).await?;
    Ok(no_content_response())
}

/// Replace the whole catalog from a bulk payload
///
/// The body is plain text: a JSON array of categories, a blank line, then a
/// JSON array of raw listings. Listings are grouped into products with
/// variants before being written.
#[utoipa::path(
    post,
    path = "/api/v1/products/bulk",
    request_body = String,
    responses(
        (status = 200, description = "Catalog replaced", body = crate::services::catalog::ReloadSummary),
        (status = 403, description = "Admin only", body = crate::errors::ErrorResponse),
        (status = 422, description = "Malformed payload", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn bulk_load(
    State(state): State<AppState>,
    auth_user: AuthUser,
    body: String,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;
    let (categories, listings) = parse_bulk_payload(&body)?;
    let summary = state
        .services
        .catalog
        .replace_catalog(&categories, &listings)
        .await?;
    Ok(success_response(summary))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/bulk", post(bulk_load))
        .route(
            "/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
}
