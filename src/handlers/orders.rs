use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::auth::{AuthUser, OptionalAuthUser};
use crate::errors::ServiceError;
use crate::handlers::common::{
    created_response, no_content_response, success_response, PaginationParams,
};
use crate::services::orders::{CreateOrderRequest, UpdateOrderStatusRequest};
use crate::AppState;

/// Place an order
///
/// Line amounts are always priced from stored variant prices; any amount a
/// client sends alongside a line is dropped and never read.
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created with server-computed totals"),
        (status = 404, description = "Cart references an unknown variant", body = crate::errors::ErrorResponse),
        (status = 422, description = "Invalid cart", body = crate::errors::ErrorResponse),
    )
)]
pub async fn create_order(
    State(state): State<AppState>,
    OptionalAuthUser(auth_user): OptionalAuthUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let user_id = auth_user.map(|user| user.user_id);
    let detail = state.services.orders.create_order(user_id, request).await?;
    Ok(created_response(detail))
}

/// List all orders
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(PaginationParams),
    responses(
        (status = 200, description = "Newest-first page of orders"),
        (status = 403, description = "Admin only", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_orders(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;
    let page = state
        .services
        .orders
        .list_orders(pagination.page, pagination.per_page)
        .await?;
    Ok(success_response(page))
}

/// Current user's orders
#[utoipa::path(
    get,
    path = "/api/v1/orders/mine",
    responses(
        (status = 200, description = "Orders for the authenticated user, newest first"),
        (status = 401, description = "Missing or invalid token", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn my_orders(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state
        .services
        .orders
        .list_user_orders(auth_user.user_id)
        .await?;
    Ok(success_response(orders))
}

/// Fetch one order with its items
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with items"),
        (status = 403, description = "Not the order's owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let detail = state.services.orders.get_order(id).await?;
    if !auth_user.is_admin() && detail.order.user_id != Some(auth_user.user_id) {
        return Err(ServiceError::Forbidden(
            "orders are visible to their owner or an admin".into(),
        ));
    }
    Ok(success_response(detail))
}

/// Update order status, payment status or tracking id
#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Order updated"),
        (status = 403, description = "Admin only", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;
    let order = state.services.orders.update_order_status(id, request).await?;
    Ok(success_response(order))
}

/// Delete an order
#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 403, description = "Admin only", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;
    state.services.orders.delete_order(id).await?;
    Ok(no_content_response())
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/mine", get(my_orders))
        .route(
            "/orders/:id",
            get(get_order).patch(update_order).delete(delete_order),
        )
}
