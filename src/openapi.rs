use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities;
use crate::errors::ErrorResponse;
use crate::handlers;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "MuscleZone API",
        description = "Supplement storefront API: normalized catalog with size/flavor variants, server-priced checkout, and admin management of orders and storefront settings."
    ),
    paths(
        handlers::health::health_check,
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::me,
        handlers::categories::list_categories,
        handlers::categories::upsert_category,
        handlers::categories::delete_category,
        handlers::products::list_products,
        handlers::products::get_product,
        handlers::products::create_product,
        handlers::products::update_product,
        handlers::products::delete_product,
        handlers::products::bulk_load,
        handlers::orders::create_order,
        handlers::orders::list_orders,
        handlers::orders::my_orders,
        handlers::orders::get_order,
        handlers::orders::update_order,
        handlers::orders::delete_order,
        handlers::settings::list_banners,
        handlers::settings::create_banner,
        handlers::settings::update_banner,
        handlers::settings::delete_banner,
        handlers::settings::get_announcement,
        handlers::settings::update_announcement,
    ),
    components(schemas(
        ErrorResponse,
        entities::order::OrderStatus,
        entities::order::PaymentStatus,
        entities::product::ProductStatus,
        entities::user::UserRole,
        services::orders::CartLine,
        services::orders::CreateOrderRequest,
        services::orders::UpdateOrderStatusRequest,
        services::catalog::UpsertCategoryRequest,
        services::catalog::VariantInput,
        services::catalog::CreateProductRequest,
        services::catalog::UpdateProductRequest,
        services::catalog::ReloadSummary,
        services::settings::CreateBannerRequest,
        services::settings::UpdateBannerRequest,
        services::settings::UpdateAnnouncementRequest,
        services::users::RegisterRequest,
        services::users::LoginRequest,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "musclezone-api", description = "Supplement storefront and back-office endpoints")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Swagger UI router, served at `/docs`.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_builds() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("/api/v1/orders"));
        assert!(json.contains("/api/v1/products/bulk"));
    }
}
