//! End-to-end tests for the catalog pipeline and server-priced checkout,
//! running against an in-memory SQLite database.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use rust_decimal_macros::dec;
use sea_orm::DatabaseConnection;
use serde_json::json;
use tower::ServiceExt;

use musclezone_api as api;

use api::services::orders::{CartLine, CreateOrderRequest};
use api::services::{CatalogService, OrderService};

const BULK_PAYLOAD: &str = r#"[
  {"id": "protein", "name": "Protein", "imageUrl": "/cat-protein.png"},
  {"id": "gainers", "name": "Mass Gainers"}
]

[
  {"brand": "ON", "name": "Gold Standard Whey 1KG", "categoryId": "protein",
   "quantity": "1KG", "flavors": ["Chocolate"], "price": 500, "stock": 12},
  {"brand": "ON", "name": "Gold Standard Whey 2KG", "categoryId": "protein",
   "quantity": "2KG", "flavors": ["Chocolate"], "price": 1000, "stock": 6},
  {"brand": "MuscleBlaze", "name": "Super Gainer 3KG", "categoryId": "gainers",
   "quantity": "3KG", "price": 2200, "stock": 4}
]"#;

async fn setup_db() -> Arc<DatabaseConnection> {
    let db = api::db::establish_connection("sqlite::memory:")
        .await
        .expect("sqlite connection");
    api::db::run_migrations(&db).await.expect("migrations");
    Arc::new(db)
}

async fn seed_catalog(db: &Arc<DatabaseConnection>) -> CatalogService {
    let catalog = CatalogService::new(db.clone(), None);
    let (categories, listings) =
        api::catalog::parse_bulk_payload(BULK_PAYLOAD).expect("payload parses");
    catalog
        .replace_catalog(&categories, &listings)
        .await
        .expect("catalog reload");
    catalog
}

fn order_request(items: Vec<CartLine>) -> CreateOrderRequest {
    CreateOrderRequest {
        name: "Asha".into(),
        phone: "9876543210".into(),
        address: "12 Gym Street, Pune".into(),
        payment_method: "COD".into(),
        items,
    }
}

fn cart_line(product_id: &str, variant_id: Option<&str>, quantity: i32) -> CartLine {
    serde_json::from_value(json!({
        "productId": product_id,
        "variantId": variant_id,
        "quantity": quantity,
    }))
    .expect("cart line")
}

#[tokio::test]
async fn bulk_load_groups_size_listings_into_one_product() {
    let db = setup_db().await;
    let catalog = seed_catalog(&db).await;

    let products = catalog
        .list_products(Default::default())
        .await
        .expect("list products");
    assert_eq!(products.len(), 2);

    let whey = catalog
        .get_product("on_gold_standard_whey")
        .await
        .expect("grouped whey product");
    assert_eq!(whey.product.name, "Gold Standard Whey");
    assert_eq!(whey.product.brand, "ON");
    assert_eq!(whey.variants.len(), 2);
    assert_eq!(whey.variants[0].quantity_label, "1KG");
    assert_eq!(whey.variants[0].price, dec!(500));
    assert_eq!(whey.variants[1].quantity_label, "2KG");
    assert_eq!(whey.variants[1].price, dec!(1000));
    // Defaults applied to listings without explicit pricing fields.
    assert_eq!(whey.variants[0].mrp, dec!(625));
    assert_eq!(whey.variants[0].discount, dec!(20));
}

#[tokio::test]
async fn reloading_the_same_payload_lands_on_the_same_ids() {
    let db = setup_db().await;
    let catalog = seed_catalog(&db).await;

    let before = catalog.get_product("on_gold_standard_whey").await.unwrap();

    let (categories, listings) = api::catalog::parse_bulk_payload(BULK_PAYLOAD).unwrap();
    catalog
        .replace_catalog(&categories, &listings)
        .await
        .expect("second reload");

    let after = catalog.get_product("on_gold_standard_whey").await.unwrap();
    assert_eq!(before.product.id, after.product.id);
    let before_ids: Vec<_> = before.variants.iter().map(|v| v.id.clone()).collect();
    let after_ids: Vec<_> = after.variants.iter().map(|v| v.id.clone()).collect();
    assert_eq!(before_ids, after_ids);
}

#[tokio::test]
async fn order_totals_are_computed_from_stored_prices() {
    let db = setup_db().await;
    seed_catalog(&db).await;

    let orders = OrderService::new(db.clone(), None, dec!(100));
    let detail = orders
        .create_order(
            None,
            order_request(vec![
                cart_line("on_gold_standard_whey", Some("on_gold_standard_whey_var_0"), 2),
                cart_line("on_gold_standard_whey", Some("on_gold_standard_whey_var_1"), 1),
            ]),
        )
        .await
        .expect("order created");

    // 2 x 500 + 1 x 1000 + 100 shipping.
    assert_eq!(detail.order.total_amount, dec!(2100));
    assert_eq!(detail.order.shipping_fee, dec!(100));
    assert_eq!(detail.items.len(), 2);
    assert_eq!(detail.items[0].price, dec!(500));
    assert_eq!(detail.items[1].price, dec!(1000));
}

#[tokio::test]
async fn unknown_variant_writes_nothing() {
    let db = setup_db().await;
    seed_catalog(&db).await;

    let orders = OrderService::new(db.clone(), None, dec!(100));
    let err = orders
        .create_order(
            None,
            order_request(vec![
                cart_line("on_gold_standard_whey", Some("on_gold_standard_whey_var_0"), 1),
                cart_line("on_gold_standard_whey", Some("no_such_variant"), 1),
            ]),
        )
        .await
        .expect_err("order must fail");
    assert!(matches!(err, api::errors::ServiceError::NotFound(_)));

    let page = orders.list_orders(1, 10).await.expect("list orders");
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn legacy_cart_line_uses_first_variant_price() {
    let db = setup_db().await;
    seed_catalog(&db).await;

    let orders = OrderService::new(db.clone(), None, dec!(100));
    let detail = orders
        .create_order(
            None,
            order_request(vec![cart_line("muscleblaze_super_gainer", None, 1)]),
        )
        .await
        .expect("legacy order created");

    assert_eq!(detail.order.total_amount, dec!(2300));
    assert_eq!(
        detail.items[0].variant_id.as_deref(),
        Some("muscleblaze_super_gainer_var_0")
    );
}

#[tokio::test]
async fn tampered_cart_prices_are_ignored_over_http() {
    let db = setup_db().await;
    seed_catalog(&db).await;

    let config: api::config::AppConfig = serde_json::from_value(json!({
        "database_url": "sqlite::memory:",
        "jwt_secret": "integration-test-secret",
    }))
    .expect("test config");
    let (event_sender, _event_rx) = api::events::event_channel(16);
    let state = api::AppState::new(db, config, event_sender);
    let app = api::app_router(state);

    // Storefront clients send a price per line; a tampered amount must not
    // change the server-computed total.
    let body = json!({
        "name": "Asha",
        "phone": "9876543210",
        "address": "12 Gym Street, Pune",
        "paymentMethod": "COD",
        "items": [
            {
                "productId": "on_gold_standard_whey",
                "variantId": "on_gold_standard_whey_var_0",
                "quantity": 2,
                "price": 1
            },
            {
                "productId": "on_gold_standard_whey",
                "variantId": "on_gold_standard_whey_var_1",
                "quantity": 1,
                "price": 1
            }
        ]
    });

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/orders")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::CREATED);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body");
    let detail: serde_json::Value = serde_json::from_slice(&bytes).expect("order json");

    // 2 x 500 + 1 x 1000 + 100 shipping, regardless of the injected prices.
    let total: rust_decimal::Decimal =
        serde_json::from_value(detail["total_amount"].clone()).expect("decimal total");
    assert_eq!(total, dec!(2100));

    let item_prices: Vec<rust_decimal::Decimal> = detail["items"]
        .as_array()
        .expect("order items")
        .iter()
        .map(|item| serde_json::from_value(item["price"].clone()).expect("decimal price"))
        .collect();
    assert_eq!(item_prices, vec![dec!(500), dec!(1000)]);
}
