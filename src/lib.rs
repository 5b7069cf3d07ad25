//! MuscleZone API: supplement storefront backend.
//!
//! The catalog side normalizes flat raw listings into products with
//! size/flavor variants; the order side prices every checkout from stored
//! variant prices, never from client-supplied amounts.

use std::sync::Arc;

use axum::extract::FromRef;
use axum::Router;
use sea_orm::DatabaseConnection;

pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;

use auth::AuthConfig;
use config::AppConfig;
use events::EventSender;
use services::{CatalogService, OrderService, SettingsService, UserService};

/// Service instances shared by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: CatalogService,
    pub orders: OrderService,
    pub settings: SettingsService,
    pub users: UserService,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: &AppConfig,
        auth_config: AuthConfig,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            catalog: CatalogService::new(db.clone(), event_sender.clone()),
            orders: OrderService::new(db.clone(), event_sender.clone(), config.shipping_fee),
            settings: SettingsService::new(db.clone()),
            users: UserService::new(db, auth_config, event_sender),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: AppConfig,
    pub auth_config: AuthConfig,
    pub services: AppServices,
    pub event_sender: EventSender,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: AppConfig,
        event_sender: EventSender,
    ) -> Self {
        let auth_config = AuthConfig::new(
            config.jwt_secret.clone(),
            config.jwt_issuer.clone(),
            config.token_ttl_hours,
        );
        let services = AppServices::new(
            db.clone(),
            &config,
            auth_config.clone(),
            Some(Arc::new(event_sender.clone())),
        );

        Self {
            db,
            config,
            auth_config,
            services,
            event_sender,
        }
    }
}

impl FromRef<AppState> for AuthConfig {
    fn from_ref(state: &AppState) -> AuthConfig {
        state.auth_config.clone()
    }
}

/// All versioned API routes, mounted under `/api/v1`.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth::routes())
        .merge(handlers::categories::routes())
        .merge(handlers::products::routes())
        .merge(handlers::orders::routes())
        .merge(handlers::settings::routes())
}

/// The complete application router: health, versioned API and Swagger UI.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .merge(handlers::health::routes())
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        .with_state(state)
}
