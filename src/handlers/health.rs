use axum::{routing::get, Json, Router};
use serde_json::json;

use crate::AppState;

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up"),
    )
)]
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
