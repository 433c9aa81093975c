//! Health endpoint.

use axum::{Json, Router, routing::get};
use serde::Serialize;
use tower_http::trace::TraceLayer;

pub const API_PREFIX: &str = "/notifications-api/v1";
pub const SERVICE_NAME: &str = "notifications-service";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub name: &'static str,
    pub version: &'static str,
}

pub fn build_app() -> Router {
    Router::new()
        .nest(API_PREFIX, Router::new().route("/health", get(health)))
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        name: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}
