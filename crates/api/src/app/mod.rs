//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: infrastructure wiring (Postgres, SQS, orchestrator)
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs and validation
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use catalog_infra::config::HttpSettings;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Every products-service route lives under this prefix.
pub const API_PREFIX: &str = "/products-api/v1";
pub const SERVICE_NAME: &str = "products-service";

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<AppServices>, http: &HttpSettings) -> Router {
    let api = Router::new()
        .route("/health", get(routes::system::health))
        .nest("/products", routes::products::router())
        .layer(Extension(services));

    Router::new().nest(API_PREFIX, api).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(RequestBodyLimitLayer::new(http.body_limit_bytes)),
    )
}
