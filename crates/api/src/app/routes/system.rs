use axum::Json;

use crate::app::SERVICE_NAME;
use crate::app::dto::HealthResponse;

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        name: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}
