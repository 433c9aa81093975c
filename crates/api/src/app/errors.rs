use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use catalog_core::CatalogError;

pub fn catalog_error_to_response(err: CatalogError) -> axum::response::Response {
    let status = match &err {
        CatalogError::BadRequest(_) | CatalogError::FieldsValidation(_) => StatusCode::BAD_REQUEST,
        CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
        CatalogError::Conflict(_) => StatusCode::CONFLICT,
        CatalogError::Internal(_) => {
            tracing::error!(error = %err, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    json_error(status, err.to_string())
}

/// `{"error": "<message>"}` with the given status.
pub fn json_error(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (status, axum::Json(json!({ "error": message.into() }))).into_response()
}
