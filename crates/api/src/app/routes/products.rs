use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Extension, Path, Query,
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, post},
};

use catalog_core::{CatalogError, ProductId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/:id", delete(delete_product))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateProductRequest>, JsonRejection>,
) -> axum::response::Response {
    let Ok(Json(body)) = body else {
        return errors::catalog_error_to_response(CatalogError::bad_request("invalid JSON body"));
    };

    let input = match body.into_new_product() {
        Ok(input) => input,
        Err(e) => return errors::catalog_error_to_response(e),
    };

    match services.orchestrator.create(input).await {
        Ok(product) => (StatusCode::CREATED, Json(product)).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ListProductsQuery>,
) -> axum::response::Response {
    let page = query.pagination();
    match services.orchestrator.list(page).await {
        Ok(result) => Json(dto::ListProductsResponse::new(page, result)).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match id.parse() {
        Ok(id) => id,
        Err(e) => return errors::catalog_error_to_response(e),
    };

    match services.orchestrator.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}
