use std::borrow::Cow;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use catalog_core::{CatalogError, NewProduct, Pagination, Product, ProductPage};

pub const MAX_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_price", skip_on_field_errors = false))]
pub struct CreateProductRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "name is required and must be at most 255 characters"))]
    pub name: String,

    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "vendor is required and must be at most 255 characters"))]
    pub vendor: String,

    #[serde(default)]
    #[validate(length(max = 10000, message = "description must be at most 10000 characters"))]
    pub description: Option<String>,

    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
}

fn validate_price(req: &CreateProductRequest) -> Result<(), ValidationError> {
    let message = match req.price {
        None => "price is required",
        Some(p) if p < Decimal::ZERO || p > MAX_PRICE => "price must be between 0 and 1000000",
        Some(_) => return Ok(()),
    };
    let mut err = ValidationError::new("price");
    err.message = Some(Cow::Borrowed(message));
    Err(err)
}

impl CreateProductRequest {
    /// Validate and convert into the creation input.
    pub fn into_new_product(self) -> Result<NewProduct, CatalogError> {
        self.validate().map_err(validation_failure)?;
        Ok(NewProduct {
            name: self.name,
            vendor: self.vendor,
            description: self.description.unwrap_or_default(),
            price: self.price.unwrap_or_default(),
        })
    }
}

/// Flatten validator output into one message per failed check, in a stable order.
fn validation_failure(errors: ValidationErrors) -> CatalogError {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    // Struct-level checks (`__all__`) go last.
    fields.sort_by_key(|(field, _)| (field.starts_with("__"), *field));

    let messages = fields
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{field} is invalid"))
            })
        })
        .collect();
    CatalogError::FieldsValidation(messages)
}

/// Raw `limit`/`offset` query values. Anything that is not an integer falls
/// back to the default, the same as an absent value.
#[derive(Debug, Default, Deserialize)]
pub struct ListProductsQuery {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl ListProductsQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::clamped(lenient_int(&self.limit), lenient_int(&self.offset))
    }
}

fn lenient_int(raw: &Option<String>) -> Option<i64> {
    raw.as_deref().and_then(|v| v.trim().parse().ok())
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct PaginationResponse {
    pub offset: u64,
    pub limit: u64,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct ListProductsResponse {
    pub pagination: PaginationResponse,
    pub products: Vec<Product>,
}

impl ListProductsResponse {
    pub fn new(page: Pagination, result: ProductPage) -> Self {
        Self {
            pagination: PaginationResponse {
                offset: page.offset(),
                limit: page.limit(),
                total: result.total,
            },
            products: result.items,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub name: &'static str,
    pub version: &'static str,
}
