//! The product record and its creation input.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::id::ProductId;

/// A catalog product as stored.
///
/// `(name, vendor)` is unique across the catalog; the store enforces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub vendor: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a product. Validation happens at the edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub vendor: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

impl NewProduct {
    pub fn new(
        name: impl Into<String>,
        vendor: impl Into<String>,
        description: impl Into<String>,
        price: Decimal,
    ) -> Self {
        Self {
            name: name.into(),
            vendor: vendor.into(),
            description: description.into(),
            price,
        }
    }

    /// Materialize the stored record once the store assigned an id.
    pub fn into_product(self, id: ProductId, now: DateTime<Utc>) -> Product {
        Product {
            id,
            name: self.name,
            vendor: self.vendor,
            description: self.description,
            price: self.price,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One page of products plus the total number of products in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProductPage {
    pub items: Vec<Product>,
    pub total: u64,
}
