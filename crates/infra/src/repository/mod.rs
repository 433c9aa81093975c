//! Product storage.
//!
//! The orchestrator talks to storage through two object-safe traits:
//!
//! - [`ProductRepository`]: entry point; opens transactions and runs the
//!   single-statement operations (list, delete).
//! - [`ProductTransaction`]: an open write transaction. Dropping it without
//!   calling `commit` discards everything it wrote.
//!
//! Implementations: [`postgres::PostgresProductRepository`] (sqlx) and
//! [`in_memory::InMemoryProductRepository`] (tests/dev).

use async_trait::async_trait;

use catalog_core::{CatalogResult, NewProduct, Pagination, Product, ProductId, ProductPage};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryProductRepository;
pub use postgres::PostgresProductRepository;

/// Message carried by `Conflict` when `(name, vendor)` already exists.
pub const DUPLICATE_PRODUCT: &str = "product already exists";
/// Resource name carried by `NotFound`.
pub const PRODUCT_RESOURCE: &str = "product";

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn begin(&self) -> CatalogResult<Box<dyn ProductTransaction>>;

    /// One page ordered newest first, plus the total row count.
    async fn list(&self, page: Pagination) -> CatalogResult<ProductPage>;

    /// Remove one product; `NotFound` when nothing was removed.
    async fn delete(&self, id: ProductId) -> CatalogResult<()>;

    /// Insert and commit in one step.
    async fn create(&self, input: NewProduct) -> CatalogResult<Product> {
        let mut tx = self.begin().await?;
        let product = tx.insert(&input).await?;
        tx.commit().await?;
        Ok(product)
    }
}

#[async_trait]
pub trait ProductTransaction: Send {
    /// Insert a product; `Conflict` on a duplicate `(name, vendor)`.
    async fn insert(&mut self, input: &NewProduct) -> CatalogResult<Product>;

    /// Make the writes durable. On failure the transaction is rolled back.
    async fn commit(self: Box<Self>) -> CatalogResult<()>;

    async fn rollback(self: Box<Self>) -> CatalogResult<()>;
}
