//! `catalog-core`: product catalog primitives.
//!
//! Plain data and error types shared by the products and notifications
//! services. No I/O lives here.

pub mod error;
pub mod id;
pub mod pagination;
pub mod product;

pub use error::{CatalogError, CatalogResult};
pub use id::ProductId;
pub use pagination::{DEFAULT_LIMIT, DEFAULT_OFFSET, MAX_LIMIT, Pagination};
pub use product::{NewProduct, Product, ProductPage};
