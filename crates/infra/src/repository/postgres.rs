//! Postgres-backed product repository.
//!
//! ## Error Mapping
//!
//! | SQLx error | Postgres code | CatalogError |
//! |------------|---------------|--------------|
//! | Database (unique violation) | `23505` | `Conflict("product already exists")` |
//! | Database (other) | any | `Internal` |
//! | PoolClosed / Io / other | n/a | `Internal` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use catalog_core::{
    CatalogError, CatalogResult, NewProduct, Pagination, Product, ProductId, ProductPage,
};

use super::{DUPLICATE_PRODUCT, PRODUCT_RESOURCE, ProductRepository, ProductTransaction};

#[derive(Debug, Clone)]
pub struct PostgresProductRepository {
    pool: PgPool,
}

impl PostgresProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    vendor: String,
    description: Option<String>,
    price: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: ProductId::from_uuid(row.id),
            name: row.name,
            vendor: row.vendor,
            description: row.description.unwrap_or_default(),
            price: row.price,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl ProductRepository for PostgresProductRepository {
    #[instrument(skip(self), err)]
    async fn begin(&self) -> CatalogResult<Box<dyn ProductTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresTransaction { tx }))
    }

    #[instrument(
        skip(self),
        fields(
            limit = page.limit(),
            offset = page.offset(),
            returned = tracing::field::Empty,
            total = tracing::field::Empty
        ),
        err
    )]
    async fn list(&self, page: Pagination) -> CatalogResult<ProductPage> {
        let rows: Vec<ProductRow> = sqlx::query_as(
            r#"
            SELECT id, name, vendor, description, price, created_at, updated_at
            FROM products
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_products", e))?;

        let span = Span::current();
        span.record("returned", rows.len());
        span.record("total", total);

        Ok(ProductPage {
            items: rows.into_iter().map(Product::from).collect(),
            total: total.max(0) as u64,
        })
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn delete(&self, id: ProductId) -> CatalogResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found(PRODUCT_RESOURCE));
        }
        Ok(())
    }
}

/// An open sqlx transaction.
///
/// sqlx rolls back on drop when the transaction was neither committed nor
/// rolled back, which also covers a failed `COMMIT`.
struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ProductTransaction for PostgresTransaction {
    #[instrument(skip(self, input), fields(name = %input.name, vendor = %input.vendor), err)]
    async fn insert(&mut self, input: &NewProduct) -> CatalogResult<Product> {
        let row: ProductRow = sqlx::query_as(
            r#"
            INSERT INTO products (name, vendor, description, price)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, vendor, description, price, created_at, updated_at
            "#,
        )
        .bind(&input.name)
        .bind(&input.vendor)
        .bind(&input.description)
        .bind(input.price)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;

        Ok(row.into())
    }

    async fn commit(self: Box<Self>) -> CatalogResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self: Box<Self>) -> CatalogResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback_transaction", e))
    }
}

/// Map a sqlx error onto the catalog taxonomy.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> CatalogError {
    if is_unique_violation(&err) {
        return CatalogError::conflict(DUPLICATE_PRODUCT);
    }
    match err {
        sqlx::Error::Database(db_err) => {
            CatalogError::internal(format!("database error in {operation}: {}", db_err.message()))
        }
        sqlx::Error::PoolClosed => {
            CatalogError::internal(format!("connection pool closed in {operation}"))
        }
        other => CatalogError::internal(format!("sqlx error in {operation}: {other}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_closed_maps_to_internal() {
        let err = map_sqlx_error("list_products", sqlx::Error::PoolClosed);
        assert_eq!(
            err,
            CatalogError::Internal("connection pool closed in list_products".into())
        );
    }

    #[test]
    fn row_not_found_is_not_a_conflict() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
        assert!(matches!(
            map_sqlx_error("insert_product", sqlx::Error::RowNotFound),
            CatalogError::Internal(_)
        ));
    }

    #[test]
    fn null_description_reads_as_empty() {
        let now = Utc::now();
        let product: Product = ProductRow {
            id: Uuid::now_v7(),
            name: "Lamp".into(),
            vendor: "Acme".into(),
            description: None,
            price: Decimal::new(500, 2),
            created_at: now,
            updated_at: now,
        }
        .into();
        assert_eq!(product.description, "");
    }
}
