//! In-memory product repository for tests/dev.
//!
//! Uncommitted inserts are invisible to `list` and `delete`, but they reserve
//! their `(name, vendor)` pair so a concurrent transaction inserting the same
//! pair fails with `Conflict`, like a unique index would.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use catalog_core::{
    CatalogError, CatalogResult, NewProduct, Pagination, Product, ProductId, ProductPage,
};

use super::{DUPLICATE_PRODUCT, PRODUCT_RESOURCE, ProductRepository, ProductTransaction};

type UniqueKey = (String, String);

fn unique_key(name: &str, vendor: &str) -> UniqueKey {
    (name.to_owned(), vendor.to_owned())
}

#[derive(Debug, Default)]
struct Store {
    rows: Vec<Product>,
    reserved: HashSet<UniqueKey>,
    fail_inserts: usize,
    fail_commits: usize,
}

impl Store {
    fn key_taken(&self, key: &UniqueKey) -> bool {
        self.reserved.contains(key)
            || self
                .rows
                .iter()
                .any(|p| p.name == key.0 && p.vendor == key.1)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryProductRepository {
    store: Arc<Mutex<Store>>,
}

fn lock(store: &Mutex<Store>) -> MutexGuard<'_, Store> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` inserts fail with `Internal`.
    pub fn fail_next_inserts(&self, n: usize) {
        lock(&self.store).fail_inserts = n;
    }

    /// Make the next `n` commits fail with `Internal`.
    pub fn fail_next_commits(&self, n: usize) {
        lock(&self.store).fail_commits = n;
    }

    pub fn get(&self, id: ProductId) -> Option<Product> {
        lock(&self.store).rows.iter().find(|p| p.id == id).cloned()
    }

    pub fn contains(&self, id: ProductId) -> bool {
        self.get(id).is_some()
    }

    /// Committed rows.
    pub fn len(&self) -> usize {
        lock(&self.store).rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn begin(&self) -> CatalogResult<Box<dyn ProductTransaction>> {
        Ok(Box::new(InMemoryTransaction {
            store: self.store.clone(),
            pending: Vec::new(),
            finished: false,
        }))
    }

    async fn list(&self, page: Pagination) -> CatalogResult<ProductPage> {
        let store = lock(&self.store);
        // Newest commit first; the stable sort keeps that order among equal timestamps.
        let mut rows: Vec<&Product> = store.rows.iter().rev().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let items = rows
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect();

        Ok(ProductPage {
            items,
            total: store.rows.len() as u64,
        })
    }

    async fn delete(&self, id: ProductId) -> CatalogResult<()> {
        let mut store = lock(&self.store);
        let before = store.rows.len();
        store.rows.retain(|p| p.id != id);
        if store.rows.len() == before {
            return Err(CatalogError::not_found(PRODUCT_RESOURCE));
        }
        Ok(())
    }
}

struct InMemoryTransaction {
    store: Arc<Mutex<Store>>,
    pending: Vec<Product>,
    finished: bool,
}

impl InMemoryTransaction {
    fn release(&mut self, store: &mut Store) {
        for p in &self.pending {
            store.reserved.remove(&unique_key(&p.name, &p.vendor));
        }
        self.finished = true;
    }
}

#[async_trait]
impl ProductTransaction for InMemoryTransaction {
    async fn insert(&mut self, input: &NewProduct) -> CatalogResult<Product> {
        let mut store = lock(&self.store);
        if store.fail_inserts > 0 {
            store.fail_inserts -= 1;
            return Err(CatalogError::internal("injected insert failure"));
        }

        let key = unique_key(&input.name, &input.vendor);
        if store.key_taken(&key) {
            return Err(CatalogError::conflict(DUPLICATE_PRODUCT));
        }
        store.reserved.insert(key);

        let product = input.clone().into_product(ProductId::new(), Utc::now());
        self.pending.push(product.clone());
        Ok(product)
    }

    async fn commit(mut self: Box<Self>) -> CatalogResult<()> {
        let store = self.store.clone();
        let mut store = lock(&store);
        let injected = store.fail_commits > 0;
        if injected {
            store.fail_commits -= 1;
        }

        self.release(&mut store);
        if injected {
            return Err(CatalogError::internal("injected commit failure"));
        }
        store.rows.append(&mut self.pending);
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> CatalogResult<()> {
        let store = self.store.clone();
        self.release(&mut lock(&store));
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if !self.finished {
            let store = self.store.clone();
            self.release(&mut lock(&store));
        }
    }
}
