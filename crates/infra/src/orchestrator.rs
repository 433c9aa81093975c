//! Product write/read orchestration.
//!
//! Ties a store write to a lifecycle event publish. Creation and deletion have
//! deliberately different guarantees:
//!
//! ```text
//! create                                delete
//!   1. begin transaction                  1. delete row (single statement)
//!   2. insert row                         2. publish Deleted (failure only logged)
//!   3. publish Created (tx still open)    3. count
//!   4. commit
//!   5. count
//! ```
//!
//! - **Create**: an event is only ever published for a row that was inserted
//!   in an open transaction; if the publish fails the transaction is rolled
//!   back and the caller sees `Internal`. If the commit itself fails after the
//!   publish, the event is already out: a compensating `Deleted` event is sent
//!   for the same id (best effort) so consumers converge.
//! - **Delete**: the store is authoritative. Once the row is gone the call
//!   succeeds whatever happens to the event.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use catalog_core::{CatalogResult, NewProduct, Pagination, Product, ProductId, ProductPage};
use catalog_events::EventKind;
use catalog_observability::ProductMetrics;

use crate::publisher::EventPublisher;
use crate::repository::{ProductRepository, ProductTransaction};

#[derive(Clone)]
pub struct ProductOrchestrator {
    repository: Arc<dyn ProductRepository>,
    publisher: Arc<dyn EventPublisher>,
    metrics: Arc<ProductMetrics>,
}

impl ProductOrchestrator {
    pub fn new(
        repository: Arc<dyn ProductRepository>,
        publisher: Arc<dyn EventPublisher>,
        metrics: Arc<ProductMetrics>,
    ) -> Self {
        Self {
            repository,
            publisher,
            metrics,
        }
    }

    pub fn metrics(&self) -> &ProductMetrics {
        &self.metrics
    }

    #[instrument(skip(self, input), fields(name = %input.name, vendor = %input.vendor), err)]
    pub async fn create(&self, input: NewProduct) -> CatalogResult<Product> {
        // 1) Open the transaction
        let mut tx = self.repository.begin().await?;

        // 2) Insert (a conflict or store failure rolls back)
        let product = match tx.insert(&input).await {
            Ok(product) => product,
            Err(err) => {
                rollback(tx).await;
                return Err(err);
            }
        };

        // 3) Publish while the row is still uncommitted
        if let Err(err) = self.publisher.publish(EventKind::Created, product.id).await {
            error!(product_id = %product.id, error = %err, "failed to publish creation event; rolling back");
            rollback(tx).await;
            return Err(err.into());
        }

        // 4) Commit; the event is already out, so retract it if the row never lands
        if let Err(err) = tx.commit().await {
            error!(product_id = %product.id, error = %err, "commit failed after creation event was published");
            self.retract(product.id).await;
            return Err(err);
        }

        // 5) Count
        self.metrics.record_created();
        info!(product_id = %product.id, "product created");
        Ok(product)
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    pub async fn delete(&self, id: ProductId) -> CatalogResult<()> {
        self.repository.delete(id).await?;

        if let Err(err) = self.publisher.publish(EventKind::Deleted, id).await {
            warn!(product_id = %id, error = %err, "failed to publish deletion event; product stays deleted");
        }

        self.metrics.record_deleted();
        info!(product_id = %id, "product deleted");
        Ok(())
    }

    pub async fn list(&self, page: Pagination) -> CatalogResult<ProductPage> {
        self.repository.list(page).await
    }

    async fn retract(&self, id: ProductId) {
        match self.publisher.publish(EventKind::Deleted, id).await {
            Ok(()) => warn!(product_id = %id, "published compensating deletion event"),
            Err(err) => error!(
                product_id = %id,
                error = %err,
                "failed to publish compensating deletion event; consumers may see a product that does not exist"
            ),
        }
    }
}

async fn rollback(tx: Box<dyn ProductTransaction>) {
    if let Err(err) = tx.rollback().await {
        warn!(error = %err, "transaction rollback failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::{CatalogError, DEFAULT_LIMIT};
    use catalog_events::{InMemoryQueue, LifecycleEvent};
    use rust_decimal::Decimal;

    use crate::publisher::QueuePublisher;
    use crate::repository::InMemoryProductRepository;

    struct Fixture {
        repo: InMemoryProductRepository,
        queue: Arc<InMemoryQueue>,
        orchestrator: ProductOrchestrator,
    }

    fn setup() -> Fixture {
        let repo = InMemoryProductRepository::new();
        let queue = Arc::new(InMemoryQueue::new());
        let orchestrator = ProductOrchestrator::new(
            Arc::new(repo.clone()),
            Arc::new(QueuePublisher::new(queue.clone())),
            Arc::new(ProductMetrics::new()),
        );
        Fixture {
            repo,
            queue,
            orchestrator,
        }
    }

    fn test_product(name: &str) -> NewProduct {
        NewProduct::new(name, "Acme", "a test product", Decimal::new(4999, 2))
    }

    #[tokio::test]
    async fn create_commits_and_publishes_once() {
        let fx = setup();

        let product = fx.orchestrator.create(test_product("Lamp")).await.unwrap();

        assert!(fx.repo.contains(product.id));
        assert_eq!(fx.queue.sent_events(), vec![LifecycleEvent::created(product.id)]);
        assert_eq!(fx.orchestrator.metrics().created(), 1);
    }

    #[tokio::test]
    async fn create_publish_failure_rolls_back() {
        let fx = setup();
        fx.queue.fail_next_sends(1);

        let err = fx.orchestrator.create(test_product("Lamp")).await.unwrap_err();

        assert!(matches!(err, CatalogError::Internal(_)));
        assert!(fx.repo.is_empty());
        assert!(fx.queue.sent().is_empty());
        assert_eq!(fx.orchestrator.metrics().created(), 0);

        // The unique key was released by the rollback.
        fx.orchestrator.create(test_product("Lamp")).await.unwrap();
    }

    #[tokio::test]
    async fn create_conflict_publishes_nothing() {
        let fx = setup();
        fx.orchestrator.create(test_product("Lamp")).await.unwrap();

        let err = fx.orchestrator.create(test_product("Lamp")).await.unwrap_err();

        assert!(matches!(err, CatalogError::Conflict(_)));
        assert_eq!(fx.queue.sent().len(), 1);
        assert_eq!(fx.repo.len(), 1);
    }

    #[tokio::test]
    async fn create_insert_failure_publishes_nothing() {
        let fx = setup();
        fx.repo.fail_next_inserts(1);

        let err = fx.orchestrator.create(test_product("Lamp")).await.unwrap_err();

        assert!(matches!(err, CatalogError::Internal(_)));
        assert!(fx.queue.sent().is_empty());
    }

    #[tokio::test]
    async fn commit_failure_after_publish_sends_compensation() {
        let fx = setup();
        fx.repo.fail_next_commits(1);

        let err = fx.orchestrator.create(test_product("Lamp")).await.unwrap_err();
        assert!(matches!(err, CatalogError::Internal(_)));
        assert!(fx.repo.is_empty());

        let events = fx.queue.sent_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind(), EventKind::Created);
        assert_eq!(events[1], LifecycleEvent::deleted(events[0].product_id()));
        assert_eq!(fx.orchestrator.metrics().created(), 0);
    }

    #[tokio::test]
    async fn delete_publishes_and_counts() {
        let fx = setup();
        let product = fx.orchestrator.create(test_product("Lamp")).await.unwrap();

        fx.orchestrator.delete(product.id).await.unwrap();

        assert!(!fx.repo.contains(product.id));
        assert_eq!(
            fx.queue.sent_events().last(),
            Some(&LifecycleEvent::deleted(product.id))
        );
        assert_eq!(fx.orchestrator.metrics().deleted(), 1);
    }

    #[tokio::test]
    async fn delete_survives_publish_failure() {
        let fx = setup();
        let product = fx.orchestrator.create(test_product("Lamp")).await.unwrap();
        fx.queue.fail_next_sends(1);

        fx.orchestrator.delete(product.id).await.unwrap();

        assert!(!fx.repo.contains(product.id));
        assert_eq!(fx.queue.sent_events(), vec![LifecycleEvent::created(product.id)]);
        assert_eq!(fx.orchestrator.metrics().deleted(), 1);
    }

    #[tokio::test]
    async fn delete_missing_is_not_found_and_silent() {
        let fx = setup();

        let err = fx.orchestrator.delete(ProductId::new()).await.unwrap_err();

        assert!(matches!(err, CatalogError::NotFound(_)));
        assert!(fx.queue.sent().is_empty());
        assert_eq!(fx.orchestrator.metrics().deleted(), 0);
    }

    #[tokio::test]
    async fn list_defaults_and_out_of_range_offsets() {
        let fx = setup();
        for i in 0..100 {
            fx.repo.create(test_product(&format!("Lamp {i}"))).await.unwrap();
        }

        let page = fx
            .orchestrator
            .list(Pagination::clamped(Some(0), Some(0)))
            .await
            .unwrap();
        assert_eq!(page.items.len() as u64, DEFAULT_LIMIT);
        assert_eq!(page.total, 100);

        let page = fx
            .orchestrator
            .list(Pagination::clamped(Some(5), Some(10_000)))
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 100);
    }
}
