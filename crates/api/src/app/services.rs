//! Service wiring: storage, queue, orchestrator.

use std::sync::Arc;

use anyhow::Context;

use catalog_events::QueueTransport;
use catalog_infra::config::ProductsServiceConfig;
use catalog_infra::{
    PostgresProductRepository, ProductOrchestrator, ProductRepository, QueuePublisher, SqsQueue, db,
};
use catalog_observability::ProductMetrics;

/// Everything request handlers need.
pub struct AppServices {
    pub orchestrator: ProductOrchestrator,
}

impl AppServices {
    pub fn new(orchestrator: ProductOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Wire an orchestrator from a repository and a queue transport.
    pub fn from_parts(
        repository: Arc<dyn ProductRepository>,
        transport: Arc<dyn QueueTransport>,
        metrics: Arc<ProductMetrics>,
    ) -> Self {
        let publisher = Arc::new(QueuePublisher::new(transport));
        Self::new(ProductOrchestrator::new(repository, publisher, metrics))
    }
}

/// Connect to Postgres and SQS and build the production services.
pub async fn build_services(config: &ProductsServiceConfig) -> anyhow::Result<AppServices> {
    let pool = db::connect(&config.postgres)
        .await
        .context("failed to connect to postgres")?;

    if config.postgres.auto_migrate {
        db::migrate(&pool)
            .await
            .context("failed to apply database migrations")?;
    }

    let queue = SqsQueue::connect(&config.broker)
        .await
        .context("failed to connect to SQS")?;

    Ok(AppServices::from_parts(
        Arc::new(PostgresProductRepository::new(pool)),
        Arc::new(queue),
        Arc::new(ProductMetrics::new()),
    ))
}
