use std::sync::Arc;

use async_trait::async_trait;

use catalog_events::{EventHandler, EventKind, HandlerRegistry, LifecycleEvent};

use crate::service::NotificationService;

pub struct ProductCreatedHandler {
    service: Arc<NotificationService>,
}

#[async_trait]
impl EventHandler for ProductCreatedHandler {
    async fn handle(&self, event: LifecycleEvent) -> anyhow::Result<()> {
        self.service.product_created(event.product_id())
    }
}

pub struct ProductDeletedHandler {
    service: Arc<NotificationService>,
}

#[async_trait]
impl EventHandler for ProductDeletedHandler {
    async fn handle(&self, event: LifecycleEvent) -> anyhow::Result<()> {
        self.service.product_deleted(event.product_id())
    }
}

/// Registry routing both lifecycle kinds to `service`.
pub fn registry(service: Arc<NotificationService>) -> HandlerRegistry {
    HandlerRegistry::builder()
        .register(
            EventKind::Created,
            ProductCreatedHandler {
                service: service.clone(),
            },
        )
        .register(EventKind::Deleted, ProductDeletedHandler { service })
        .build()
}
