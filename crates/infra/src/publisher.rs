//! Lifecycle event publisher.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument};

use catalog_core::{CatalogError, ProductId};
use catalog_events::{EncodeError, EventKind, LifecycleEvent, QueueTransport, TransportError, codec};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("failed to send message to queue: {0}")]
    Transport(#[from] TransportError),
}

impl From<PublishError> for CatalogError {
    fn from(err: PublishError) -> Self {
        CatalogError::internal(err.to_string())
    }
}

/// Sends one lifecycle event per call.
///
/// Exactly one send attempt, no retry. Calling twice may enqueue the event
/// twice; consumers are idempotent.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, kind: EventKind, product_id: ProductId) -> Result<(), PublishError>;
}

#[async_trait]
impl<P> EventPublisher for Arc<P>
where
    P: EventPublisher + ?Sized,
{
    async fn publish(&self, kind: EventKind, product_id: ProductId) -> Result<(), PublishError> {
        (**self).publish(kind, product_id).await
    }
}

/// [`EventPublisher`] over any [`QueueTransport`].
#[derive(Debug, Clone)]
pub struct QueuePublisher<T> {
    transport: T,
}

impl<T> QueuePublisher<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl<T> EventPublisher for QueuePublisher<T>
where
    T: QueueTransport,
{
    #[instrument(skip(self), fields(event_type = %kind, product_id = %product_id), err)]
    async fn publish(&self, kind: EventKind, product_id: ProductId) -> Result<(), PublishError> {
        let body = codec::encode(&LifecycleEvent::new(kind, product_id))?;
        self.transport.send(body).await?;
        debug!(event_type = %kind, product_id = %product_id, "lifecycle event published");
        Ok(())
    }
}
