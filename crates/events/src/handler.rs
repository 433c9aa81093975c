use std::sync::Arc;

use async_trait::async_trait;

use crate::event::{EventKind, LifecycleEvent};

/// Reacts to one lifecycle event.
///
/// Handlers are invoked concurrently, once per in-flight message, with no
/// bound on parallelism. Implementations must be safe under concurrent calls;
/// any shared mutable state is the handler's own business to protect.
///
/// The same event may be delivered more than once, so handlers must be
/// idempotent. Returning `Err` leaves the message on the queue for
/// redelivery.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: LifecycleEvent) -> anyhow::Result<()>;
}

#[async_trait]
impl<H> EventHandler for Arc<H>
where
    H: EventHandler + ?Sized,
{
    async fn handle(&self, event: LifecycleEvent) -> anyhow::Result<()> {
        (**self).handle(event).await
    }
}

/// Fixed mapping from event kind to handler.
///
/// Built once at startup through [`HandlerRegistryBuilder`] and read-only
/// afterwards, so concurrent lookups need no locking.
pub struct HandlerRegistry {
    handlers: [Option<Arc<dyn EventHandler>>; EventKind::COUNT],
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    pub fn get(&self, kind: EventKind) -> Option<&Arc<dyn EventHandler>> {
        self.handlers[kind.index()].as_ref()
    }

    pub fn registered_kinds(&self) -> Vec<EventKind> {
        EventKind::ALL
            .into_iter()
            .filter(|kind| self.get(*kind).is_some())
            .collect()
    }
}

impl core::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("registered", &self.registered_kinds())
            .finish()
    }
}

#[derive(Default)]
pub struct HandlerRegistryBuilder {
    handlers: [Option<Arc<dyn EventHandler>>; EventKind::COUNT],
}

impl HandlerRegistryBuilder {
    /// Register `handler` for `kind`, replacing any earlier registration.
    pub fn register<H>(self, kind: EventKind, handler: H) -> Self
    where
        H: EventHandler + 'static,
    {
        self.register_arc(kind, Arc::new(handler))
    }

    pub fn register_arc(mut self, kind: EventKind, handler: Arc<dyn EventHandler>) -> Self {
        if self.handlers[kind.index()].replace(handler).is_some() {
            tracing::warn!(event_type = %kind, "handler registered twice; keeping the last one");
        }
        self
    }

    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            handlers: self.handlers,
        }
    }
}
