use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

use catalog_core::ProductId;

/// Reports product lifecycle changes.
///
/// Reporting is a log line per event; it never fails for a well-formed event.
/// Duplicate deliveries simply produce duplicate log lines.
#[derive(Debug, Default)]
pub struct NotificationService {
    created: AtomicU64,
    deleted: AtomicU64,
}

impl NotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn product_created(&self, id: ProductId) -> anyhow::Result<()> {
        self.created.fetch_add(1, Ordering::Relaxed);
        info!(product_id = %id, "product created");
        Ok(())
    }

    pub fn product_deleted(&self, id: ProductId) -> anyhow::Result<()> {
        self.deleted.fetch_add(1, Ordering::Relaxed);
        info!(product_id = %id, "product deleted");
        Ok(())
    }

    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    pub fn deleted_count(&self) -> u64 {
        self.deleted.load(Ordering::Relaxed)
    }
}
