use std::sync::atomic::{AtomicU64, Ordering};

/// Counts successful product creations and deletions.
///
/// Shared as `Arc<ProductMetrics>` and handed to whoever records; nothing in
/// the process reaches for a global. No exporter is attached.
#[derive(Debug, Default)]
pub struct ProductMetrics {
    created: AtomicU64,
    deleted: AtomicU64,
}

impl ProductMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deleted(&self) {
        self.deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    pub fn deleted(&self) -> u64 {
        self.deleted.load(Ordering::Relaxed)
    }
}
