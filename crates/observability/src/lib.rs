//! Logging and in-process counters shared by both services.

/// Initialize process-wide logging.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing subscriber setup (filters, JSON output).
pub mod tracing;

/// Product lifecycle counters.
pub mod metrics;

pub use metrics::ProductMetrics;
