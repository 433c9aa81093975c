//! Listing window.

use serde::{Deserialize, Serialize};

/// Page size used when the caller gives none (or zero).
pub const DEFAULT_LIMIT: u64 = 10;
/// Largest page size ever handed to the store.
pub const MAX_LIMIT: u64 = 100;
pub const DEFAULT_OFFSET: u64 = 0;

/// A normalized `(limit, offset)` pair.
///
/// Construct with [`Pagination::clamped`]; the fields are always within
/// `1..=MAX_LIMIT` and `>= 0` respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    limit: u64,
    offset: u64,
}

impl Pagination {
    /// Normalize raw caller input.
    ///
    /// A missing, zero or negative limit becomes [`DEFAULT_LIMIT`]; anything
    /// above [`MAX_LIMIT`] is capped. A missing or negative offset becomes
    /// [`DEFAULT_OFFSET`].
    ///
    /// A negative limit is treated as unusable input, like a non-numeric one,
    /// so it gets the default page rather than being raised to 1.
    pub fn clamped(limit: Option<i64>, offset: Option<i64>) -> Self {
        let limit = match limit {
            Some(l) if l > 0 => (l as u64).min(MAX_LIMIT),
            _ => DEFAULT_LIMIT,
        };
        let offset = match offset {
            Some(o) if o > 0 => o as u64,
            _ => DEFAULT_OFFSET,
        };
        Self { limit, offset }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::clamped(None, None)
    }
}
