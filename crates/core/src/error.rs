//! Catalog error model.
//!
//! Every layer that talks to a caller (orchestrator, HTTP) speaks in terms of
//! [`CatalogError`]. The `Display` form is `"<code> - <detail>"` and is what
//! ends up in HTTP error bodies.

use thiserror::Error;

/// Result type used across the catalog.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Separator between individual field messages in a validation error.
pub const FIELDS_SEPARATOR: &str = ",";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The request itself was malformed (bad JSON, bad id, ...).
    #[error("bad_request - {0}")]
    BadRequest(String),

    /// A uniqueness constraint was violated.
    #[error("conflict - {0}")]
    Conflict(String),

    /// The named resource does not exist.
    #[error("not_found - {0}")]
    NotFound(String),

    /// One or more request fields failed validation.
    #[error("validation_error - {}", .0.join(FIELDS_SEPARATOR))]
    FieldsValidation(Vec<String>),

    /// Storage, transport or any other unexpected failure.
    #[error("internal_server_error - {0}")]
    Internal(String),
}

impl CatalogError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Machine-readable code, the part before `" - "` in the display form.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::FieldsValidation(_) => "validation_error",
            Self::Internal(_) => "internal_server_error",
        }
    }
}
