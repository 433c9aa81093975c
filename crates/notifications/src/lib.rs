//! notifications-service: consumes product lifecycle events and reports them.

pub mod app;
pub mod handlers;
pub mod service;

pub use handlers::registry;
pub use service::NotificationService;
