//! Infrastructure layer: storage, queue transport, consumer, orchestration,
//! configuration.

pub mod config;
pub mod consumer;
pub mod db;
pub mod http;
pub mod orchestrator;
pub mod publisher;
pub mod queue;
pub mod repository;
pub mod shutdown;

pub use consumer::{ConsumerConfig, ConsumerReport, Disposition, QueueConsumer};
pub use orchestrator::ProductOrchestrator;
pub use publisher::{EventPublisher, PublishError, QueuePublisher};
pub use queue::SqsQueue;
pub use repository::{
    InMemoryProductRepository, PostgresProductRepository, ProductRepository, ProductTransaction,
};
pub use shutdown::Shutdown;
