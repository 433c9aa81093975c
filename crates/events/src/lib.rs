//! Product lifecycle events and the queue plumbing that carries them.
//!
//! - [`event`]: the closed event model.
//! - [`codec`]: the JSON wire envelope shared by producer and consumer.
//! - [`transport`]: the queue abstraction (send / receive / delete).
//! - [`handler`]: handler trait and the fixed kind → handler registry.
//! - [`in_memory_queue`]: a visibility-timeout queue for tests and local runs.

pub mod codec;
pub mod event;
pub mod handler;
pub mod in_memory_queue;
pub mod transport;

pub use codec::{DecodeError, EncodeError, decode, encode};
pub use event::{EventKind, LifecycleEvent};
pub use handler::{EventHandler, HandlerRegistry, HandlerRegistryBuilder};
pub use in_memory_queue::InMemoryQueue;
pub use transport::{AckToken, InFlightMessage, QueueTransport, TransportError};
