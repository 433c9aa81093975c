//! Queue transport abstraction (mechanics only).
//!
//! A transport is bound to exactly one queue at construction and offers three
//! operations: `send`, a long-polling `receive`, and `delete` (acknowledge).
//!
//! ## Delivery model
//!
//! - **At-least-once**: a received message stays on the queue, invisible for
//!   the queue's visibility timeout. If it is not deleted before the timeout
//!   elapses it becomes visible again and is redelivered.
//! - **No ordering**: messages may arrive in any order, including a `Deleted`
//!   before the matching `Created`.
//! - **Ack tokens are per delivery**: each receive hands out a fresh token;
//!   tokens from an earlier delivery of the same message may stop working.
//!
//! Consumers must be idempotent.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Opaque handle used to acknowledge one delivery of a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AckToken(String);

impl AckToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for AckToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One delivery of a message, owned by the consumer until it is acknowledged
/// or its processing task exits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlightMessage {
    body: Vec<u8>,
    ack_token: AckToken,
    received_at: DateTime<Utc>,
}

impl InFlightMessage {
    pub fn new(body: Vec<u8>, ack_token: AckToken) -> Self {
        Self {
            body,
            ack_token,
            received_at: Utc::now(),
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn ack_token(&self) -> &AckToken {
        &self.ack_token
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("failed to send message: {0}")]
    Send(String),

    #[error("failed to receive messages: {0}")]
    Receive(String),

    #[error("failed to delete message: {0}")]
    Delete(String),
}

#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Enqueue one message body.
    async fn send(&self, body: Vec<u8>) -> Result<(), TransportError>;

    /// Receive up to `max_messages`, waiting at most `wait` for the first one.
    ///
    /// An empty batch is a normal outcome.
    async fn receive(
        &self,
        max_messages: u32,
        wait: Duration,
    ) -> Result<Vec<InFlightMessage>, TransportError>;

    /// Acknowledge one delivery, removing the message from the queue.
    async fn delete(&self, token: &AckToken) -> Result<(), TransportError>;
}

#[async_trait]
impl<T> QueueTransport for Arc<T>
where
    T: QueueTransport + ?Sized,
{
    async fn send(&self, body: Vec<u8>) -> Result<(), TransportError> {
        (**self).send(body).await
    }

    async fn receive(
        &self,
        max_messages: u32,
        wait: Duration,
    ) -> Result<Vec<InFlightMessage>, TransportError> {
        (**self).receive(max_messages, wait).await
    }

    async fn delete(&self, token: &AckToken) -> Result<(), TransportError> {
        (**self).delete(token).await
    }
}
