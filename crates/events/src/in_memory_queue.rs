//! In-memory queue for tests/dev.
//!
//! Behaves like a visibility-timeout queue: received messages are leased, not
//! removed, and reappear once the lease expires without a delete. Every
//! delivery gets a fresh ack token. Failures can be injected per operation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::codec;
use crate::event::LifecycleEvent;
use crate::transport::{AckToken, InFlightMessage, QueueTransport, TransportError};

pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

// Upper bound on how long an idle receive sleeps before re-checking leases.
const POLL_TICK: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
struct Stored {
    id: u64,
    body: Vec<u8>,
}

#[derive(Debug)]
struct Lease {
    message: Stored,
    visible_at: Instant,
}

#[derive(Debug, Default)]
struct InjectedFailures {
    sends: usize,
    receives: usize,
    deletes: usize,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    next_token: u64,
    visible: VecDeque<Stored>,
    leased: HashMap<AckToken, Lease>,
    sent: Vec<Vec<u8>>,
    deleted: Vec<Vec<u8>>,
    receive_calls: usize,
    failures: InjectedFailures,
}

impl State {
    fn reclaim_expired(&mut self, now: Instant) {
        let expired: Vec<AckToken> = self
            .leased
            .iter()
            .filter(|(_, lease)| lease.visible_at <= now)
            .map(|(token, _)| token.clone())
            .collect();

        for token in expired {
            if let Some(lease) = self.leased.remove(&token) {
                self.visible.push_back(lease.message);
            }
        }
    }
}

#[derive(Debug)]
pub struct InMemoryQueue {
    state: Mutex<State>,
    notify: Notify,
    visibility_timeout: Duration,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::with_visibility_timeout(DEFAULT_VISIBILITY_TIMEOUT)
    }

    pub fn with_visibility_timeout(visibility_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            notify: Notify::new(),
            visibility_timeout,
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `n` sends fail.
    pub fn fail_next_sends(&self, n: usize) {
        self.state().failures.sends = n;
    }

    /// Make the next `n` receives fail.
    pub fn fail_next_receives(&self, n: usize) {
        self.state().failures.receives = n;
    }

    /// Make the next `n` deletes fail.
    pub fn fail_next_deletes(&self, n: usize) {
        self.state().failures.deletes = n;
    }

    /// Every body successfully sent, in send order.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state().sent.clone()
    }

    /// Sent bodies that decode as lifecycle events.
    pub fn sent_events(&self) -> Vec<LifecycleEvent> {
        self.state()
            .sent
            .iter()
            .filter_map(|body| codec::decode(body).ok())
            .collect()
    }

    /// Bodies of every acknowledged delivery.
    pub fn deleted(&self) -> Vec<Vec<u8>> {
        self.state().deleted.clone()
    }

    /// Messages still on the queue, visible or leased.
    pub fn len(&self) -> usize {
        let state = self.state();
        state.visible.len() + state.leased.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn leased_len(&self) -> usize {
        self.state().leased.len()
    }

    pub fn receive_calls(&self) -> usize {
        self.state().receive_calls
    }

    fn lease_batch(&self, max_messages: u32) -> Vec<InFlightMessage> {
        let mut state = self.state();
        let now = Instant::now();
        state.reclaim_expired(now);

        let mut batch = Vec::new();
        while batch.len() < max_messages as usize {
            let Some(message) = state.visible.pop_front() else {
                break;
            };
            state.next_token += 1;
            let token = AckToken::new(format!("{}-{}", message.id, state.next_token));
            batch.push(InFlightMessage::new(message.body.clone(), token.clone()));
            state.leased.insert(
                token,
                Lease {
                    message,
                    visible_at: now + self.visibility_timeout,
                },
            );
        }
        batch
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueTransport for InMemoryQueue {
    async fn send(&self, body: Vec<u8>) -> Result<(), TransportError> {
        {
            let mut state = self.state();
            if state.failures.sends > 0 {
                state.failures.sends -= 1;
                return Err(TransportError::Send("injected send failure".into()));
            }
            state.next_id += 1;
            let id = state.next_id;
            state.sent.push(body.clone());
            state.visible.push_back(Stored { id, body });
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn receive(
        &self,
        max_messages: u32,
        wait: Duration,
    ) -> Result<Vec<InFlightMessage>, TransportError> {
        {
            let mut state = self.state();
            state.receive_calls += 1;
            if state.failures.receives > 0 {
                state.failures.receives -= 1;
                return Err(TransportError::Receive("injected receive failure".into()));
            }
        }

        let deadline = Instant::now() + wait;
        loop {
            let batch = self.lease_batch(max_messages);
            let now = Instant::now();
            if !batch.is_empty() || now >= deadline {
                return Ok(batch);
            }
            let step = POLL_TICK.min(deadline - now);
            let _ = tokio::time::timeout(step, self.notify.notified()).await;
        }
    }

    async fn delete(&self, token: &AckToken) -> Result<(), TransportError> {
        let mut state = self.state();
        if state.failures.deletes > 0 {
            state.failures.deletes -= 1;
            return Err(TransportError::Delete("injected delete failure".into()));
        }
        match state.leased.remove(token) {
            Some(lease) => {
                state.deleted.push(lease.message.body);
                Ok(())
            }
            None => Err(TransportError::Delete(format!(
                "receipt handle {token} is not valid"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_WAIT: Duration = Duration::ZERO;

    #[tokio::test]
    async fn received_message_is_leased_until_deleted() {
        let queue = InMemoryQueue::new();
        queue.send(b"one".to_vec()).await.unwrap();

        let batch = queue.receive(10, NO_WAIT).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].body(), b"one");

        // Leased: invisible to a second receive, still counted.
        assert!(queue.receive(10, NO_WAIT).await.unwrap().is_empty());
        assert_eq!(queue.len(), 1);

        queue.delete(batch[0].ack_token()).await.unwrap();
        assert!(queue.is_empty());
        assert_eq!(queue.deleted(), vec![b"one".to_vec()]);
    }

    #[tokio::test]
    async fn expired_lease_is_redelivered_with_a_fresh_token() {
        let queue = InMemoryQueue::with_visibility_timeout(Duration::from_millis(20));
        queue.send(b"again".to_vec()).await.unwrap();

        let first = queue.receive(1, NO_WAIT).await.unwrap();
        let second = queue.receive(1, Duration::from_millis(500)).await.unwrap();

        assert_eq!(second.len(), 1);
        assert_eq!(second[0].body(), b"again");
        assert_ne!(first[0].ack_token(), second[0].ack_token());
        assert!(queue.delete(first[0].ack_token()).await.is_err());
        queue.delete(second[0].ack_token()).await.unwrap();
    }

    #[tokio::test]
    async fn batch_size_is_respected() {
        let queue = InMemoryQueue::new();
        for i in 0..5u8 {
            queue.send(vec![i]).await.unwrap();
        }
        assert_eq!(queue.receive(3, NO_WAIT).await.unwrap().len(), 3);
        assert_eq!(queue.receive(3, NO_WAIT).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn long_poll_wakes_on_send() {
        let queue = std::sync::Arc::new(InMemoryQueue::new());
        let receiver = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.receive(1, Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.send(b"late".to_vec()).await.unwrap();

        let batch = receiver.await.unwrap().unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_one_by_one() {
        let queue = InMemoryQueue::new();
        queue.fail_next_sends(1);
        queue.fail_next_receives(1);

        assert!(matches!(queue.send(b"x".to_vec()).await, Err(TransportError::Send(_))));
        queue.send(b"y".to_vec()).await.unwrap();
        assert!(matches!(queue.receive(1, NO_WAIT).await, Err(TransportError::Receive(_))));

        let batch = queue.receive(1, NO_WAIT).await.unwrap();
        queue.fail_next_deletes(1);
        assert!(queue.delete(batch[0].ack_token()).await.is_err());
        queue.delete(batch[0].ack_token()).await.unwrap();
        assert_eq!(queue.sent(), vec![b"y".to_vec()]);
        assert_eq!(queue.receive_calls(), 2);
    }
}
