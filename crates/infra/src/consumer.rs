//! Polling queue consumer.
//!
//! ## Lifecycle
//!
//! ```text
//! Polling -> Receiving -> Dispatching -> Polling ...
//!    \ shutdown requested
//!     -> Draining (no more receives; wait for in-flight tasks) -> Stopped
//! ```
//!
//! Every received message is processed in its own task tracked by one
//! `JoinSet`. The loop goes straight back to receiving; it never waits for a
//! batch to finish.
//!
//! ## Outcome per message
//!
//! | Situation | Acknowledged |
//! |-----------|--------------|
//! | empty body, bad envelope, unknown event type | yes (discarded) |
//! | no handler registered for the kind | yes (discarded) |
//! | handler error or processing deadline exceeded | no (redelivered after the visibility timeout) |
//! | handler success | yes |
//!
//! The acknowledgment runs under its own deadline, independent of the
//! processing deadline and of shutdown. A failed acknowledgment is logged only;
//! the queue will redeliver and the handler must cope with the duplicate.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use catalog_events::{EventHandler, HandlerRegistry, InFlightMessage, QueueTransport, codec};

use crate::shutdown::stopped;

pub const DEFAULT_MAX_MESSAGES: u32 = 10;
pub const DEFAULT_WAIT_TIME: Duration = Duration::from_secs(20);
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_DELETE_TIMEOUT: Duration = Duration::from_secs(10);

/// Consumer tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// Upper bound on messages per receive.
    pub max_messages: u32,
    /// Long-poll wait per receive.
    pub wait_time: Duration,
    /// Pause after a failed receive.
    pub retry_delay: Duration,
    /// Processing deadline per message.
    pub handler_timeout: Duration,
    /// Deadline for one acknowledgment.
    pub delete_timeout: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            wait_time: DEFAULT_WAIT_TIME,
            retry_delay: DEFAULT_RETRY_DELAY,
            handler_timeout: DEFAULT_HANDLER_TIMEOUT,
            delete_timeout: DEFAULT_DELETE_TIMEOUT,
        }
    }
}

impl ConsumerConfig {
    pub fn with_max_messages(mut self, max_messages: u32) -> Self {
        self.max_messages = max_messages;
        self
    }

    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_handler_timeout(mut self, handler_timeout: Duration) -> Self {
        self.handler_timeout = handler_timeout;
        self
    }

    pub fn with_delete_timeout(mut self, delete_timeout: Duration) -> Self {
        self.delete_timeout = delete_timeout;
        self
    }
}

/// What happened to one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Permanent failure (bad body, unknown type, no handler); acknowledged.
    Discarded,
    /// Handled successfully; acknowledged.
    Completed,
    /// Handler failed or timed out; left on the queue.
    Redeliver,
}

/// Tally of dispositions over one `run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerReport {
    pub completed: u64,
    pub discarded: u64,
    pub redelivered: u64,
    /// Tasks that panicked.
    pub crashed: u64,
}

impl ConsumerReport {
    fn record(&mut self, outcome: Result<Disposition, JoinError>) {
        match outcome {
            Ok(Disposition::Completed) => self.completed += 1,
            Ok(Disposition::Discarded) => self.discarded += 1,
            Ok(Disposition::Redeliver) => self.redelivered += 1,
            Err(err) => {
                error!(error = %err, "message task crashed; message left for redelivery");
                self.crashed += 1;
            }
        }
    }
}

pub struct QueueConsumer {
    transport: Arc<dyn QueueTransport>,
    processor: MessageProcessor,
    config: ConsumerConfig,
}

impl QueueConsumer {
    pub fn new(
        transport: Arc<dyn QueueTransport>,
        registry: Arc<HandlerRegistry>,
        config: ConsumerConfig,
    ) -> Self {
        let processor = MessageProcessor {
            transport: transport.clone(),
            registry,
            handler_timeout: config.handler_timeout,
            delete_timeout: config.delete_timeout,
        };
        Self {
            transport,
            processor,
            config,
        }
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Poll until `shutdown` flips to `true`, then drain and return.
    ///
    /// Receive failures are never fatal: they are logged and retried after
    /// `retry_delay`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> ConsumerReport {
        let mut in_flight: JoinSet<Disposition> = JoinSet::new();
        let mut report = ConsumerReport::default();

        info!(
            max_messages = self.config.max_messages,
            wait_time_ms = self.config.wait_time.as_millis() as u64,
            "queue consumer started"
        );

        loop {
            // Reap whatever finished since the last receive.
            while let Some(outcome) = in_flight.try_join_next() {
                report.record(outcome);
            }

            if *shutdown.borrow() {
                break;
            }

            let received = tokio::select! {
                biased;
                _ = stopped(&mut shutdown) => break,
                res = self.transport.receive(self.config.max_messages, self.config.wait_time) => res,
            };

            match received {
                Ok(batch) => {
                    if !batch.is_empty() {
                        debug!(count = batch.len(), "received message batch");
                    }
                    for message in batch {
                        let processor = self.processor.clone();
                        in_flight.spawn(async move { processor.process(message).await });
                    }
                }
                Err(err) => {
                    error!(
                        error = %err,
                        retry_delay_ms = self.config.retry_delay.as_millis() as u64,
                        "failed to receive messages"
                    );
                    tokio::select! {
                        biased;
                        _ = stopped(&mut shutdown) => break,
                        _ = tokio::time::sleep(self.config.retry_delay) => {}
                    }
                }
            }
        }

        info!(in_flight = in_flight.len(), "queue consumer draining");
        while let Some(outcome) = in_flight.join_next().await {
            report.record(outcome);
        }
        info!(
            completed = report.completed,
            discarded = report.discarded,
            redelivered = report.redelivered,
            crashed = report.crashed,
            "queue consumer stopped"
        );
        report
    }
}

/// Everything one message task needs; cheap to clone.
#[derive(Clone)]
pub(crate) struct MessageProcessor {
    transport: Arc<dyn QueueTransport>,
    registry: Arc<HandlerRegistry>,
    handler_timeout: Duration,
    delete_timeout: Duration,
}

impl MessageProcessor {
    pub(crate) async fn process(&self, message: InFlightMessage) -> Disposition {
        let event = match codec::decode(message.body()) {
            Ok(event) => event,
            Err(err) => {
                warn!(
                    error = %err,
                    ack_token = %message.ack_token(),
                    "discarding undecodable message"
                );
                self.acknowledge(&message).await;
                return Disposition::Discarded;
            }
        };

        let kind = event.kind();
        let product_id = event.product_id();

        let Some(handler) = self.registry.get(kind) else {
            warn!(event_type = %kind, product_id = %product_id, "no handler registered; discarding message");
            self.acknowledge(&message).await;
            return Disposition::Discarded;
        };

        match tokio::time::timeout(self.handler_timeout, handler.handle(event)).await {
            Ok(Ok(())) => {
                self.acknowledge(&message).await;
                Disposition::Completed
            }
            Ok(Err(err)) => {
                error!(
                    event_type = %kind,
                    product_id = %product_id,
                    error = ?err,
                    "handler failed; message left for redelivery"
                );
                Disposition::Redeliver
            }
            Err(_) => {
                error!(
                    event_type = %kind,
                    product_id = %product_id,
                    timeout_ms = self.handler_timeout.as_millis() as u64,
                    "handler timed out; message left for redelivery"
                );
                Disposition::Redeliver
            }
        }
    }

    /// Delete the message under `delete_timeout`. Failures are only logged.
    async fn acknowledge(&self, message: &InFlightMessage) -> bool {
        let token = message.ack_token();
        match tokio::time::timeout(self.delete_timeout, self.transport.delete(token)).await {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                error!(error = %err, ack_token = %token, "failed to acknowledge message");
                false
            }
            Err(_) => {
                error!(
                    ack_token = %token,
                    timeout_ms = self.delete_timeout.as_millis() as u64,
                    "acknowledgment timed out"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use catalog_core::ProductId;
    use catalog_events::{EventKind, InMemoryQueue, LifecycleEvent, encode};
    use tokio::sync::Notify;

    use crate::shutdown::Shutdown;

    const NO_WAIT: Duration = Duration::ZERO;

    #[derive(Default)]
    struct Recording {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EventHandler for Recording {
        async fn handle(&self, _event: LifecycleEvent) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl EventHandler for Failing {
        async fn handle(&self, _event: LifecycleEvent) -> anyhow::Result<()> {
            anyhow::bail!("downstream unavailable")
        }
    }

    /// Signals when it starts, then sleeps for `delay` and counts completion.
    struct Slow {
        delay: Duration,
        started: Notify,
        finished: AtomicUsize,
    }

    impl Slow {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                started: Notify::new(),
                finished: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EventHandler for Slow {
        async fn handle(&self, _event: LifecycleEvent) -> anyhow::Result<()> {
            self.started.notify_one();
            tokio::time::sleep(self.delay).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Sleeps only for one product id; counts every completed call.
    struct SlowFor {
        slow_id: ProductId,
        delay: Duration,
        handled: AtomicUsize,
    }

    #[async_trait]
    impl EventHandler for SlowFor {
        async fn handle(&self, event: LifecycleEvent) -> anyhow::Result<()> {
            if event.product_id() == self.slow_id {
                tokio::time::sleep(self.delay).await;
            }
            self.handled.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_config() -> ConsumerConfig {
        ConsumerConfig::default()
            .with_wait_time(Duration::from_millis(20))
            .with_retry_delay(Duration::from_millis(10))
            .with_handler_timeout(Duration::from_secs(2))
            .with_delete_timeout(Duration::from_secs(1))
    }

    fn test_processor(queue: Arc<InMemoryQueue>, registry: HandlerRegistry) -> MessageProcessor {
        let config = test_config();
        MessageProcessor {
            transport: queue,
            registry: Arc::new(registry),
            handler_timeout: config.handler_timeout,
            delete_timeout: config.delete_timeout,
        }
    }

    async fn enqueue_and_receive(queue: &InMemoryQueue, body: Vec<u8>) -> InFlightMessage {
        queue.send(body).await.unwrap();
        let mut batch = queue.receive(1, NO_WAIT).await.unwrap();
        batch.remove(0)
    }

    fn created_body() -> Vec<u8> {
        encode(&LifecycleEvent::created(ProductId::new())).unwrap()
    }

    async fn eventually(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn malformed_bodies_are_acknowledged() {
        let queue = Arc::new(InMemoryQueue::new());
        let processor = test_processor(queue.clone(), HandlerRegistry::builder().build());

        for body in [b"".to_vec(), b"{oops".to_vec()] {
            let message = enqueue_and_receive(&queue, body).await;
            assert_eq!(processor.process(message).await, Disposition::Discarded);
        }
        assert!(queue.is_empty());
        assert_eq!(queue.deleted().len(), 2);
    }

    #[tokio::test]
    async fn unknown_event_type_is_acknowledged() {
        let queue = Arc::new(InMemoryQueue::new());
        let processor = test_processor(queue.clone(), HandlerRegistry::builder().build());
        let body = format!(
            r#"{{"event_type":"rename_product","product_id":"{}"}}"#,
            ProductId::new()
        );

        let message = enqueue_and_receive(&queue, body.into_bytes()).await;
        assert_eq!(processor.process(message).await, Disposition::Discarded);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn missing_handler_is_acknowledged() {
        let queue = Arc::new(InMemoryQueue::new());
        let registry = HandlerRegistry::builder()
            .register(EventKind::Deleted, Recording::default())
            .build();
        let processor = test_processor(queue.clone(), registry);

        let message = enqueue_and_receive(&queue, created_body()).await;
        assert_eq!(processor.process(message).await, Disposition::Discarded);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn handler_success_is_acknowledged() {
        let queue = Arc::new(InMemoryQueue::new());
        let handler = Arc::new(Recording::default());
        let registry = HandlerRegistry::builder()
            .register_arc(EventKind::Created, handler.clone())
            .build();
        let processor = test_processor(queue.clone(), registry);

        let message = enqueue_and_receive(&queue, created_body()).await;
        assert_eq!(processor.process(message).await, Disposition::Completed);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn handler_error_leaves_message_unacknowledged() {
        let queue = Arc::new(InMemoryQueue::new());
        let registry = HandlerRegistry::builder()
            .register(EventKind::Created, Failing)
            .build();
        let processor = test_processor(queue.clone(), registry);

        let message = enqueue_and_receive(&queue, created_body()).await;
        assert_eq!(processor.process(message).await, Disposition::Redeliver);
        assert_eq!(queue.leased_len(), 1);
        assert!(queue.deleted().is_empty());
    }

    #[tokio::test]
    async fn handler_timeout_leaves_message_unacknowledged() {
        let queue = Arc::new(InMemoryQueue::new());
        let registry = HandlerRegistry::builder()
            .register(EventKind::Created, Slow::new(Duration::from_secs(5)))
            .build();
        let mut processor = test_processor(queue.clone(), registry);
        processor.handler_timeout = Duration::from_millis(20);

        let message = enqueue_and_receive(&queue, created_body()).await;
        assert_eq!(processor.process(message).await, Disposition::Redeliver);
        assert!(queue.deleted().is_empty());
    }

    #[tokio::test]
    async fn failed_acknowledgment_does_not_change_the_outcome() {
        let queue = Arc::new(InMemoryQueue::new());
        let registry = HandlerRegistry::builder()
            .register(EventKind::Created, Recording::default())
            .build();
        let processor = test_processor(queue.clone(), registry);

        let message = enqueue_and_receive(&queue, created_body()).await;
        queue.fail_next_deletes(1);
        assert_eq!(processor.process(message).await, Disposition::Completed);
        assert_eq!(queue.leased_len(), 1);
    }

    #[tokio::test]
    async fn run_processes_until_shutdown() {
        let queue = Arc::new(InMemoryQueue::new());
        let handler = Arc::new(Recording::default());
        let registry = HandlerRegistry::builder()
            .register_arc(EventKind::Created, handler.clone())
            .build();
        let consumer = QueueConsumer::new(queue.clone(), Arc::new(registry), test_config());
        let shutdown = Shutdown::new();

        for _ in 0..3 {
            queue.send(created_body()).await.unwrap();
        }
        queue.send(b"garbage".to_vec()).await.unwrap();

        let rx = shutdown.subscribe();
        let run = tokio::spawn(async move { consumer.run(rx).await });

        eventually(|| queue.is_empty()).await;
        shutdown.trigger();
        let report = run.await.unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.completed, 3);
        assert_eq!(report.discarded, 1);
    }

    #[tokio::test]
    async fn receive_errors_back_off_and_recover() {
        let queue = Arc::new(InMemoryQueue::new());
        let handler = Arc::new(Recording::default());
        let registry = HandlerRegistry::builder()
            .register_arc(EventKind::Created, handler.clone())
            .build();
        let consumer = QueueConsumer::new(queue.clone(), Arc::new(registry), test_config());
        let shutdown = Shutdown::new();

        queue.fail_next_receives(3);
        queue.send(created_body()).await.unwrap();

        let rx = shutdown.subscribe();
        let run = tokio::spawn(async move { consumer.run(rx).await });

        eventually(|| handler.calls.load(Ordering::SeqCst) == 1).await;
        shutdown.trigger();
        run.await.unwrap();

        assert!(queue.receive_calls() >= 4);
    }

    #[tokio::test]
    async fn shutdown_interrupts_retry_delay() {
        let queue = Arc::new(InMemoryQueue::new());
        queue.fail_next_receives(1);
        let consumer = QueueConsumer::new(
            queue.clone(),
            Arc::new(HandlerRegistry::builder().build()),
            test_config().with_retry_delay(Duration::from_secs(3600)),
        );
        let shutdown = Shutdown::new();

        let rx = shutdown.subscribe();
        let run = tokio::spawn(async move { consumer.run(rx).await });

        eventually(|| queue.receive_calls() == 1).await;
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), run)
            .await
            .expect("consumer did not stop during retry delay")
            .unwrap();
    }

    #[tokio::test]
    async fn drain_waits_for_in_flight_handlers() {
        let queue = Arc::new(InMemoryQueue::new());
        let handler = Arc::new(Slow::new(Duration::from_millis(150)));
        let registry = HandlerRegistry::builder()
            .register_arc(EventKind::Created, handler.clone())
            .build();
        let consumer = QueueConsumer::new(queue.clone(), Arc::new(registry), test_config());
        let shutdown = Shutdown::new();

        queue.send(created_body()).await.unwrap();
        let rx = shutdown.subscribe();
        let run = tokio::spawn(async move { consumer.run(rx).await });

        handler.started.notified().await;
        shutdown.trigger();
        let report = run.await.unwrap();

        // The handler was not cancelled and its message was acknowledged.
        assert_eq!(handler.finished.load(Ordering::SeqCst), 1);
        assert_eq!(report.completed, 1);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn slow_handler_does_not_block_later_messages() {
        let queue = Arc::new(InMemoryQueue::new());
        let slow_id = ProductId::new();
        let handler = Arc::new(SlowFor {
            slow_id,
            delay: Duration::from_millis(1500),
            handled: AtomicUsize::new(0),
        });
        let registry = HandlerRegistry::builder()
            .register_arc(EventKind::Created, handler.clone())
            .build();
        let config = test_config()
            .with_max_messages(1)
            .with_handler_timeout(Duration::from_secs(5));
        let consumer = QueueConsumer::new(queue.clone(), Arc::new(registry), config);
        let shutdown = Shutdown::new();

        queue.send(encode(&LifecycleEvent::created(slow_id)).unwrap()).await.unwrap();
        queue.send(created_body()).await.unwrap();

        let rx = shutdown.subscribe();
        let run = tokio::spawn(async move { consumer.run(rx).await });

        // The second message is handled and acknowledged while the first is still asleep.
        eventually(|| queue.deleted().len() == 1).await;
        assert_eq!(handler.handled.load(Ordering::SeqCst), 1);
        assert_eq!(queue.leased_len(), 1);

        shutdown.trigger();
        let report = run.await.unwrap();

        assert_eq!(report.completed, 2);
        assert_eq!(handler.handled.load(Ordering::SeqCst), 2);
        assert!(queue.is_empty());
    }
}
