//! AWS SQS transport.
//!
//! One `SqsQueue` is bound to one queue URL. The client endpoint is taken from
//! the broker settings or, failing that, from the scheme and host of the queue
//! URL, so LocalStack/ElasticMQ URLs work without extra configuration.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::Client as SqsClient;
use aws_sdk_sqs::error::DisplayErrorContext;
use thiserror::Error;
use tracing::{info, instrument, warn};

use catalog_events::{AckToken, InFlightMessage, QueueTransport, TransportError};

use crate::config::BrokerSettings;

/// SQS accepts 1..=10 messages per receive.
const SQS_MAX_BATCH: u32 = 10;
/// SQS long polling tops out at 20 seconds.
const SQS_MAX_WAIT_SECONDS: u64 = 20;

#[derive(Debug, Error)]
pub enum SqsSetupError {
    #[error("invalid queue url {url}: {reason}")]
    InvalidQueueUrl { url: String, reason: &'static str },

    #[error("queue {queue} is not reachable: {cause}")]
    QueueLookup { queue: String, cause: String },
}

#[derive(Debug, Clone)]
pub struct SqsQueue {
    client: SqsClient,
    queue_url: String,
}

impl SqsQueue {
    /// Wrap an existing client. No reachability check is made.
    pub fn new(client: SqsClient, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    /// Build a client from the broker settings and verify the queue exists.
    pub async fn connect(settings: &BrokerSettings) -> Result<Self, SqsSetupError> {
        let (derived_endpoint, queue_name) = split_queue_url(&settings.queue_url)?;
        let endpoint = settings.endpoint_url.clone().unwrap_or(derived_endpoint);

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(settings.region.clone()))
            .endpoint_url(&endpoint)
            .load()
            .await;
        let client = SqsClient::new(&aws_config);

        client
            .get_queue_url()
            .queue_name(&queue_name)
            .send()
            .await
            .map_err(|e| SqsSetupError::QueueLookup {
                queue: queue_name.clone(),
                cause: DisplayErrorContext(&e).to_string(),
            })?;

        info!(
            region = %settings.region,
            endpoint = %endpoint,
            queue = %queue_name,
            "connected to SQS"
        );

        Ok(Self::new(client, settings.queue_url.clone()))
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

#[async_trait]
impl QueueTransport for SqsQueue {
    #[instrument(skip(self, body), fields(queue_url = %self.queue_url, bytes = body.len()), err)]
    async fn send(&self, body: Vec<u8>) -> Result<(), TransportError> {
        let body = String::from_utf8(body)
            .map_err(|e| TransportError::Send(format!("message body is not UTF-8: {e}")))?;

        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| TransportError::Send(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn receive(
        &self,
        max_messages: u32,
        wait: Duration,
    ) -> Result<Vec<InFlightMessage>, TransportError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages.clamp(1, SQS_MAX_BATCH) as i32)
            .wait_time_seconds(wait.as_secs().min(SQS_MAX_WAIT_SECONDS) as i32)
            .send()
            .await
            .map_err(|e| TransportError::Receive(DisplayErrorContext(&e).to_string()))?;

        let mut batch = Vec::new();
        for message in output.messages() {
            let Some(receipt) = message.receipt_handle() else {
                warn!(message_id = ?message.message_id(), "SQS message without receipt handle; skipping");
                continue;
            };
            let body = message.body().unwrap_or_default().as_bytes().to_vec();
            batch.push(InFlightMessage::new(body, AckToken::new(receipt)));
        }
        Ok(batch)
    }

    async fn delete(&self, token: &AckToken) -> Result<(), TransportError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(token.as_str())
            .send()
            .await
            .map_err(|e| TransportError::Delete(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}

/// Split `scheme://host[:port]/account/name` into the endpoint and queue name.
fn split_queue_url(queue_url: &str) -> Result<(String, String), SqsSetupError> {
    let invalid = |reason| SqsSetupError::InvalidQueueUrl {
        url: queue_url.to_owned(),
        reason,
    };

    let (scheme, rest) = queue_url.split_once("://").ok_or_else(|| invalid("missing scheme"))?;
    let (host, path) = rest.split_once('/').ok_or_else(|| invalid("missing queue path"))?;
    if host.is_empty() {
        return Err(invalid("missing host"));
    }
    let name = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| invalid("missing queue name"))?;

    Ok((format!("{scheme}://{host}"), name.to_owned()))
}
