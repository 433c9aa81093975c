//! Wire codec for lifecycle events.
//!
//! Both services agree on one JSON envelope:
//!
//! ```text
//! {"event_type": "create_product" | "delete_product", "product_id": "<uuid>"}
//! ```
//!
//! Decoding distinguishes an empty body, a body that is not a valid envelope,
//! and a valid envelope whose `event_type` is unknown. The consumer treats all
//! three as permanent failures.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use catalog_core::ProductId;

use crate::event::{EventKind, LifecycleEvent};

#[derive(Debug, Error)]
#[error("failed to encode lifecycle event: {0}")]
pub struct EncodeError(#[from] serde_json::Error);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("message body is empty")]
    Empty,

    #[error("malformed event envelope: {0}")]
    Malformed(String),

    #[error("unknown event type: {0}")]
    UnknownEventType(String),
}

#[derive(Serialize)]
struct WireOut<'a> {
    event_type: &'a str,
    product_id: &'a Uuid,
}

#[derive(Deserialize)]
struct WireIn {
    event_type: String,
    product_id: String,
}

pub fn encode(event: &LifecycleEvent) -> Result<Vec<u8>, EncodeError> {
    let id = event.product_id();
    let wire = WireOut {
        event_type: event.kind().as_wire(),
        product_id: id.as_uuid(),
    };
    Ok(serde_json::to_vec(&wire)?)
}

pub fn decode(body: &[u8]) -> Result<LifecycleEvent, DecodeError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(DecodeError::Empty);
    }

    let wire: WireIn =
        serde_json::from_slice(body).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let kind = EventKind::from_wire(&wire.event_type)
        .ok_or_else(|| DecodeError::UnknownEventType(wire.event_type.clone()))?;

    let product_id = Uuid::parse_str(&wire.product_id)
        .map(ProductId::from_uuid)
        .map_err(|e| DecodeError::Malformed(format!("product_id: {e}")))?;

    Ok(LifecycleEvent::new(kind, product_id))
}
