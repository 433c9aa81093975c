//! Queue transport adapters.

pub mod sqs;

pub use sqs::{SqsQueue, SqsSetupError};
