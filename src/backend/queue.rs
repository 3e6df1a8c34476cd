//! The message-queue contract.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{AttributeValue, MessageId, QueueMessage, QueueUrl, ReceiptHandle};

/// Errors surfaced by queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The long-poll receive failed.
    #[error("receive failed: {0}")]
    Receive(String),

    /// Publishing a message failed.
    #[error("send to {queue} failed: {reason}")]
    Send { queue: QueueUrl, reason: String },

    /// Deleting (acking) a message failed.
    #[error("delete failed: {0}")]
    Delete(String),
}

/// A message queue with long-poll receive and visibility-timeout semantics.
///
/// # Contract
///
/// - `receive` returns messages from the main queue and hides each returned
///   message from other receivers for the backend's visibility timeout; a
///   message that is neither deleted nor past its timeout is owned by the
///   receiver that holds its receipt handle.
/// - `send` publishes to any queue the backend knows; a non-zero `delay`
///   keeps the message invisible until the delay elapses.
/// - `delete` acknowledges one delivery by its receipt handle.
///
/// Implementations must be safe for concurrent use: the receiver task and
/// every worker share one client.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Long-polls the main queue, blocking up to `wait` for messages.
    ///
    /// Returns at most `max` messages; an empty vec means the wait elapsed
    /// without traffic.
    async fn receive(&self, max: usize, wait: Duration) -> Result<Vec<QueueMessage>, QueueError>;

    /// Publishes `body` to `queue` with the given attributes, invisible for
    /// `delay`.
    async fn send(
        &self,
        queue: &QueueUrl,
        body: &[u8],
        attributes: HashMap<String, AttributeValue>,
        delay: Duration,
    ) -> Result<MessageId, QueueError>;

    /// Acknowledges one delivery, removing the message from `queue`.
    async fn delete(&self, queue: &QueueUrl, receipt_handle: &ReceiptHandle)
    -> Result<(), QueueError>;
}
