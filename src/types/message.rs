//! Queue message model and attribute carriage.
//!
//! Attributes are string-keyed and typed as either String or Number; the
//! Number payload is still carried as its decimal string form, matching the
//! wire representation of queue backends.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::ids::{MessageId, ReceiptHandle};

/// Attempt counter attribute set on re-enqueued messages.
pub const ATTR_RETRY_COUNT: &str = "RetryCount";
/// DLQ attribute: the message id of the original delivery.
pub const ATTR_ORIGINAL_MESSAGE_ID: &str = "OriginalMessageId";
/// DLQ attribute: human-readable reason the message was quarantined.
pub const ATTR_FAILURE_REASON: &str = "FailureReason";
/// Retry attribute: the error message of the last failed attempt.
pub const ATTR_LAST_ERROR: &str = "LastError";
/// DLQ attribute: when the message was quarantined (RFC 3339 UTC).
pub const ATTR_FAILED_AT: &str = "FailedAt";

/// A typed message attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum AttributeValue {
    String(String),
    /// A numeric value, carried in decimal string form.
    Number(String),
}

impl AttributeValue {
    pub fn as_str(&self) -> &str {
        match self {
            AttributeValue::String(s) | AttributeValue::Number(s) => s,
        }
    }
}

/// A message received from (or published to) a queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueMessage {
    pub message_id: MessageId,
    /// Acknowledgement token for this delivery.
    pub receipt_handle: ReceiptHandle,
    /// Raw body bytes; for inbound messages, the event JSON.
    pub body: Vec<u8>,
    pub attributes: HashMap<String, AttributeValue>,
}

impl QueueMessage {
    /// Reads the attempt counter from the `RetryCount` attribute.
    ///
    /// Absent or non-numeric values count as 0: a message without a usable
    /// counter is treated as a first delivery rather than rejected.
    pub fn retry_count(&self) -> u32 {
        self.attributes
            .get(ATTR_RETRY_COUNT)
            .and_then(|v| v.as_str().parse().ok())
            .unwrap_or(0)
    }
}
