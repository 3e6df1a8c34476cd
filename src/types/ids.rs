//! Newtype wrappers for queue identifiers.
//!
//! These types prevent accidental mixing of different identifier kinds (e.g.
//! acking with a message id where a receipt handle is expected) and make the
//! backend contracts self-documenting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A backend-assigned message identifier.
///
/// Stable across redeliveries of the same stored message; carried into the
/// DLQ as the `OriginalMessageId` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(s: impl Into<String>) -> Self {
        MessageId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An opaque acknowledgement token for one delivery of a message.
///
/// Unlike [`MessageId`], a receipt handle is scoped to a single delivery:
/// the backend issues a fresh handle every time a message becomes visible
/// again and is re-received.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptHandle(pub String);

impl ReceiptHandle {
    pub fn new(s: impl Into<String>) -> Self {
        ReceiptHandle(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A queue identifier in the backend's addressing scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueUrl(pub String);

impl QueueUrl {
    pub fn new(s: impl Into<String>) -> Self {
        QueueUrl(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
