//! Core domain types: events, processing envelopes, client policies, and
//! queue messages.

mod event;
mod ids;
mod message;

pub use event::{ClientPolicy, Event, EventStatus, EventType, ProcessedEvent};
pub use ids::{MessageId, QueueUrl, ReceiptHandle};
pub use message::{
    ATTR_FAILED_AT, ATTR_FAILURE_REASON, ATTR_LAST_ERROR, ATTR_ORIGINAL_MESSAGE_ID,
    ATTR_RETRY_COUNT, AttributeValue, QueueMessage,
};
