//! Dead-letter quarantine for terminally unprocessable messages.
//!
//! Ordering invariant: the DLQ publish always precedes the ack of the
//! original message. If the publish fails, the ack is withheld so the
//! backend's visibility timeout redelivers the original: a duplicate DLQ
//! entry on a later attempt is preferable to losing the message.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use tracing::{error, info, instrument};

use crate::backend::QueueBackend;
use crate::types::{
    ATTR_FAILED_AT, ATTR_FAILURE_REASON, ATTR_ORIGINAL_MESSAGE_ID, AttributeValue, QueueMessage,
    QueueUrl,
};

/// How a quarantine attempt concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DlqOutcome {
    /// Published to the DLQ and the original was acked.
    Quarantined,
    /// The DLQ publish failed; the ack was withheld for redelivery.
    PublishFailed,
}

/// Publishes unprocessable messages to the dead-letter queue.
#[derive(Clone)]
pub struct DlqController {
    queue: Arc<dyn QueueBackend>,
    main_queue: QueueUrl,
    dlq: QueueUrl,
}

impl DlqController {
    pub fn new(queue: Arc<dyn QueueBackend>, main_queue: QueueUrl, dlq: QueueUrl) -> Self {
        DlqController {
            queue,
            main_queue,
            dlq,
        }
    }

    /// Publishes `message` to the DLQ with the failure context, then acks
    /// the original.
    ///
    /// The body is preserved verbatim for out-of-band triage.
    #[instrument(skip(self, message), fields(message_id = %message.message_id))]
    pub async fn quarantine(&self, message: &QueueMessage, reason: &str) -> DlqOutcome {
        let attributes = HashMap::from([
            (
                ATTR_ORIGINAL_MESSAGE_ID.to_string(),
                AttributeValue::String(message.message_id.to_string()),
            ),
            (
                ATTR_FAILURE_REASON.to_string(),
                AttributeValue::String(reason.to_string()),
            ),
            (
                ATTR_FAILED_AT.to_string(),
                AttributeValue::String(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
            ),
        ]);

        if let Err(err) = self
            .queue
            .send(&self.dlq, &message.body, attributes, Duration::ZERO)
            .await
        {
            error!(error = %err, "failed to publish to DLQ, withholding ack");
            return DlqOutcome::PublishFailed;
        }
        info!(reason, "message quarantined to DLQ");

        if let Err(err) = self
            .queue
            .delete(&self.main_queue, &message.receipt_handle)
            .await
        {
            // The DLQ entry exists; a redelivered original will produce a
            // duplicate entry, which at-least-once semantics tolerate.
            error!(error = %err, "failed to ack original after DLQ publish");
        }
        DlqOutcome::Quarantined
    }
}
