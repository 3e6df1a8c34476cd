//! Retry control: attempt accounting, exponential backoff, re-enqueue.
//!
//! # Threshold semantics
//!
//! A message is always attempted before any retry decision: the controller
//! only runs after a failed attempt. A message that arrives already at
//! `RetryCount == max_retries` is therefore processed once more: if that
//! attempt succeeds it is acked like any other, and only if it fails is it
//! dead-lettered. The alternative (dead-lettering on sight at the
//! threshold) silently discards a message that might have succeeded.
//!
//! # Backoff
//!
//! The re-enqueue path publishes a new message to the main queue with the
//! backend's delivery delay rather than sleeping a worker:
//! `min(2^(attempts+1) seconds, 300 seconds)`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, instrument, warn};

use crate::backend::QueueBackend;
use crate::types::{ATTR_LAST_ERROR, ATTR_RETRY_COUNT, AttributeValue, QueueMessage, QueueUrl};

use super::dlq::{DlqController, DlqOutcome};

/// Upper bound on the re-enqueue delivery delay.
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Delay before the given re-enqueue attempt (1-indexed): `2^attempt`
/// seconds, capped at [`MAX_BACKOFF`].
pub fn backoff_delay(attempt: u32) -> Duration {
    // 2^9 = 512 already exceeds the cap; avoid shifting further.
    if attempt >= 9 {
        return MAX_BACKOFF;
    }
    Duration::from_secs((1u64 << attempt).min(MAX_BACKOFF.as_secs()))
}

/// How a failure was routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Re-enqueued with the given attempt counter and delivery delay.
    Requeued { next_attempt: u32, delay: Duration },
    /// Retry budget exhausted; quarantined to the DLQ.
    DeadLettered,
    /// A queue operation failed; the ack was withheld for redelivery.
    AckWithheld,
}

/// Routes failed attempts to re-enqueue or the DLQ.
pub struct RetryController {
    queue: Arc<dyn QueueBackend>,
    main_queue: QueueUrl,
    max_retries: u32,
    dlq: DlqController,
}

impl RetryController {
    pub fn new(
        queue: Arc<dyn QueueBackend>,
        main_queue: QueueUrl,
        max_retries: u32,
        dlq: DlqController,
    ) -> Self {
        RetryController {
            queue,
            main_queue,
            max_retries,
            dlq,
        }
    }

    /// Handles a failed processing attempt.
    ///
    /// `attempts` is the counter read from the incoming message. At or past
    /// the budget the message is dead-lettered; otherwise a new message
    /// with `RetryCount = attempts + 1` and the backoff delay replaces the
    /// original, which is acked.
    #[instrument(skip(self, message, error), fields(message_id = %message.message_id, attempts))]
    pub async fn on_failure(
        &self,
        message: &QueueMessage,
        attempts: u32,
        error: &str,
    ) -> RetryOutcome {
        if attempts >= self.max_retries {
            warn!(max_retries = self.max_retries, "retry budget exhausted");
            return match self
                .dlq
                .quarantine(message, &format!("max retries exceeded: {error}"))
                .await
            {
                DlqOutcome::Quarantined => RetryOutcome::DeadLettered,
                DlqOutcome::PublishFailed => RetryOutcome::AckWithheld,
            };
        }

        let next_attempt = attempts + 1;
        let delay = backoff_delay(next_attempt);
        let attributes = HashMap::from([
            (
                ATTR_RETRY_COUNT.to_string(),
                AttributeValue::Number(next_attempt.to_string()),
            ),
            (
                ATTR_LAST_ERROR.to_string(),
                AttributeValue::String(error.to_string()),
            ),
        ]);

        if let Err(err) = self
            .queue
            .send(&self.main_queue, &message.body, attributes, delay)
            .await
        {
            error!(error = %err, "failed to re-enqueue, withholding ack");
            return RetryOutcome::AckWithheld;
        }
        info!(next_attempt, delay_secs = delay.as_secs(), "message re-enqueued");

        if let Err(err) = self
            .queue
            .delete(&self.main_queue, &message.receipt_handle)
            .await
        {
            // The replacement exists; a redelivered original means one
            // extra attempt, which at-least-once semantics tolerate.
            error!(error = %err, "failed to ack original after re-enqueue");
        }
        RetryOutcome::Requeued {
            next_attempt,
            delay,
        }
    }
}
