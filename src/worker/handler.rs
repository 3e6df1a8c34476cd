//! Message-level handling: maps pipeline outcomes onto queue operations.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::backend::QueueBackend;
use crate::types::{QueueMessage, QueueUrl};

use super::dlq::{DlqController, DlqOutcome};
use super::processor::EventProcessor;
use super::retry::{RetryController, RetryOutcome};

/// Terminal disposition of one handled message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// The pipeline succeeded and the message was acked.
    Acked,
    /// Transient failure; a replacement message was enqueued and the
    /// original acked.
    Requeued,
    /// Terminal failure; published to the DLQ and the original acked.
    DeadLettered,
    /// A queue operation in the failure path failed; the ack was withheld
    /// so the backend redelivers.
    AckWithheld,
}

/// Handles one received message end-to-end.
///
/// Owns the message for the duration of processing and guarantees it ends
/// in exactly one of the [`HandleOutcome`] dispositions.
pub struct MessageWorker {
    processor: EventProcessor,
    retry: RetryController,
    dlq: DlqController,
    queue: Arc<dyn QueueBackend>,
    main_queue: QueueUrl,
}

impl MessageWorker {
    pub fn new(
        processor: EventProcessor,
        retry: RetryController,
        dlq: DlqController,
        queue: Arc<dyn QueueBackend>,
        main_queue: QueueUrl,
    ) -> Self {
        MessageWorker {
            processor,
            retry,
            dlq,
            queue,
            main_queue,
        }
    }

    #[instrument(skip(self, message), fields(message_id = %message.message_id))]
    pub async fn handle(&self, message: QueueMessage) -> HandleOutcome {
        let attempts = message.retry_count();

        match self.processor.process(&message.body, attempts).await {
            Ok(_envelope) => {
                self.ack(&message).await;
                info!("message processed and acked");
                HandleOutcome::Acked
            }
            Err(err) if err.is_terminal() => {
                // Bad input cannot be fixed by retrying; it goes straight
                // to the DLQ without burning the retry budget.
                warn!(error = %err, "terminal failure, quarantining");
                match self.dlq.quarantine(&message, &err.to_string()).await {
                    DlqOutcome::Quarantined => HandleOutcome::DeadLettered,
                    DlqOutcome::PublishFailed => HandleOutcome::AckWithheld,
                }
            }
            Err(err) => {
                warn!(error = %err, attempts, "transient failure");
                match self.retry.on_failure(&message, attempts, &err.to_string()).await {
                    RetryOutcome::Requeued { .. } => HandleOutcome::Requeued,
                    RetryOutcome::DeadLettered => HandleOutcome::DeadLettered,
                    RetryOutcome::AckWithheld => HandleOutcome::AckWithheld,
                }
            }
        }
    }

    async fn ack(&self, message: &QueueMessage) {
        if let Err(err) = self
            .queue
            .delete(&self.main_queue, &message.receipt_handle)
            .await
        {
            // Redelivery will reprocess; at-least-once tolerates that.
            error!(error = %err, "failed to ack processed message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorize::Authorizer;
    use crate::record::EventWriter;
    use crate::test_utils::{
        QueueOp, RecordingQueue, ScriptedStore, client_policy, event_body,
        message_with_attributes, message_with_body, sample_event_body, schema_path,
        test_queue_urls,
    };
    use crate::types::{ATTR_RETRY_COUNT, AttributeValue, EventType};
    use crate::validator::SchemaValidator;

    use std::collections::HashMap;
    use std::time::Duration;

    fn worker(queue: Arc<RecordingQueue>, store: Arc<ScriptedStore>) -> MessageWorker {
        let (main, dlq_url) = test_queue_urls();
        let validator = Arc::new(SchemaValidator::new(schema_path()).unwrap());
        let processor = EventProcessor::new(
            validator,
            Authorizer::new(store.clone()),
            EventWriter::new(store),
        );
        let dlq = DlqController::new(queue.clone(), main.clone(), dlq_url);
        let retry = RetryController::new(queue.clone(), main.clone(), 3, dlq.clone());
        MessageWorker::new(processor, retry, dlq, queue, main)
    }

    // ─── Success path ───

    #[tokio::test]
    async fn success_acks_without_retry_or_dlq() {
        let queue = Arc::new(RecordingQueue::new());
        let store = Arc::new(ScriptedStore::new().with_policy(client_policy(
            "client-001",
            vec![EventType::Monitoring],
            true,
        )));
        let outcome = worker(queue.clone(), store.clone())
            .handle(message_with_body(sample_event_body()))
            .await;

        assert_eq!(outcome, HandleOutcome::Acked);
        assert_eq!(store.puts().len(), 1);

        let ops = queue.ops();
        assert_eq!(ops.len(), 1, "exactly one queue op: the ack");
        assert!(matches!(ops[0], QueueOp::Delete { .. }));
    }

    #[tokio::test]
    async fn denial_is_persisted_then_acked_with_no_retry_or_dlq() {
        let queue = Arc::new(RecordingQueue::new());
        let store = Arc::new(ScriptedStore::new().with_policy(client_policy(
            "client-001",
            vec![EventType::Monitoring],
            false,
        )));
        let outcome = worker(queue.clone(), store.clone())
            .handle(message_with_body(sample_event_body()))
            .await;

        assert_eq!(outcome, HandleOutcome::Acked);
        let puts = store.puts();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0]["status"].as_s(), Some("failed"));
        assert!(puts[0]["error_msg"].as_s().unwrap().contains("not active"));

        let ops = queue.ops();
        assert_eq!(ops.len(), 1);
        assert!(matches!(ops[0], QueueOp::Delete { .. }));
    }

    // ─── Terminal failures ───

    #[tokio::test]
    async fn bad_json_goes_straight_to_the_dlq() {
        let queue = Arc::new(RecordingQueue::new());
        let store = Arc::new(ScriptedStore::new());
        let (main, dlq_url) = test_queue_urls();

        let outcome = worker(queue.clone(), store.clone())
            .handle(message_with_body(b"{not json".to_vec()))
            .await;

        assert_eq!(outcome, HandleOutcome::DeadLettered);
        assert!(store.puts().is_empty(), "no record-store writes");
        assert!(queue.sends_to(&main).is_empty(), "no retries");
        assert_eq!(queue.sends_to(&dlq_url).len(), 1);
        assert_eq!(queue.deletes().len(), 1);
    }

    #[tokio::test]
    async fn missing_triage_field_goes_straight_to_the_dlq() {
        let queue = Arc::new(RecordingQueue::new());
        let store = Arc::new(ScriptedStore::new());
        let (main, dlq_url) = test_queue_urls();
        let body = event_body(
            "transaction",
            serde_json::json!({"transactionId": "t1", "amount": 100}),
        );

        let outcome = worker(queue.clone(), store)
            .handle(message_with_body(body))
            .await;

        assert_eq!(outcome, HandleOutcome::DeadLettered);
        assert!(queue.sends_to(&main).is_empty());
        assert_eq!(queue.sends_to(&dlq_url).len(), 1);
    }

    // ─── Transient failures ───

    #[tokio::test]
    async fn persist_failure_requeues_with_incremented_counter() {
        let queue = Arc::new(RecordingQueue::new());
        let store = Arc::new(ScriptedStore::new());
        store.fail_puts(1);
        let (main, _) = test_queue_urls();

        let outcome = worker(queue.clone(), store)
            .handle(message_with_body(sample_event_body()))
            .await;

        assert_eq!(outcome, HandleOutcome::Requeued);
        let sends = queue.sends_to(&main);
        assert_eq!(sends.len(), 1);
        match &sends[0] {
            QueueOp::Send {
                attributes, delay, ..
            } => {
                assert_eq!(
                    attributes[ATTR_RETRY_COUNT],
                    AttributeValue::Number("1".to_string())
                );
                assert_eq!(*delay, Duration::from_secs(2));
            }
            other => panic!("expected send, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn arrival_at_the_budget_gets_one_more_attempt_before_dlq() {
        // RetryCount == max_retries: the attempt still runs; only its
        // failure dead-letters the message.
        let queue = Arc::new(RecordingQueue::new());
        let store = Arc::new(ScriptedStore::new());
        store.fail_puts(1);
        let (_, dlq_url) = test_queue_urls();
        let message = message_with_attributes(HashMap::from([(
            ATTR_RETRY_COUNT.to_string(),
            AttributeValue::Number("3".to_string()),
        )]));

        let outcome = worker(queue.clone(), store).handle(message).await;

        assert_eq!(outcome, HandleOutcome::DeadLettered);
        assert_eq!(queue.sends_to(&dlq_url).len(), 1);
    }

    #[tokio::test]
    async fn arrival_at_the_budget_still_acks_on_success() {
        let queue = Arc::new(RecordingQueue::new());
        let store = Arc::new(ScriptedStore::new());
        let (main, dlq_url) = test_queue_urls();
        let message = message_with_attributes(HashMap::from([(
            ATTR_RETRY_COUNT.to_string(),
            AttributeValue::Number("3".to_string()),
        )]));

        let outcome = worker(queue.clone(), store.clone()).handle(message).await;

        assert_eq!(outcome, HandleOutcome::Acked);
        assert_eq!(store.puts()[0]["retry_count"].as_n(), Some("3"));
        assert!(queue.sends_to(&main).is_empty());
        assert!(queue.sends_to(&dlq_url).is_empty());
    }

    #[tokio::test]
    async fn dlq_publish_failure_withholds_the_ack() {
        let queue = Arc::new(RecordingQueue::new());
        queue.fail_sends(1);
        let store = Arc::new(ScriptedStore::new());

        let outcome = worker(queue.clone(), store)
            .handle(message_with_body(b"{not json".to_vec()))
            .await;

        assert_eq!(outcome, HandleOutcome::AckWithheld);
        assert!(queue.deletes().is_empty());
    }
}
