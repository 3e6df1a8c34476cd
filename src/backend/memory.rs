//! Process-local implementation of both backend contracts.
//!
//! The queue implements long poll, delivery delay, and visibility-timeout
//! redelivery over plain in-process collections; the store keeps items and
//! policies in maps. The binary uses this backend for local runs; tests use
//! it wherever real queue semantics (delays, redelivery, DLQ contents)
//! matter.
//!
//! Timing uses `tokio::time`, so tests running with a paused clock can step
//! through delays and visibility expiry deterministically.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::record::RecordItem;
use crate::types::{
    AttributeValue, ClientPolicy, MessageId, QueueMessage, QueueUrl, ReceiptHandle,
};

use super::queue::{QueueBackend, QueueError};
use super::store::{RecordStore, StoreError};

/// Default visibility timeout for received messages.
const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

/// Granularity of the long-poll wait when no send wakes it earlier.
const POLL_STEP: Duration = Duration::from_millis(50);

/// A message at rest in a queue.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub message_id: MessageId,
    pub body: Vec<u8>,
    pub attributes: HashMap<String, AttributeValue>,
}

#[derive(Debug)]
struct Delayed {
    ready_at: Instant,
    queue: QueueUrl,
    message: StoredMessage,
}

#[derive(Debug)]
struct InFlight {
    queue: QueueUrl,
    message: StoredMessage,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct QueueState {
    queues: HashMap<QueueUrl, VecDeque<StoredMessage>>,
    delayed: Vec<Delayed>,
    in_flight: HashMap<ReceiptHandle, InFlight>,
    next_seq: u64,
}

impl QueueState {
    /// Promotes due delayed messages and redelivers expired in-flight ones.
    fn promote(&mut self, now: Instant) {
        let mut still_delayed = Vec::new();
        for entry in self.delayed.drain(..) {
            if entry.ready_at <= now {
                self.queues
                    .entry(entry.queue)
                    .or_default()
                    .push_back(entry.message);
            } else {
                still_delayed.push(entry);
            }
        }
        self.delayed = still_delayed;

        let expired: Vec<ReceiptHandle> = self
            .in_flight
            .iter()
            .filter(|(_, f)| f.expires_at <= now)
            .map(|(handle, _)| handle.clone())
            .collect();
        for handle in expired {
            if let Some(flight) = self.in_flight.remove(&handle) {
                self.queues
                    .entry(flight.queue)
                    .or_default()
                    .push_back(flight.message);
            }
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

/// In-memory queue family: the main queue plus the DLQ.
///
/// `receive` serves the main queue only; `send` accepts any registered
/// queue.
pub struct InMemoryQueue {
    main: QueueUrl,
    visibility_timeout: Duration,
    state: Mutex<QueueState>,
    sent: Notify,
}

impl InMemoryQueue {
    pub fn new(main: QueueUrl, dlq: QueueUrl) -> Self {
        let mut queues = HashMap::new();
        queues.insert(main.clone(), VecDeque::new());
        queues.insert(dlq, VecDeque::new());
        InMemoryQueue {
            main,
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
            state: Mutex::new(QueueState {
                queues,
                ..QueueState::default()
            }),
            sent: Notify::new(),
        }
    }

    /// Overrides the visibility timeout (tests exercising redelivery).
    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    pub fn main_queue(&self) -> &QueueUrl {
        &self.main
    }

    /// Snapshot of the messages currently at rest in `queue` (excludes
    /// delayed and in-flight messages).
    pub async fn peek(&self, queue: &QueueUrl) -> Vec<StoredMessage> {
        let state = self.state.lock().await;
        state
            .queues
            .get(queue)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of messages currently invisible pending a delivery delay.
    pub async fn delayed_len(&self) -> usize {
        self.state.lock().await.delayed.len()
    }
}

#[async_trait]
impl QueueBackend for InMemoryQueue {
    async fn receive(&self, max: usize, wait: Duration) -> Result<Vec<QueueMessage>, QueueError> {
        let deadline = Instant::now() + wait;
        loop {
            {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                state.promote(now);

                let available = state
                    .queues
                    .get(&self.main)
                    .map(|q| q.len())
                    .unwrap_or_default();
                if available > 0 {
                    let take = available.min(max);
                    let mut batch = Vec::with_capacity(take);
                    for _ in 0..take {
                        let message = match state
                            .queues
                            .get_mut(&self.main)
                            .and_then(VecDeque::pop_front)
                        {
                            Some(m) => m,
                            None => break,
                        };
                        let handle = ReceiptHandle::new(format!("r-{}", state.next_seq()));
                        batch.push(QueueMessage {
                            message_id: message.message_id.clone(),
                            receipt_handle: handle.clone(),
                            body: message.body.clone(),
                            attributes: message.attributes.clone(),
                        });
                        state.in_flight.insert(
                            handle,
                            InFlight {
                                queue: self.main.clone(),
                                message,
                                expires_at: now + self.visibility_timeout,
                            },
                        );
                    }
                    return Ok(batch);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            let step = POLL_STEP.min(deadline - now);
            tokio::select! {
                _ = self.sent.notified() => {}
                _ = tokio::time::sleep(step) => {}
            }
        }
    }

    async fn send(
        &self,
        queue: &QueueUrl,
        body: &[u8],
        attributes: HashMap<String, AttributeValue>,
        delay: Duration,
    ) -> Result<MessageId, QueueError> {
        let mut state = self.state.lock().await;
        if !state.queues.contains_key(queue) {
            return Err(QueueError::Send {
                queue: queue.clone(),
                reason: "unknown queue".to_string(),
            });
        }

        let message = StoredMessage {
            message_id: MessageId::new(format!("m-{}", state.next_seq())),
            body: body.to_vec(),
            attributes,
        };
        let id = message.message_id.clone();

        if delay.is_zero() {
            state
                .queues
                .entry(queue.clone())
                .or_default()
                .push_back(message);
        } else {
            state.delayed.push(Delayed {
                ready_at: Instant::now() + delay,
                queue: queue.clone(),
                message,
            });
        }
        drop(state);

        self.sent.notify_waiters();
        Ok(id)
    }

    async fn delete(
        &self,
        queue: &QueueUrl,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let owned_here = state
            .in_flight
            .get(receipt_handle)
            .is_some_and(|flight| &flight.queue == queue);
        if owned_here {
            state.in_flight.remove(receipt_handle);
        }
        // An expired handle was already redelivered; deleting it is a
        // no-op, matching the lenient semantics of real queue backends.
        Ok(())
    }
}

/// In-memory record store: processed events keyed by event id, policies
/// keyed by client id.
#[derive(Default)]
pub struct InMemoryStore {
    events: Mutex<HashMap<String, RecordItem>>,
    policies: Mutex<HashMap<String, ClientPolicy>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_policy(&self, policy: ClientPolicy) {
        self.policies
            .lock()
            .await
            .insert(policy.client_id.clone(), policy);
    }

    /// Snapshot of every stored event item.
    pub async fn events(&self) -> Vec<RecordItem> {
        self.events.lock().await.values().cloned().collect()
    }

    pub async fn event(&self, event_id: &str) -> Option<RecordItem> {
        self.events.lock().await.get(event_id).cloned()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn put_processed_event(&self, item: RecordItem) -> Result<(), StoreError> {
        let event_id = item
            .get("event_id")
            .and_then(|v| v.as_s())
            .ok_or_else(|| StoreError::Backend("item is missing the event_id key".to_string()))?
            .to_string();
        self.events.lock().await.insert(event_id, item);
        Ok(())
    }

    async fn get_client_policy(&self, client_id: &str) -> Result<ClientPolicy, StoreError> {
        self.policies
            .lock()
            .await
            .get(client_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("client policy: {client_id}")))
    }

    async fn health_probe(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_queue_urls;

    fn queue() -> InMemoryQueue {
        let (main, dlq) = test_queue_urls();
        InMemoryQueue::new(main, dlq)
    }

    #[tokio::test]
    async fn send_then_receive_round_trips() {
        let q = queue();
        let main = q.main_queue().clone();

        q.send(&main, b"hello", HashMap::new(), Duration::ZERO)
            .await
            .unwrap();

        let batch = q.receive(10, Duration::ZERO).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].body, b"hello");
    }

    #[tokio::test]
    async fn receive_respects_max() {
        let q = queue();
        let main = q.main_queue().clone();
        for i in 0..5 {
            q.send(&main, format!("m{i}").as_bytes(), HashMap::new(), Duration::ZERO)
                .await
                .unwrap();
        }

        let batch = q.receive(2, Duration::ZERO).await.unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[tokio::test]
    async fn received_messages_are_invisible_until_timeout() {
        let q = queue();
        let main = q.main_queue().clone();
        q.send(&main, b"x", HashMap::new(), Duration::ZERO)
            .await
            .unwrap();

        let first = q.receive(10, Duration::ZERO).await.unwrap();
        assert_eq!(first.len(), 1);

        // Still in flight: a second receive sees nothing.
        let second = q.receive(10, Duration::ZERO).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_in_flight_messages_are_redelivered() {
        let q = queue().with_visibility_timeout(Duration::from_secs(30));
        let main = q.main_queue().clone();
        q.send(&main, b"x", HashMap::new(), Duration::ZERO)
            .await
            .unwrap();

        let first = q.receive(10, Duration::ZERO).await.unwrap();
        assert_eq!(first.len(), 1);

        tokio::time::advance(Duration::from_secs(31)).await;

        let second = q.receive(10, Duration::ZERO).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].message_id, first[0].message_id);
        assert_ne!(
            second[0].receipt_handle, first[0].receipt_handle,
            "redelivery issues a fresh receipt handle"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_sends_become_visible_after_the_delay() {
        let q = queue();
        let main = q.main_queue().clone();
        q.send(&main, b"later", HashMap::new(), Duration::from_secs(4))
            .await
            .unwrap();

        assert!(q.receive(10, Duration::ZERO).await.unwrap().is_empty());
        assert_eq!(q.delayed_len().await, 1);

        tokio::time::advance(Duration::from_secs(5)).await;

        let batch = q.receive(10, Duration::ZERO).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].body, b"later");
    }

    #[tokio::test]
    async fn delete_acks_an_in_flight_message_for_good() {
        let q = queue().with_visibility_timeout(Duration::from_millis(1));
        let main = q.main_queue().clone();
        q.send(&main, b"x", HashMap::new(), Duration::ZERO)
            .await
            .unwrap();

        let batch = q.receive(10, Duration::ZERO).await.unwrap();
        q.delete(&main, &batch[0].receipt_handle).await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(q.receive(10, Duration::ZERO).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_to_unknown_queue_fails() {
        let q = queue();
        let result = q
            .send(
                &QueueUrl::new("local://nope"),
                b"x",
                HashMap::new(),
                Duration::ZERO,
            )
            .await;
        assert!(matches!(result, Err(QueueError::Send { .. })));
    }

    #[tokio::test]
    async fn store_policy_lookup_distinguishes_not_found() {
        let store = InMemoryStore::new();
        let err = store.get_client_policy("ghost").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn store_put_requires_event_id() {
        let store = InMemoryStore::new();
        let err = store.put_processed_event(RecordItem::new()).await.unwrap_err();
        assert!(!err.is_not_found());
    }
}
