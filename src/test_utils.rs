//! Shared test fixtures and recording backend doubles.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::backend::{QueueBackend, QueueError, RecordStore, StoreError};
use crate::record::RecordItem;
use crate::types::{
    AttributeValue, ClientPolicy, Event, EventType, MessageId, QueueMessage, QueueUrl,
    ReceiptHandle,
};

/// Path to the event schema shipped with the crate.
pub fn schema_path() -> PathBuf {
    PathBuf::from(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/schemas/event-schema.json"
    ))
}

pub fn test_queue_urls() -> (QueueUrl, QueueUrl) {
    (
        QueueUrl::new("local://event-queue"),
        QueueUrl::new("local://event-dlq"),
    )
}

/// The scenario event used across tests: a high-severity monitoring event.
pub fn sample_event() -> Event {
    Event {
        event_id: "11111111-1111-1111-1111-111111111111".to_string(),
        event_type: EventType::Monitoring,
        client_id: "client-001".to_string(),
        timestamp: Utc.with_ymd_and_hms(2025, 1, 21, 10, 0, 0).unwrap(),
        payload: match serde_json::json!({"severity": "high", "message": "disk"}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        },
        version: "1.0".to_string(),
    }
}

/// The wire body of [`sample_event`].
pub fn sample_event_body() -> Vec<u8> {
    event_body("monitoring", serde_json::json!({"severity": "high", "message": "disk"}))
}

/// Builds a schema-valid event body with the given type and payload.
pub fn event_body(event_type: &str, payload: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "eventId": "11111111-1111-1111-1111-111111111111",
        "eventType": event_type,
        "clientId": "client-001",
        "timestamp": "2025-01-21T10:00:00Z",
        "payload": payload,
        "version": "1.0"
    }))
    .unwrap()
}

pub fn message_with_body(body: impl Into<Vec<u8>>) -> QueueMessage {
    QueueMessage {
        message_id: MessageId::new("m-1"),
        receipt_handle: ReceiptHandle::new("r-1"),
        body: body.into(),
        attributes: HashMap::new(),
    }
}

pub fn message_with_attributes(attributes: HashMap<String, AttributeValue>) -> QueueMessage {
    QueueMessage {
        attributes,
        ..message_with_body(sample_event_body())
    }
}

pub fn client_policy(client_id: &str, allowed_types: Vec<EventType>, active: bool) -> ClientPolicy {
    ClientPolicy {
        client_id: client_id.to_string(),
        allowed_types,
        active,
        config: HashMap::new(),
    }
}

/// Everything a [`RecordingQueue`] was asked to do, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueOp {
    Send {
        queue: QueueUrl,
        body: Vec<u8>,
        attributes: HashMap<String, AttributeValue>,
        delay: Duration,
    },
    Delete {
        queue: QueueUrl,
        receipt_handle: ReceiptHandle,
    },
}

/// Queue double that records sends and deletes in order.
///
/// `receive` always returns an empty batch: worker-level tests hand
/// messages to the worker directly.
#[derive(Default)]
pub struct RecordingQueue {
    ops: Mutex<Vec<QueueOp>>,
    failing_sends: AtomicUsize,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` sends fail.
    pub fn fail_sends(&self, n: usize) {
        self.failing_sends.store(n, Ordering::SeqCst);
    }

    pub fn ops(&self) -> Vec<QueueOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn sends_to(&self, queue: &QueueUrl) -> Vec<QueueOp> {
        self.ops()
            .into_iter()
            .filter(|op| matches!(op, QueueOp::Send { queue: q, .. } if q == queue))
            .collect()
    }

    pub fn deletes(&self) -> Vec<QueueOp> {
        self.ops()
            .into_iter()
            .filter(|op| matches!(op, QueueOp::Delete { .. }))
            .collect()
    }
}

#[async_trait]
impl QueueBackend for RecordingQueue {
    async fn receive(&self, _max: usize, _wait: Duration) -> Result<Vec<QueueMessage>, QueueError> {
        Ok(Vec::new())
    }

    async fn send(
        &self,
        queue: &QueueUrl,
        body: &[u8],
        attributes: HashMap<String, AttributeValue>,
        delay: Duration,
    ) -> Result<MessageId, QueueError> {
        let failing = self.failing_sends.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_sends.store(failing - 1, Ordering::SeqCst);
            return Err(QueueError::Send {
                queue: queue.clone(),
                reason: "injected send failure".to_string(),
            });
        }
        self.ops.lock().unwrap().push(QueueOp::Send {
            queue: queue.clone(),
            body: body.to_vec(),
            attributes,
            delay,
        });
        Ok(MessageId::new("sent"))
    }

    async fn delete(
        &self,
        queue: &QueueUrl,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), QueueError> {
        self.ops.lock().unwrap().push(QueueOp::Delete {
            queue: queue.clone(),
            receipt_handle: receipt_handle.clone(),
        });
        Ok(())
    }
}

/// Record-store double with scriptable failures.
#[derive(Default)]
pub struct ScriptedStore {
    policies: Mutex<HashMap<String, ClientPolicy>>,
    puts: Mutex<Vec<RecordItem>>,
    put_attempts: AtomicUsize,
    failing_puts: AtomicUsize,
    policy_lookup_error: Mutex<Option<String>>,
    probe_error: Mutex<Option<String>>,
    probe_delay: Mutex<Option<Duration>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(self, policy: ClientPolicy) -> Self {
        self.policies
            .lock()
            .unwrap()
            .insert(policy.client_id.clone(), policy);
        self
    }

    /// Makes the next `n` puts fail with a backend error.
    pub fn fail_puts(&self, n: usize) {
        self.failing_puts.store(n, Ordering::SeqCst);
    }

    /// Makes every policy lookup fail with a backend (non-NotFound) error.
    pub fn fail_policy_lookups(&self, reason: &str) {
        *self.policy_lookup_error.lock().unwrap() = Some(reason.to_string());
    }

    pub fn fail_probe(&self, reason: &str) {
        *self.probe_error.lock().unwrap() = Some(reason.to_string());
    }

    pub fn delay_probe(&self, delay: Duration) {
        *self.probe_delay.lock().unwrap() = Some(delay);
    }

    pub fn puts(&self) -> Vec<RecordItem> {
        self.puts.lock().unwrap().clone()
    }

    /// Total `put_processed_event` calls, including failed ones.
    pub fn put_attempts(&self) -> usize {
        self.put_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for ScriptedStore {
    async fn put_processed_event(&self, item: RecordItem) -> Result<(), StoreError> {
        self.put_attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_puts.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_puts.store(failing - 1, Ordering::SeqCst);
            return Err(StoreError::Backend("injected put failure".to_string()));
        }
        self.puts.lock().unwrap().push(item);
        Ok(())
    }

    async fn get_client_policy(&self, client_id: &str) -> Result<ClientPolicy, StoreError> {
        if let Some(reason) = self.policy_lookup_error.lock().unwrap().clone() {
            return Err(StoreError::Backend(reason));
        }
        self.policies
            .lock()
            .unwrap()
            .get(client_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("client policy: {client_id}")))
    }

    async fn health_probe(&self) -> Result<(), StoreError> {
        let delay = *self.probe_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = self.probe_error.lock().unwrap().clone() {
            return Err(StoreError::Backend(reason));
        }
        Ok(())
    }
}
