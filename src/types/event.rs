//! The inbound event entity, its processing envelope, and per-client policy.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Retention period applied to stored envelopes, as an epoch-seconds TTL.
const EVENT_TTL_DAYS: i64 = 30;

/// The category of an inbound event.
///
/// The set is closed: decoding rejects any other string, so every `Event`
/// in the system carries a known type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Monitoring,
    UserAction,
    Transaction,
    Integration,
}

impl EventType {
    /// The wire spelling of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Monitoring => "monitoring",
            EventType::UserAction => "user_action",
            EventType::Transaction => "transaction",
            EventType::Integration => "integration",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing status of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Created but not yet through triage and authorization.
    Pending,
    /// All pipeline stages succeeded.
    Processed,
    /// Triage or authorization rejected the event.
    Failed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Processed => "processed",
            EventStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound event, decoded from a queue message body.
///
/// Field names on the wire are camelCase; the closed JSON Schema rejects
/// unknown top-level fields before decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// UUID string, unique identity for deduplication hints.
    pub event_id: String,
    pub event_type: EventType,
    pub client_id: String,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Map<String, serde_json::Value>,
    pub version: String,
}

/// The processing envelope: an [`Event`] plus processing metadata.
///
/// Created once per processing attempt. `processed_at` and `ttl` are fixed
/// at creation and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedEvent {
    #[serde(flatten)]
    pub event: Event,
    pub processed_at: DateTime<Utc>,
    pub status: EventStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
    pub retry_count: u32,
    /// Epoch seconds; `processed_at` plus the retention period.
    pub ttl: i64,
}

impl ProcessedEvent {
    /// Creates the envelope for one processing attempt.
    ///
    /// `retry_count` is the attempt counter carried on the incoming
    /// message's `RetryCount` attribute (0 for a first delivery).
    pub fn new(event: Event, retry_count: u32) -> Self {
        let processed_at = Utc::now();
        ProcessedEvent {
            event,
            processed_at,
            status: EventStatus::Pending,
            error_msg: None,
            retry_count,
            ttl: (processed_at + Duration::days(EVENT_TTL_DAYS)).timestamp(),
        }
    }

    /// Marks the envelope failed with the given reason.
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.status = EventStatus::Failed;
        self.error_msg = Some(reason.into());
    }

    pub fn payload(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.event.payload
    }

    pub fn payload_mut(&mut self) -> &mut serde_json::Map<String, serde_json::Value> {
        &mut self.event.payload
    }
}

/// Per-tenant policy record: which event types a client may send and
/// whether the client is active at all.
///
/// Read-only within the core; loaded on demand from the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPolicy {
    pub client_id: String,
    pub allowed_types: Vec<EventType>,
    pub active: bool,
    /// Auxiliary settings, opaque to the core.
    #[serde(default)]
    pub config: HashMap<String, String>,
}

impl ClientPolicy {
    pub fn allows(&self, event_type: EventType) -> bool {
        self.allowed_types.contains(&event_type)
    }
}
