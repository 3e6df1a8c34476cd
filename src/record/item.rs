//! Backend-neutral item model for the record store.
//!
//! The store's native format is a flat attribute map with a small value
//! vocabulary: strings, decimal numbers, booleans, string sets, and nested
//! maps. [`marshal_envelope`] renders a processing envelope into that format;
//! [`marshal_payload`] applies the payload mapping recursively.
//!
//! Mapping rules for payload values:
//!
//! - string → S
//! - integer → N (decimal)
//! - float → N (shortest round-trip)
//! - bool → BOOL
//! - array of strings → SS
//! - nested object → M (recursive)
//! - anything else → S (stringified)
//! - null → omitted entirely, never stored as an explicit null

use std::collections::HashMap;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::types::ProcessedEvent;

/// A stored item: attribute name to typed value.
pub type RecordItem = HashMap<String, ItemValue>;

/// A typed attribute value in the record store's native model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum ItemValue {
    /// String.
    S(String),
    /// Number, carried in decimal string form.
    N(String),
    /// Boolean.
    #[serde(rename = "BOOL")]
    Bool(bool),
    /// String set.
    #[serde(rename = "SS")]
    Ss(Vec<String>),
    /// Nested map.
    M(HashMap<String, ItemValue>),
}

impl ItemValue {
    pub fn as_s(&self) -> Option<&str> {
        match self {
            ItemValue::S(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_n(&self) -> Option<&str> {
        match self {
            ItemValue::N(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ItemValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_m(&self) -> Option<&HashMap<String, ItemValue>> {
        match self {
            ItemValue::M(m) => Some(m),
            _ => None,
        }
    }
}

/// Renders a single payload value into the native model.
///
/// Returns `None` for JSON null: absent values are omitted from the item.
fn marshal_value(value: &serde_json::Value) -> Option<ItemValue> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(ItemValue::S(s.clone())),
        serde_json::Value::Bool(b) => Some(ItemValue::Bool(*b)),
        serde_json::Value::Number(n) => Some(ItemValue::N(n.to_string())),
        serde_json::Value::Array(items) => {
            let strings: Option<Vec<String>> = items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect();
            match strings {
                Some(ss) => Some(ItemValue::Ss(ss)),
                // Mixed or non-string arrays fall back to stringification.
                None => Some(ItemValue::S(value.to_string())),
            }
        }
        serde_json::Value::Object(map) => Some(ItemValue::M(marshal_payload(map))),
    }
}

/// Renders an event payload into the native nested-map model.
pub fn marshal_payload(
    payload: &serde_json::Map<String, serde_json::Value>,
) -> HashMap<String, ItemValue> {
    payload
        .iter()
        .filter_map(|(key, value)| marshal_value(value).map(|v| (key.clone(), v)))
        .collect()
}

/// Renders a processing envelope into the stored item.
///
/// `event_id` is the partition key. `error_msg` is stored only when
/// non-empty.
pub fn marshal_envelope(envelope: &ProcessedEvent) -> RecordItem {
    let event = &envelope.event;
    let mut item = RecordItem::from([
        ("event_id".to_string(), ItemValue::S(event.event_id.clone())),
        (
            "event_type".to_string(),
            ItemValue::S(event.event_type.to_string()),
        ),
        (
            "client_id".to_string(),
            ItemValue::S(event.client_id.clone()),
        ),
        (
            "timestamp".to_string(),
            ItemValue::S(event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ),
        (
            "payload".to_string(),
            ItemValue::M(marshal_payload(&event.payload)),
        ),
        ("version".to_string(), ItemValue::S(event.version.clone())),
        (
            "processed_at".to_string(),
            ItemValue::S(
                envelope
                    .processed_at
                    .to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
        ),
        (
            "status".to_string(),
            ItemValue::S(envelope.status.to_string()),
        ),
        (
            "retry_count".to_string(),
            ItemValue::N(envelope.retry_count.to_string()),
        ),
        ("ttl".to_string(), ItemValue::N(envelope.ttl.to_string())),
    ]);

    if let Some(error_msg) = envelope.error_msg.as_deref().filter(|m| !m.is_empty()) {
        item.insert(
            "error_msg".to_string(),
            ItemValue::S(error_msg.to_string()),
        );
    }

    item
}
