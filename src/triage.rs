//! Per-type triage: payload enrichment and required-field checks.
//!
//! Triage runs after validation and before authorization. It never mutates
//! the input event; enrichment is applied to the envelope's own payload
//! copy. A missing required field is terminal for the message: the caller
//! discards the envelope and quarantines the message.

use chrono::{SecondsFormat, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::types::{Event, EventType, ProcessedEvent};

/// Payload keys a user action must carry.
const USER_ACTION_FIELDS: [&str; 3] = ["userId", "action", "resource"];
/// Payload keys a transaction must carry.
const TRANSACTION_FIELDS: [&str; 3] = ["transactionId", "amount", "currency"];
/// Payload keys an integration event must carry.
const INTEGRATION_FIELDS: [&str; 3] = ["source", "target", "operation"];

/// Transactions above this amount are flagged for downstream review.
const HIGH_VALUE_THRESHOLD: f64 = 10_000.0;

/// A required payload field is missing.
#[derive(Debug, Clone, Error)]
#[error("missing required field for {event_type}: {field}")]
pub struct TriageError {
    pub event_type: EventType,
    pub field: &'static str,
}

/// Routes an event through its type-specific triage, enriching the
/// envelope's payload.
pub fn route(event: &Event, envelope: &mut ProcessedEvent) -> Result<(), TriageError> {
    match event.event_type {
        EventType::Monitoring => route_monitoring(event, envelope),
        EventType::UserAction => route_user_action(event, envelope)?,
        EventType::Transaction => route_transaction(event, envelope)?,
        EventType::Integration => route_integration(event, envelope)?,
    }
    Ok(())
}

fn route_monitoring(event: &Event, envelope: &mut ProcessedEvent) {
    debug!("triaging monitoring event");

    let severity = event.payload.get("severity").and_then(|v| v.as_str());
    if matches!(severity, Some("high") | Some("critical")) {
        info!(severity = severity.unwrap_or_default(), "high-severity monitoring event");
        envelope
            .payload_mut()
            .insert("priority".to_string(), serde_json::json!("high"));
    }
}

fn route_user_action(event: &Event, envelope: &mut ProcessedEvent) -> Result<(), TriageError> {
    debug!("triaging user action event");
    require_fields(event, &USER_ACTION_FIELDS)?;

    // Processing timestamp for the audit trail.
    envelope.payload_mut().insert(
        "processedAt".to_string(),
        serde_json::json!(rfc3339_now()),
    );
    Ok(())
}

fn route_transaction(event: &Event, envelope: &mut ProcessedEvent) -> Result<(), TriageError> {
    debug!("triaging transaction event");
    require_fields(event, &TRANSACTION_FIELDS)?;

    // A non-numeric amount is not a failure here: the field-present check
    // already passed, only the flag is skipped.
    if let Some(amount) = event.payload.get("amount").and_then(|v| v.as_f64()) {
        if amount > HIGH_VALUE_THRESHOLD {
            info!(amount, "high-value transaction");
            envelope
                .payload_mut()
                .insert("highValue".to_string(), serde_json::json!(true));
        }
    }
    Ok(())
}

fn route_integration(event: &Event, envelope: &mut ProcessedEvent) -> Result<(), TriageError> {
    debug!("triaging integration event");
    require_fields(event, &INTEGRATION_FIELDS)?;

    envelope.payload_mut().insert(
        "integrationProcessedAt".to_string(),
        serde_json::json!(rfc3339_now()),
    );
    Ok(())
}

fn require_fields(event: &Event, fields: &[&'static str]) -> Result<(), TriageError> {
    for field in fields {
        if !event.payload.contains_key(*field) {
            return Err(TriageError {
                event_type: event.event_type,
                field,
            });
        }
    }
    Ok(())
}

fn rfc3339_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
