//! Event validation: JSON Schema (Draft-07) plus structural business rules.
//!
//! The schema is compiled once at startup; a schema that cannot be read or
//! compiled aborts startup. After construction the validator has no side
//! effects and performs no I/O, and the compiled schema is safe to share
//! across workers.
//!
//! Validation accepts three input forms: raw bytes (the core routine), a
//! UTF-8 string, and a queue message whose body is extracted first. All
//! schema violations are accumulated into a single [`ValidationError`]
//! rather than reported one at a time.

use std::path::{Path, PathBuf};

use jsonschema::Draft;
use thiserror::Error;

use crate::types::{Event, QueueMessage};

/// The schema could not be loaded at startup. Fatal.
#[derive(Debug, Error)]
pub enum SchemaLoadError {
    #[error("failed to read schema file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("schema file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to compile schema: {0}")]
    Compile(String),
}

/// The event failed schema or business-rule validation.
///
/// Terminal: validation failures are never retried. `failures` lists every
/// violation found in the failing step.
#[derive(Debug, Clone, Error)]
#[error("validation failed: {}", failures.join("; "))]
pub struct ValidationError {
    pub failures: Vec<String>,
}

impl ValidationError {
    fn single(failure: impl Into<String>) -> Self {
        ValidationError {
            failures: vec![failure.into()],
        }
    }
}

/// Validates inbound message bodies against the event schema and the
/// structural business rules.
#[derive(Debug)]
pub struct SchemaValidator {
    schema: jsonschema::Validator,
}

impl SchemaValidator {
    /// Reads and compiles the Draft-07 schema at `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, SchemaLoadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| SchemaLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let schema_json: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|source| SchemaLoadError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let schema = jsonschema::options()
            .with_draft(Draft::Draft7)
            .should_validate_formats(true)
            .build(&schema_json)
            .map_err(|err| SchemaLoadError::Compile(err.to_string()))?;

        Ok(SchemaValidator { schema })
    }

    /// Core routine: validates raw body bytes and decodes the event.
    ///
    /// Steps: JSON parse, schema check (all violations accumulated), decode
    /// into [`Event`] (which enforces the closed event-type set), business
    /// rules.
    pub fn validate(&self, body: &[u8]) -> Result<Event, ValidationError> {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|err| ValidationError::single(format!("invalid JSON: {err}")))?;

        let violations: Vec<String> = self
            .schema
            .iter_errors(&value)
            .map(|err| format!("{}: {err}", pointer_or_root(err.instance_path.as_str())))
            .collect();
        if !violations.is_empty() {
            return Err(ValidationError {
                failures: violations,
            });
        }

        let event: Event = serde_json::from_value(value)
            .map_err(|err| ValidationError::single(format!("failed to decode event: {err}")))?;

        business_rules(&event)?;
        Ok(event)
    }

    /// Adapter: validates a UTF-8 string body.
    pub fn validate_str(&self, body: &str) -> Result<Event, ValidationError> {
        self.validate(body.as_bytes())
    }

    /// Adapter: extracts and validates a queue message's body.
    pub fn validate_message(&self, message: &QueueMessage) -> Result<Event, ValidationError> {
        if message.body.is_empty() {
            return Err(ValidationError::single("empty body"));
        }
        self.validate(&message.body)
    }
}

fn pointer_or_root(pointer: &str) -> &str {
    if pointer.is_empty() { "/" } else { pointer }
}

/// Structural rules beyond the schema.
///
/// The event-type allow-list is already enforced by decoding into the
/// closed [`EventType`](crate::types::EventType) enum.
fn business_rules(event: &Event) -> Result<(), ValidationError> {
    let mut failures = Vec::new();

    if event.client_id.is_empty() {
        failures.push("client ID cannot be empty".to_string());
    }
    if event.payload.is_empty() {
        failures.push("payload cannot be empty".to_string());
    }
    if event.timestamp.timestamp() == 0 {
        failures.push("timestamp cannot be zero".to_string());
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{event_body, message_with_body, sample_event_body, schema_path};
    use crate::types::EventType;

    use std::io::Write;

    fn validator() -> SchemaValidator {
        SchemaValidator::new(schema_path()).unwrap()
    }

    // ─── Schema loading ───

    #[test]
    fn missing_schema_file_is_fatal() {
        let err = SchemaValidator::new("/nonexistent/schema.json").unwrap_err();
        assert!(matches!(err, SchemaLoadError::Read { .. }));
    }

    #[test]
    fn unparseable_schema_file_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{not json").unwrap();

        let err = SchemaValidator::new(file.path()).unwrap_err();
        assert!(matches!(err, SchemaLoadError::Parse { .. }));
    }

    #[test]
    fn uncompilable_schema_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"type": "nonsense"}"#).unwrap();

        let err = SchemaValidator::new(file.path()).unwrap_err();
        assert!(matches!(err, SchemaLoadError::Compile(_)));
    }

    // ─── Happy path ───

    #[test]
    fn valid_body_decodes_into_an_event() {
        let event = validator().validate(&sample_event_body()).unwrap();

        assert_eq!(event.event_type, EventType::Monitoring);
        assert_eq!(event.client_id, "client-001");
        assert_eq!(event.version, "1.0");
    }

    #[test]
    fn string_adapter_matches_core_routine() {
        let body = String::from_utf8(sample_event_body()).unwrap();
        let event = validator().validate_str(&body).unwrap();
        assert_eq!(event.client_id, "client-001");
    }

    #[test]
    fn message_adapter_extracts_the_body() {
        let message = message_with_body(sample_event_body());
        let event = validator().validate_message(&message).unwrap();
        assert_eq!(event.client_id, "client-001");
    }

    // ─── Failure modes ───

    #[test]
    fn empty_message_body_is_rejected() {
        let message = message_with_body(Vec::new());
        let err = validator().validate_message(&message).unwrap_err();
        assert_eq!(err.failures, vec!["empty body".to_string()]);
    }

    #[test]
    fn non_json_body_is_rejected() {
        let err = validator().validate(b"{not json").unwrap_err();
        assert!(err.failures[0].contains("invalid JSON"));
    }

    #[test]
    fn schema_violations_are_all_accumulated() {
        // Three violations at once: bad type, bad version, missing clientId.
        let body = serde_json::to_vec(&serde_json::json!({
            "eventId": "11111111-1111-1111-1111-111111111111",
            "eventType": "telemetry",
            "timestamp": "2025-01-21T10:00:00Z",
            "payload": {"k": "v"},
            "version": "one"
        }))
        .unwrap();

        let err = validator().validate(&body).unwrap_err();
        assert!(
            err.failures.len() >= 3,
            "expected all violations reported, got {:?}",
            err.failures
        );
    }

    #[test]
    fn unknown_top_level_fields_are_rejected() {
        let mut value: serde_json::Value =
            serde_json::from_slice(&sample_event_body()).unwrap();
        value["extra"] = serde_json::json!("nope");

        let err = validator()
            .validate(&serde_json::to_vec(&value).unwrap())
            .unwrap_err();
        assert!(
            err.failures.iter().any(|f| f.contains("extra")),
            "closed schema rejects unknown fields: {:?}",
            err.failures
        );
    }

    #[test]
    fn unknown_event_type_is_a_schema_violation() {
        let body = event_body("telemetry", serde_json::json!({"k": "v"}));
        assert!(validator().validate(&body).is_err());
    }

    #[test]
    fn empty_payload_is_rejected() {
        let body = event_body("monitoring", serde_json::json!({}));
        let err = validator().validate(&body).unwrap_err();
        assert!(!err.failures.is_empty());
    }

    #[test]
    fn bad_client_id_characters_are_rejected() {
        let mut value: serde_json::Value =
            serde_json::from_slice(&sample_event_body()).unwrap();
        value["clientId"] = serde_json::json!("client 001!");

        let err = validator()
            .validate(&serde_json::to_vec(&value).unwrap())
            .unwrap_err();
        assert!(!err.failures.is_empty());
    }

    #[test]
    fn epoch_zero_timestamp_fails_business_rules() {
        let mut value: serde_json::Value =
            serde_json::from_slice(&sample_event_body()).unwrap();
        value["timestamp"] = serde_json::json!("1970-01-01T00:00:00Z");

        let err = validator()
            .validate(&serde_json::to_vec(&value).unwrap())
            .unwrap_err();
        assert!(err.failures.iter().any(|f| f.contains("timestamp")));
    }

    #[test]
    fn validator_has_no_side_effects_on_input() {
        let body = sample_event_body();
        let before = body.clone();
        let _ = validator().validate(&body);
        assert_eq!(body, before);
    }
}
