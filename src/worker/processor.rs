//! The per-message pipeline: validate, triage, authorize, persist.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::authorize::Authorizer;
use crate::record::{EventWriter, PersistError};
use crate::triage::{self, TriageError};
use crate::types::{EventStatus, ProcessedEvent};
use crate::validator::{SchemaValidator, ValidationError};

/// A pipeline stage rejected the message.
///
/// The kind decides the message's fate: validation and triage failures are
/// terminal (retrying cannot fix bad input), persistence failures are
/// transient and retryable. Authorization denials are not errors at this
/// level: the denial is recorded in the envelope and persisted.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("triage failed: {0}")]
    Triage(#[from] TriageError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

impl ProcessError {
    /// Terminal errors go to the DLQ; the rest are retryable.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessError::Validation(_) | ProcessError::Triage(_))
    }
}

/// Runs the processing pipeline for one message body.
pub struct EventProcessor {
    validator: Arc<SchemaValidator>,
    authorizer: Authorizer,
    writer: EventWriter,
}

impl EventProcessor {
    pub fn new(validator: Arc<SchemaValidator>, authorizer: Authorizer, writer: EventWriter) -> Self {
        EventProcessor {
            validator,
            authorizer,
            writer,
        }
    }

    /// Processes one message body end-to-end and returns the persisted
    /// envelope.
    ///
    /// `attempts` is the delivery's attempt counter; it is recorded on the
    /// envelope. The envelope itself is created fresh for each attempt.
    ///
    /// Authorization denials (including failed lookups, which deny
    /// fail-closed) do not abort the pipeline: the envelope is marked
    /// failed, persisted as an audit record, and returned as success so the
    /// caller acks the message.
    #[instrument(
        skip_all,
        fields(
            correlation_id = %uuid::Uuid::new_v4(),
            attempts,
            event_id = tracing::field::Empty,
            event_type = tracing::field::Empty,
            client_id = tracing::field::Empty,
        )
    )]
    pub async fn process(
        &self,
        body: &[u8],
        attempts: u32,
    ) -> Result<ProcessedEvent, ProcessError> {
        let event = self.validator.validate(body)?;

        let span = tracing::Span::current();
        span.record("event_id", event.event_id.as_str());
        span.record("event_type", event.event_type.as_str());
        span.record("client_id", event.client_id.as_str());
        debug!("event validated");

        let mut envelope = ProcessedEvent::new(event.clone(), attempts);
        triage::route(&event, &mut envelope)?;

        // The authorizer runs on every triaged envelope and its verdict
        // overwrites the status; the record of a denial is itself an audit
        // trail, so denied envelopes are persisted too.
        if let Err(err) = self
            .authorizer
            .authorize(&event.client_id, event.event_type)
            .await
        {
            warn!(error = %err, "authorization failed");
            envelope.mark_failed(format!("client permission error: {err}"));
        }

        if envelope.status == EventStatus::Pending {
            envelope.status = EventStatus::Processed;
        }

        self.writer.save(&envelope).await?;
        info!(status = %envelope.status, "event processed");
        Ok(envelope)
    }
}
