//! Persistence writer: serializes the envelope and writes it.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::backend::RecordStore;
use crate::types::ProcessedEvent;

use super::item::marshal_envelope;

/// A record-store write failed.
///
/// Persist failures are transient by classification: the caller routes them
/// to the retry path, and the next delivery overwrites whatever partial
/// state this attempt left behind.
#[derive(Debug, Clone, Error)]
#[error("failed to persist event {event_id}: {reason}")]
pub struct PersistError {
    pub event_id: String,
    pub reason: String,
}

/// Writes processing envelopes to the record store.
pub struct EventWriter {
    store: Arc<dyn RecordStore>,
}

impl EventWriter {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        EventWriter { store }
    }

    /// Serializes `envelope` into the store's native item format and writes
    /// it, keyed by event id.
    pub async fn save(&self, envelope: &ProcessedEvent) -> Result<(), PersistError> {
        let item = marshal_envelope(envelope);
        self.store
            .put_processed_event(item)
            .await
            .map_err(|err| PersistError {
                event_id: envelope.event.event_id.clone(),
                reason: err.to_string(),
            })?;

        debug!(
            event_id = %envelope.event.event_id,
            status = %envelope.status,
            "envelope persisted"
        );
        Ok(())
    }
}
