//! The record-store contract.

use async_trait::async_trait;
use thiserror::Error;

use crate::record::RecordItem;
use crate::types::ClientPolicy;

/// Errors surfaced by record-store operations.
///
/// `NotFound` is distinguished from backend failure because the authorizer
/// treats the two differently: a missing policy allows by default, a failed
/// lookup denies.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend rejected or failed the operation.
    #[error("record store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// A durable keyed store for processed-event items and client policies.
///
/// Events and policies live in two separate logical tables; the policy
/// table is keyed by `client_id`. Implementations must be safe for
/// concurrent use.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Writes one processed-event item, keyed by its `event_id` attribute.
    ///
    /// At-least-once processing may write the same event id more than once;
    /// the put overwrites.
    async fn put_processed_event(&self, item: RecordItem) -> Result<(), StoreError>;

    /// Looks up the policy for a client.
    ///
    /// Returns [`StoreError::NotFound`] when no policy record exists.
    async fn get_client_policy(&self, client_id: &str) -> Result<ClientPolicy, StoreError>;

    /// Cheap reachability probe for the health surface.
    async fn health_probe(&self) -> Result<(), StoreError>;
}
