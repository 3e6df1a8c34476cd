//! Per-client authorization: allow-list and active-flag gate.
//!
//! Policy resolution is deliberately open on a missing policy: a client
//! without a policy record is allowed, for compatibility with tenants
//! onboarded before policies existed. A *failed* lookup is the opposite -
//! the gate fails closed rather than guessing. The
//! [`Authorizer::with_deny_on_missing_policy`] toggle flips the open
//! default for deployments that want strict onboarding.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::backend::{RecordStore, StoreError};
use crate::types::EventType;

/// The client may not send this event.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("client {0} is not active")]
    ClientInactive(String),

    #[error("client {client_id} is not allowed to send events of type {event_type}")]
    TypeNotAllowed {
        client_id: String,
        event_type: EventType,
    },

    /// Only produced when the deny-on-missing toggle is set.
    #[error("no policy found for client {0}")]
    PolicyMissing(String),

    /// The policy lookup itself failed; the gate fails closed.
    #[error("policy lookup for client {client_id} failed: {reason}")]
    Lookup { client_id: String, reason: String },
}

/// Gate checking a client's policy before an event is accepted.
pub struct Authorizer {
    store: Arc<dyn RecordStore>,
    deny_on_missing_policy: bool,
}

impl Authorizer {
    /// Creates an authorizer with the policy-open default: a missing policy
    /// allows.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Authorizer {
            store,
            deny_on_missing_policy: false,
        }
    }

    /// Flips the missing-policy posture to deny.
    pub fn with_deny_on_missing_policy(mut self, deny: bool) -> Self {
        self.deny_on_missing_policy = deny;
        self
    }

    /// Checks whether `client_id` may send events of `event_type`.
    pub async fn authorize(&self, client_id: &str, event_type: EventType) -> Result<(), AuthError> {
        let policy = match self.store.get_client_policy(client_id).await {
            Ok(policy) => policy,
            Err(StoreError::NotFound(_)) => {
                if self.deny_on_missing_policy {
                    return Err(AuthError::PolicyMissing(client_id.to_string()));
                }
                debug!(client_id, "no client policy found, allowing by default");
                return Ok(());
            }
            Err(err) => {
                return Err(AuthError::Lookup {
                    client_id: client_id.to_string(),
                    reason: err.to_string(),
                });
            }
        };

        if !policy.active {
            return Err(AuthError::ClientInactive(client_id.to_string()));
        }
        if !policy.allows(event_type) {
            return Err(AuthError::TypeNotAllowed {
                client_id: client_id.to_string(),
                event_type,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ScriptedStore, client_policy};

    fn authorizer(store: ScriptedStore) -> Authorizer {
        Authorizer::new(Arc::new(store))
    }

    #[tokio::test]
    async fn missing_policy_allows_by_default() {
        let auth = authorizer(ScriptedStore::new());
        auth.authorize("unknown-client", EventType::Monitoring)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_policy_denies_when_toggled() {
        let auth = authorizer(ScriptedStore::new()).with_deny_on_missing_policy(true);
        let err = auth
            .authorize("unknown-client", EventType::Monitoring)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::PolicyMissing(_)));
    }

    #[tokio::test]
    async fn lookup_failure_fails_closed() {
        let store = ScriptedStore::new();
        store.fail_policy_lookups("connection refused");
        let err = authorizer(store)
            .authorize("client-001", EventType::Monitoring)
            .await
            .unwrap_err();

        match err {
            AuthError::Lookup { reason, .. } => assert!(reason.contains("connection refused")),
            other => panic!("expected Lookup, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn inactive_client_is_denied() {
        let store = ScriptedStore::new().with_policy(client_policy(
            "client-001",
            vec![EventType::Monitoring],
            false,
        ));
        let err = authorizer(store)
            .authorize("client-001", EventType::Monitoring)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("not active"));
    }

    #[tokio::test]
    async fn disallowed_type_is_denied() {
        let store = ScriptedStore::new().with_policy(client_policy(
            "client-001",
            vec![EventType::Monitoring],
            true,
        ));
        let err = authorizer(store)
            .authorize("client-001", EventType::Transaction)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("not allowed to send events of type transaction"));
    }

    #[tokio::test]
    async fn active_client_with_allowed_type_passes() {
        let store = ScriptedStore::new().with_policy(client_policy(
            "client-001",
            vec![EventType::Monitoring, EventType::Transaction],
            true,
        ));
        authorizer(store)
            .authorize("client-001", EventType::Transaction)
            .await
            .unwrap();
    }
}
