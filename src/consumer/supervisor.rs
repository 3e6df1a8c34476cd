//! Lifecycle supervision: start, cancellation, graceful drain.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::receiver::Receiver;

/// Errors from lifecycle operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// `start` was called while the consumer is already running.
    #[error("consumer is already running")]
    AlreadyRunning,
}

/// How a `stop` call concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// All in-flight workers finished within the drain budget.
    Drained,
    /// The drain budget expired; remaining workers were aborted and their
    /// messages will redeliver via the visibility timeout.
    DeadlineExpired,
    /// `stop` was called with no receiver running.
    NotRunning,
}

struct Running {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Owns the receiver task's lifecycle.
///
/// The guarded running slot is the only mutable state shared across the
/// consumer; everything else is immutable after construction or owned by a
/// single worker.
pub struct Supervisor {
    receiver: Receiver,
    drain_timeout: Duration,
    running: Mutex<Option<Running>>,
}

impl Supervisor {
    pub fn new(receiver: Receiver, drain_timeout: Duration) -> Self {
        Supervisor {
            receiver,
            drain_timeout,
            running: Mutex::new(None),
        }
    }

    /// Spawns the receiver loop.
    ///
    /// Returns [`SupervisorError::AlreadyRunning`] if a previous `start` is
    /// still active.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        let mut running = self.running.lock().await;
        if let Some(current) = running.as_ref() {
            if !current.handle.is_finished() {
                return Err(SupervisorError::AlreadyRunning);
            }
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(self.receiver.clone().run(cancel.clone()));
        *running = Some(Running { handle, cancel });
        info!("consumer started");
        Ok(())
    }

    /// Signals the receiver to stop and waits for in-flight workers.
    ///
    /// Returns when the drain completes or the drain budget expires,
    /// whichever comes first. On expiry the remaining workers are aborted:
    /// their unacked messages return via the backend's visibility timeout,
    /// and no further record-store writes happen from this process.
    pub async fn stop(&self) -> StopOutcome {
        let Some(Running { handle, cancel }) = self.running.lock().await.take() else {
            return StopOutcome::NotRunning;
        };

        info!("stopping consumer");
        cancel.cancel();

        let abort: AbortHandle = handle.abort_handle();
        match tokio::time::timeout(self.drain_timeout, handle).await {
            Ok(_) => {
                info!("consumer drained");
                StopOutcome::Drained
            }
            Err(_) => {
                warn!(
                    drain_secs = self.drain_timeout.as_secs(),
                    "drain deadline expired, aborting in-flight workers"
                );
                abort.abort();
                StopOutcome::DeadlineExpired
            }
        }
    }
}
