//! Long-poll receive loop and bounded worker dispatch.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace};

use crate::backend::QueueBackend;
use crate::worker::MessageWorker;

/// Pause after a failed receive before polling again.
const RECEIVE_ERROR_PAUSE: Duration = Duration::from_secs(5);

/// Pulls batches from the main queue and dispatches them to a bounded
/// worker pool.
///
/// # Backpressure
///
/// Each message takes a semaphore permit before its worker task is
/// spawned. When the pool is exhausted, dispatch blocks on the permit -
/// the receiver stops pulling instead of spawning unbounded workers.
///
/// # Cancellation
///
/// The token interrupts the long poll, the error pause, and permit
/// acquisition. Messages received but not yet dispatched when
/// cancellation fires are left unacked; the backend's visibility timeout
/// redelivers them. Workers already spawned run to completion during the
/// drain.
#[derive(Clone)]
pub struct Receiver {
    queue: Arc<dyn QueueBackend>,
    worker: Arc<MessageWorker>,
    batch_size: usize,
    receive_wait: Duration,
    pool: Arc<Semaphore>,
}

impl Receiver {
    pub fn new(
        queue: Arc<dyn QueueBackend>,
        worker: Arc<MessageWorker>,
        batch_size: usize,
        receive_wait: Duration,
        worker_pool_size: usize,
    ) -> Self {
        Receiver {
            queue,
            worker,
            batch_size,
            receive_wait,
            pool: Arc::new(Semaphore::new(worker_pool_size)),
        }
    }

    /// Runs the receive loop until `cancel` fires, then drains in-flight
    /// workers.
    ///
    /// Receive errors are logged and retried after a fixed pause; only
    /// cancellation ends the loop.
    #[instrument(skip_all)]
    pub async fn run(self, cancel: CancellationToken) {
        let mut tasks = JoinSet::new();
        info!(
            batch_size = self.batch_size,
            wait_secs = self.receive_wait.as_secs(),
            "receiver started"
        );

        'poll: loop {
            // Reap finished workers so the join set doesn't grow unbounded.
            while tasks.try_join_next().is_some() {}

            let batch = tokio::select! {
                _ = cancel.cancelled() => break 'poll,
                result = self.queue.receive(self.batch_size, self.receive_wait) => {
                    match result {
                        Ok(batch) => batch,
                        Err(err) => {
                            error!(error = %err, "receive failed, pausing before retry");
                            tokio::select! {
                                _ = cancel.cancelled() => break 'poll,
                                _ = tokio::time::sleep(RECEIVE_ERROR_PAUSE) => continue 'poll,
                            }
                        }
                    }
                }
            };

            if batch.is_empty() {
                trace!("no messages received");
                continue;
            }
            debug!(count = batch.len(), "received batch");

            for message in batch {
                let permit = tokio::select! {
                    _ = cancel.cancelled() => break 'poll,
                    permit = Arc::clone(&self.pool).acquire_owned() => {
                        permit.expect("worker pool semaphore is never closed")
                    }
                };

                let worker = Arc::clone(&self.worker);
                tasks.spawn(async move {
                    let _permit = permit;
                    worker.handle(message).await;
                });
            }
        }

        info!(in_flight = tasks.len(), "receiver stopping, draining workers");
        while tasks.join_next().await.is_some() {}
        info!("receiver drained");
    }
}
