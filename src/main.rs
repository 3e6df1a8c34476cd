//! Eventmill - main entry point.
//!
//! Wires the pipeline against the in-memory backend, starts the consumer
//! and the health endpoint, and stops gracefully on SIGINT/SIGTERM. A real
//! deployment substitutes its own `QueueBackend`/`RecordStore`
//! implementations here; any infrastructure bootstrapping (creating queues
//! and tables on first run) must complete before the supervisor starts.

use std::sync::Arc;

use eventmill::authorize::Authorizer;
use eventmill::backend::memory::{InMemoryQueue, InMemoryStore};
use eventmill::config::Config;
use eventmill::consumer::{Receiver, Supervisor};
use eventmill::health::HealthChecker;
use eventmill::record::EventWriter;
use eventmill::server::{AppState, build_router};
use eventmill::validator::SchemaValidator;
use eventmill::worker::{DlqController, EventProcessor, MessageWorker, RetryController};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eventmill=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            std::process::exit(1);
        }
    };

    tracing::info!(
        main_queue = %config.main_queue_url,
        dlq = %config.dlq_url,
        record_table = %config.record_table_name,
        policy_table = %config.policy_table_name,
        batch_size = config.batch_size,
        worker_pool_size = config.worker_pool_size,
        "starting eventmill"
    );

    // Schema compilation failure is fatal: a consumer that cannot validate
    // must not drain the queue.
    let validator = match SchemaValidator::new(&config.schema_path) {
        Ok(validator) => Arc::new(validator),
        Err(err) => {
            tracing::error!(error = %err, "failed to load event schema");
            std::process::exit(1);
        }
    };

    let queue = Arc::new(InMemoryQueue::new(
        config.main_queue_url.clone(),
        config.dlq_url.clone(),
    ));
    let store = Arc::new(InMemoryStore::new());

    let processor = EventProcessor::new(
        validator,
        Authorizer::new(store.clone()),
        EventWriter::new(store.clone()),
    );
    let dlq = DlqController::new(
        queue.clone(),
        config.main_queue_url.clone(),
        config.dlq_url.clone(),
    );
    let retry = RetryController::new(
        queue.clone(),
        config.main_queue_url.clone(),
        config.max_retries,
        dlq.clone(),
    );
    let worker = Arc::new(MessageWorker::new(
        processor,
        retry,
        dlq,
        queue.clone(),
        config.main_queue_url.clone(),
    ));
    let receiver = Receiver::new(
        queue,
        worker,
        config.batch_size,
        config.receive_wait,
        config.worker_pool_size,
    );
    let supervisor = Supervisor::new(receiver, config.drain_timeout);

    if let Err(err) = supervisor.start().await {
        tracing::error!(error = %err, "failed to start consumer");
        std::process::exit(1);
    }

    // Health endpoint.
    let app = build_router(AppState::new(HealthChecker::new(store)));
    let listener = match tokio::net::TcpListener::bind(config.listen_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, addr = %config.listen_addr, "failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!("health endpoint listening on {}", config.listen_addr);
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!(error = %err, "health server failed");
        }
    });

    wait_for_shutdown_signal().await;

    tracing::info!("shutting down gracefully");
    let outcome = supervisor.stop().await;
    tracing::info!(?outcome, "shutdown complete");
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(terminate) => terminate,
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                ctrl_c.await;
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}
