//! Component health checks.
//!
//! The aggregate status is unhealthy if any subcheck is unhealthy. Two
//! subchecks exist: the record-store reachability probe (run under a fixed
//! deadline) and an in-process memory check, currently a placeholder that
//! keeps the document shape stable for when a real sampler lands.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error};

use crate::backend::RecordStore;

/// Deadline for the record-store probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Aggregate health document.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub healthy: bool,
    pub timestamp: DateTime<Utc>,
    pub checks: BTreeMap<String, ComponentHealth>,
}

/// Health of one component.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub healthy: bool,
    /// Probe round-trip time in milliseconds.
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs the component subchecks.
pub struct HealthChecker {
    store: Arc<dyn RecordStore>,
}

impl HealthChecker {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        HealthChecker { store }
    }

    pub async fn check(&self) -> Status {
        let record_store = self.check_record_store().await;
        let memory = check_memory();
        let healthy = record_store.healthy && memory.healthy;

        debug!(
            healthy,
            record_store_healthy = record_store.healthy,
            record_store_latency_ms = record_store.latency_ms,
            "health check completed"
        );

        Status {
            healthy,
            timestamp: Utc::now(),
            checks: BTreeMap::from([
                ("record_store".to_string(), record_store),
                ("memory".to_string(), memory),
            ]),
        }
    }

    async fn check_record_store(&self) -> ComponentHealth {
        let start = Instant::now();
        let result = tokio::time::timeout(PROBE_TIMEOUT, self.store.health_probe()).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(())) => ComponentHealth {
                healthy: true,
                latency_ms,
                error: None,
            },
            Ok(Err(err)) => {
                error!(error = %err, "record store health probe failed");
                ComponentHealth {
                    healthy: false,
                    latency_ms,
                    error: Some(err.to_string()),
                }
            }
            Err(_) => {
                error!("record store health probe timed out");
                ComponentHealth {
                    healthy: false,
                    latency_ms,
                    error: Some("health probe timed out".to_string()),
                }
            }
        }
    }
}

/// Placeholder memory check.
fn check_memory() -> ComponentHealth {
    ComponentHealth {
        healthy: true,
        latency_ms: 0,
        error: None,
    }
}
