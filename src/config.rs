//! Runtime configuration.
//!
//! Every option has a default; `Config::from_env` overrides from
//! environment variables. Unparseable values are rejected rather than
//! silently replaced: a typo in `MAX_RETRIES` should fail startup, not
//! quietly run with 3.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::types::QueueUrl;

/// Backend ceiling on messages per receive.
const MAX_BATCH_SIZE: usize = 10;

/// A configuration value could not be used. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Consumer and service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Upper bound on re-enqueue attempts before a message is
    /// dead-lettered.
    pub max_retries: u32,

    /// Long-poll wait per receive call.
    pub receive_wait: Duration,

    /// Maximum messages per receive; capped at the backend ceiling of 10.
    pub batch_size: usize,

    /// Concurrency cap across batches. Defaults to `batch_size`.
    pub worker_pool_size: usize,

    /// Logical name of the processed-event table.
    pub record_table_name: String,

    /// Logical name of the client-policy table.
    pub policy_table_name: String,

    pub main_queue_url: QueueUrl,
    pub dlq_url: QueueUrl,

    /// Path to the event JSON Schema.
    pub schema_path: PathBuf,

    /// Budget for draining in-flight workers on stop.
    pub drain_timeout: Duration,

    /// Bind address for the health endpoint.
    pub listen_addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_retries: 3,
            receive_wait: Duration::from_secs(20),
            batch_size: 10,
            worker_pool_size: 10,
            record_table_name: "events".to_string(),
            policy_table_name: "events-clients".to_string(),
            main_queue_url: QueueUrl::new("local://event-queue"),
            dlq_url: QueueUrl::new("local://event-dlq"),
            schema_path: PathBuf::from("schemas/event-schema.json"),
            drain_timeout: Duration::from_secs(5),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables, with defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let max_retries = parse_or(&lookup, "MAX_RETRIES", defaults.max_retries)?;
        let receive_wait = Duration::from_secs(parse_or(
            &lookup,
            "RECEIVE_WAIT_SECONDS",
            defaults.receive_wait.as_secs(),
        )?);
        let mut batch_size = parse_or(&lookup, "BATCH_SIZE", defaults.batch_size)?;
        if batch_size == 0 {
            return Err(ConfigError::Invalid {
                key: "BATCH_SIZE",
                value: "0".to_string(),
            });
        }
        if batch_size > MAX_BATCH_SIZE {
            warn!(batch_size, "batch size exceeds the backend ceiling, clamping to 10");
            batch_size = MAX_BATCH_SIZE;
        }

        let worker_pool_size = parse_or(&lookup, "WORKER_POOL_SIZE", batch_size)?;
        if worker_pool_size == 0 {
            return Err(ConfigError::Invalid {
                key: "WORKER_POOL_SIZE",
                value: "0".to_string(),
            });
        }

        let drain_timeout = Duration::from_secs(parse_or(
            &lookup,
            "DRAIN_TIMEOUT_SECONDS",
            defaults.drain_timeout.as_secs(),
        )?);
        let listen_addr = parse_or(&lookup, "LISTEN_ADDR", defaults.listen_addr)?;

        Ok(Config {
            max_retries,
            receive_wait,
            batch_size,
            worker_pool_size,
            record_table_name: lookup("RECORD_TABLE_NAME")
                .unwrap_or(defaults.record_table_name),
            policy_table_name: lookup("POLICY_TABLE_NAME")
                .unwrap_or(defaults.policy_table_name),
            main_queue_url: lookup("MAIN_QUEUE_URL")
                .map(QueueUrl::new)
                .unwrap_or(defaults.main_queue_url),
            dlq_url: lookup("DLQ_URL").map(QueueUrl::new).unwrap_or(defaults.dlq_url),
            schema_path: lookup("SCHEMA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.schema_path),
            drain_timeout,
            listen_addr,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
            key,
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_match_the_config_surface() {
        let config = from_map(&[]).unwrap();

        assert_eq!(config.max_retries, 3);
        assert_eq!(config.receive_wait, Duration::from_secs(20));
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.worker_pool_size, 10);
        assert_eq!(config.record_table_name, "events");
        assert_eq!(config.policy_table_name, "events-clients");
        assert_eq!(config.drain_timeout, Duration::from_secs(5));
        assert_eq!(config.schema_path, PathBuf::from("schemas/event-schema.json"));
    }

    #[test]
    fn environment_overrides_apply() {
        let config = from_map(&[
            ("MAX_RETRIES", "5"),
            ("BATCH_SIZE", "4"),
            ("RECEIVE_WAIT_SECONDS", "1"),
            ("MAIN_QUEUE_URL", "local://other-queue"),
        ])
        .unwrap();

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.receive_wait, Duration::from_secs(1));
        assert_eq!(config.main_queue_url.as_str(), "local://other-queue");
    }

    #[test]
    fn worker_pool_defaults_to_batch_size() {
        let config = from_map(&[("BATCH_SIZE", "4")]).unwrap();
        assert_eq!(config.worker_pool_size, 4);

        let config = from_map(&[("BATCH_SIZE", "4"), ("WORKER_POOL_SIZE", "7")]).unwrap();
        assert_eq!(config.worker_pool_size, 7);
    }

    #[test]
    fn batch_size_is_clamped_to_the_backend_ceiling() {
        let config = from_map(&[("BATCH_SIZE", "50")]).unwrap();
        assert_eq!(config.batch_size, 10);
    }

    #[test]
    fn zero_sizes_are_rejected() {
        assert!(from_map(&[("BATCH_SIZE", "0")]).is_err());
        assert!(from_map(&[("WORKER_POOL_SIZE", "0")]).is_err());
    }

    #[test]
    fn unparseable_values_are_rejected() {
        let err = from_map(&[("MAX_RETRIES", "lots")]).unwrap_err();
        assert!(err.to_string().contains("MAX_RETRIES"));
    }
}
