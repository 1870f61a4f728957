//! Environment-variable configuration for the MARC ingest service.
//!
//! The original service (a pre-container AWS worker) read every setting
//! straight from the environment and treated a missing required value as
//! fatal at startup; there is no config-file layer here, unlike richer
//! multi-platform services. `RuntimeConfig::load` preserves that: it
//! either returns a fully populated config or a [`ConfigError`] describing
//! exactly which variable was missing or malformed, and `main` is
//! responsible for logging it and exiting non-zero.

pub mod error;

use std::time::Duration;

pub use error::ConfigError;

/// All service configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// SQS queue name/URL carrying inbound blob-upload notifications.
    pub in_queue: String,
    /// SQS queue name/URL that per-record messages are published to.
    pub out_queue: String,
    /// Optional secondary queue every outbound message is mirrored to.
    pub cache_queue: Option<String>,
    /// Long-poll timeout used when receiving from `in_queue`.
    pub poll_timeout: Duration,
    /// Overrides the per-record `RecordSource` attribute when set.
    pub data_source: Option<String>,
    /// Bucket used by the queue SDK for large-message offload.
    pub message_bucket: String,
    /// Local directory scratch files are downloaded into.
    pub download_dir: String,
    /// Capacity of the bounded channel feeding the worker pool.
    pub work_queue_size: usize,
    /// Number of worker tasks consuming the record channel.
    pub workers: usize,
}

fn env_optional(name: &'static str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Some(value),
        Ok(_) => {
            tracing::info!(variable = name, "environment variable set but empty");
            None
        }
        Err(_) => None,
    }
}

fn env_required(name: &'static str) -> Result<String, ConfigError> {
    env_optional(name).ok_or(ConfigError::MissingRequired(name))
}

fn env_required_usize(name: &'static str) -> Result<usize, ConfigError> {
    let raw = env_required(name)?;
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: raw,
        expected: "a non-negative integer",
    })
}

impl RuntimeConfig {
    /// Loads configuration from the process environment. Any missing
    /// required variable or unparseable numeric value is returned as a
    /// [`ConfigError`] - fatal to the caller, never guessed at.
    pub fn load() -> Result<Self, ConfigError> {
        let config = Self {
            in_queue: env_required("MARC_INGEST_IN_QUEUE")?,
            out_queue: env_required("MARC_INGEST_OUT_QUEUE")?,
            cache_queue: env_optional("MARC_INGEST_CACHE_QUEUE"),
            poll_timeout: Duration::from_secs(
                env_required_usize("MARC_INGEST_POLL_TIMEOUT")? as u64,
            ),
            data_source: env_optional("MARC_INGEST_DATA_SOURCE"),
            message_bucket: env_required("MARC_INGEST_MESSAGE_BUCKET")?,
            download_dir: env_required("MARC_INGEST_DOWNLOAD_DIR")?,
            work_queue_size: env_required_usize("MARC_INGEST_WORK_QUEUE_SIZE")?,
            workers: env_required_usize("MARC_INGEST_WORKERS")?,
        };

        config.log();

        if config.cache_queue.is_none() {
            tracing::info!("cache queue not configured, record caching is disabled");
        }
        if config.data_source.is_none() {
            tracing::info!("data source not configured, it will be derived per-record from bucket/key");
        }

        Ok(config)
    }

    fn log(&self) {
        tracing::info!(
            in_queue = %self.in_queue,
            out_queue = %self.out_queue,
            cache_queue = ?self.cache_queue,
            poll_timeout_secs = self.poll_timeout.as_secs(),
            data_source = ?self.data_source,
            message_bucket = %self.message_bucket,
            download_dir = %self.download_dir,
            work_queue_size = self.work_queue_size,
            workers = self.workers,
            "loaded configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    /// Environment variables are process-global; serialize tests that touch
    /// them so they don't race each other.
    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(())).lock().unwrap()
    }

    const REQUIRED_VARS: &[(&str, &str)] = &[
        ("MARC_INGEST_IN_QUEUE", "inbound-notifications"),
        ("MARC_INGEST_OUT_QUEUE", "marc-records"),
        ("MARC_INGEST_POLL_TIMEOUT", "20"),
        ("MARC_INGEST_MESSAGE_BUCKET", "large-message-bucket"),
        ("MARC_INGEST_DOWNLOAD_DIR", "/tmp/marc-ingest"),
        ("MARC_INGEST_WORK_QUEUE_SIZE", "10000"),
        ("MARC_INGEST_WORKERS", "4"),
    ];

    fn set_required_vars() {
        for (k, v) in REQUIRED_VARS {
            std::env::set_var(k, v);
        }
    }

    fn clear_all_vars() {
        for (k, _) in REQUIRED_VARS {
            std::env::remove_var(k);
        }
        std::env::remove_var("MARC_INGEST_CACHE_QUEUE");
        std::env::remove_var("MARC_INGEST_DATA_SOURCE");
    }

    #[test]
    fn loads_complete_config() {
        let _guard = env_lock();
        clear_all_vars();
        set_required_vars();

        let config = RuntimeConfig::load().unwrap();
        assert_eq!(config.in_queue, "inbound-notifications");
        assert_eq!(config.workers, 4);
        assert_eq!(config.poll_timeout, Duration::from_secs(20));
        assert!(config.cache_queue.is_none());
        assert!(config.data_source.is_none());

        clear_all_vars();
    }

    #[test]
    fn missing_required_var_is_an_error() {
        let _guard = env_lock();
        clear_all_vars();
        set_required_vars();
        std::env::remove_var("MARC_INGEST_WORKERS");

        let err = RuntimeConfig::load().unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired("MARC_INGEST_WORKERS")));

        clear_all_vars();
    }

    #[test]
    fn non_numeric_value_is_an_error() {
        let _guard = env_lock();
        clear_all_vars();
        set_required_vars();
        std::env::set_var("MARC_INGEST_WORKERS", "not-a-number");

        let err = RuntimeConfig::load().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "MARC_INGEST_WORKERS", .. }));

        clear_all_vars();
    }

    #[test]
    fn optional_cache_queue_is_picked_up_when_set() {
        let _guard = env_lock();
        clear_all_vars();
        set_required_vars();
        std::env::set_var("MARC_INGEST_CACHE_QUEUE", "marc-records-cache");

        let config = RuntimeConfig::load().unwrap();
        assert_eq!(config.cache_queue.as_deref(), Some("marc-records-cache"));

        clear_all_vars();
    }
}
