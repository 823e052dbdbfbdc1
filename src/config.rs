//! # Configuration
//!
//! Layered configuration for the broker connection, the batch engine and the
//! dispatcher. Sources are merged in order: built-in defaults, an optional
//! TOML file, then environment variables.
//!
//! ## Environment
//!
//! ```bash
//! REDIS__HOST=localhost
//! REDIS__PORT=6379
//! REDIS__DB=0
//! REDIS__PASSWORD=
//! REDIS__STREAM_KEY_REQUEST=request
//! REDIS__STREAM_GROUP_PROCESSOR=processor
//! REDIS__STREAM_KEY_RESPONSE=response
//! REDIS__STREAM_GROUP_BATCHER=batcher
//!
//! DYNAMIC_BATCHER__BATCH_SIZE=64
//! DYNAMIC_BATCHER__BATCH_TIME=2
//! DYNAMIC_BATCHER__RESPONSE_TTL=600
//! DYNAMIC_BATCHER__DELAY=0.01
//! DYNAMIC_BATCHER__TIMEOUT=100
//! ```
//!
//! A double underscore separates the section from the key, so
//! `REDIS__STREAM_KEY_REQUEST` lands on `redis.stream_key_request`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::{BatcherError, Result};

const ENV_PREFIXES: [&str; 2] = ["REDIS__", "DYNAMIC_BATCHER__"];

/// Broker connection and stream naming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    /// Logical database index
    pub db: i64,
    pub password: Option<String>,
    /// Stream that carries request entries
    pub stream_key_request: String,
    /// Consumer group the batch engines claim from
    pub stream_group_processor: String,
    /// Response stream, trimmed alongside the request stream
    pub stream_key_response: String,
    pub stream_group_batcher: String,
    /// Consumer identity of this batch engine; defaults to the processor group name
    pub stream_consumer: Option<String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            password: None,
            stream_key_request: "request".to_string(),
            stream_group_processor: "processor".to_string(),
            stream_key_response: "response".to_string(),
            stream_group_batcher: "batcher".to_string(),
            stream_consumer: None,
        }
    }
}

impl BrokerConfig {
    /// Connection URL including the credential, for the client only
    pub fn connection_url(&self) -> String {
        match self.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.db
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }

    /// Connection URL safe to log
    pub fn redacted_url(&self) -> String {
        match self.password.as_deref().filter(|p| !p.is_empty()) {
            Some(_) => format!("redis://:***@{}:{}/{}", self.host, self.port, self.db),
            None => self.connection_url(),
        }
    }

    /// Consumer name used when claiming entries
    pub fn consumer_name(&self) -> &str {
        self.stream_consumer
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(&self.stream_group_processor)
    }

    /// Set the consumer identity (one per concurrently running engine)
    pub fn with_consumer<S: Into<String>>(mut self, consumer: S) -> Self {
        self.stream_consumer = Some(consumer.into());
        self
    }

    /// Summary of the broker settings with the credential removed
    pub fn info(&self) -> HashMap<&'static str, String> {
        HashMap::from([
            ("url", self.redacted_url()),
            ("stream_key_request", self.stream_key_request.clone()),
            ("stream_group_processor", self.stream_group_processor.clone()),
            ("stream_key_response", self.stream_key_response.clone()),
            ("stream_group_batcher", self.stream_group_batcher.clone()),
            ("stream_consumer", self.consumer_name().to_string()),
        ])
    }

    pub fn validate(&self) -> Result<()> {
        let names = [
            ("stream_key_request", &self.stream_key_request),
            ("stream_group_processor", &self.stream_group_processor),
            ("stream_key_response", &self.stream_key_response),
            ("stream_group_batcher", &self.stream_group_batcher),
        ];
        for (field, value) in names {
            if value.trim().is_empty() {
                return Err(BatcherError::configuration(format!(
                    "redis.{field} must not be empty"
                )));
            }
        }
        if self.stream_key_request == self.stream_key_response {
            return Err(BatcherError::configuration(
                "request and response streams must use different keys",
            ));
        }
        Ok(())
    }
}

/// Batching knobs as they appear in files and the environment (seconds as floats)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    /// Maximum number of items per batch
    pub batch_size: usize,
    /// Maximum seconds spent collecting one batch
    pub batch_time: f64,
    /// Seconds a result entry stays readable
    pub response_ttl: u64,
    /// Seconds between claim attempts while collecting
    pub collect_delay: f64,
    /// Reclaim pending entries idle for this many seconds (disabled when unset)
    pub reclaim_idle: Option<f64>,
    /// Seconds between dispatcher polls
    pub delay: f64,
    /// Seconds the dispatcher waits in each phase
    pub timeout: f64,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            batch_time: 2.0,
            response_ttl: 600,
            collect_delay: 0.001,
            reclaim_idle: None,
            delay: 0.01,
            timeout: 100.0,
        }
    }
}

impl BatchingConfig {
    /// Engine-side view
    pub fn processor(&self) -> ProcessorConfig {
        ProcessorConfig {
            batch_size: self.batch_size,
            batch_time: secs(self.batch_time),
            collect_delay: secs(self.collect_delay),
            response_ttl: Duration::from_secs(self.response_ttl),
            reclaim_idle: self
                .reclaim_idle
                .map(secs),
        }
    }

    /// Caller-side view
    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig {
            delay: secs(self.delay),
            timeout: secs(self.timeout),
        }
    }
}

/// Fractional seconds from a config file; negative values clamp to zero
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::MAX)
}

/// Batch engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorConfig {
    pub batch_size: usize,
    pub batch_time: Duration,
    pub collect_delay: Duration,
    pub response_ttl: Duration,
    pub reclaim_idle: Option<Duration>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        BatchingConfig::default().processor()
    }
}

impl ProcessorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_batch_time(mut self, batch_time: Duration) -> Self {
        self.batch_time = batch_time;
        self
    }

    pub fn with_collect_delay(mut self, delay: Duration) -> Self {
        self.collect_delay = delay;
        self
    }

    pub fn with_response_ttl(mut self, ttl: Duration) -> Self {
        self.response_ttl = ttl;
        self
    }

    pub fn with_reclaim_idle(mut self, idle: Duration) -> Self {
        self.reclaim_idle = Some(idle);
        self
    }

    /// Stream length kept after each iteration
    pub fn retention_len(&self) -> usize {
        self.batch_size.saturating_mul(10)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(BatcherError::configuration("batch_size must be at least 1"));
        }
        if self.batch_time.is_zero() {
            return Err(BatcherError::configuration(
                "batch_time must be greater than zero",
            ));
        }
        if self.response_ttl.as_secs() == 0 {
            return Err(BatcherError::configuration(
                "response_ttl must be at least one second",
            ));
        }
        Ok(())
    }
}

/// Dispatcher configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    /// Interval between polls
    pub delay: Duration,
    /// Deadline applied to each wait phase
    pub timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        BatchingConfig::default().dispatcher()
    }
}

impl DispatcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.delay.is_zero() {
            return Err(BatcherError::configuration("delay must be greater than zero"));
        }
        if self.timeout.is_zero() {
            return Err(BatcherError::configuration(
                "timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatcherConfig {
    pub redis: BrokerConfig,
    pub dynamic_batcher: BatchingConfig,
}

impl BatcherConfig {
    /// Load from the process environment, with an optional TOML file underneath
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let env: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| ENV_PREFIXES.iter().any(|prefix| key.starts_with(prefix)))
            .collect();
        Self::load_from(file, env)
    }

    /// Load from an explicit set of environment variables
    pub fn load_from(file: Option<&Path>, env: HashMap<String, String>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            if !path.exists() {
                return Err(BatcherError::configuration(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let env: HashMap<String, String> = env
            .into_iter()
            .filter(|(key, _)| ENV_PREFIXES.iter().any(|prefix| key.starts_with(prefix)))
            .collect();

        builder = builder.add_source(
            config::Environment::default()
                .separator("__")
                .try_parsing(true)
                .source(Some(env)),
        );

        let loaded: BatcherConfig = builder.build()?.try_deserialize()?;
        loaded.validate()?;

        debug!(
            url = %loaded.redis.redacted_url(),
            batch_size = loaded.dynamic_batcher.batch_size,
            batch_time = loaded.dynamic_batcher.batch_time,
            "Configuration loaded"
        );

        Ok(loaded)
    }

    pub fn validate(&self) -> Result<()> {
        self.redis.validate()?;
        self.dynamic_batcher.processor().validate()?;
        self.dynamic_batcher.dispatcher().validate()
    }

    /// Flattened, credential-free view of the effective settings
    pub fn info(&self) -> serde_json::Value {
        let batching = &self.dynamic_batcher;
        serde_json::json!({
            "redis": self.redis.info(),
            "dynamic_batcher": {
                "batch_size": batching.batch_size,
                "batch_time": batching.batch_time,
                "response_ttl": batching.response_ttl,
                "collect_delay": batching.collect_delay,
                "reclaim_idle": batching.reclaim_idle,
                "delay": batching.delay,
                "timeout": batching.timeout,
            }
        })
    }
}
