//! Pipeline configuration
//!
//! A YAML document decoded into independent value objects. Each section
//! validates itself; [`PipelineConfig::validate`] runs them all. The
//! controller receives the sections it needs through its constructor.
//!
//! ```yaml
//! title: transmit ingest
//! kafka_consumer:
//!   brokers: ["k1:9092"]
//!   topics: ["transmit"]
//!   group_id: transmit-group
//! store:
//!   name: transmit-cluster
//!   hasher: fnv32
//!   nodes: [{ address: "r1:6379" }]
//! ```

pub mod kafka;
pub mod store;
pub mod worker;

pub use kafka::{KafkaConsumerConfig, OffsetReset};
pub use store::{StoreConfig, StoreNode};
pub use worker::{ClassifierConfig, WorkerConfig};

use crate::shardline::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter for env_logger; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.level.to_lowercase().as_str() {
            "off" | "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
            other => Err(ConfigError::invalid(
                "logging.level",
                format!("unknown level '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// How long workers may keep draining the queue after consumers stop.
    /// `null` waits without a deadline.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: Option<u64>,
}

fn default_drain_timeout_ms() -> Option<u64> {
    Some(30_000)
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

impl ShutdownConfig {
    pub fn drain_timeout(&self) -> Option<Duration> {
        self.drain_timeout_ms.map(Duration::from_millis)
    }
}

/// Complete service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub scene: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    pub kafka_consumer: KafkaConsumerConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    pub store: StoreConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl PipelineConfig {
    pub fn new(kafka_consumer: KafkaConsumerConfig, store: StoreConfig) -> Self {
        Self {
            title: String::new(),
            scene: String::new(),
            logging: LoggingConfig::default(),
            kafka_consumer,
            worker: WorkerConfig::default(),
            store,
            classifier: ClassifierConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }

    pub fn with_worker(mut self, worker: WorkerConfig) -> Self {
        self.worker = worker;
        self
    }

    pub fn with_classifier(mut self, classifier: ClassifierConfig) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownConfig) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Read, parse and validate a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.logging.validate()?;
        self.kafka_consumer.validate()?;
        self.worker.validate()?;
        self.store.validate()?;
        self.classifier.validate()?;
        Ok(())
    }

    /// YAML dump with secrets omitted
    pub fn to_pretty_string(&self) -> Result<String, ConfigError> {
        let mut shown = self.clone();
        shown.kafka_consumer.redact_properties();
        Ok(serde_yaml::to_string(&shown)?)
    }

    pub fn summary(&self) -> String {
        format!(
            "Pipeline '{}': kafka[{}], workers={}, store[{}]",
            self.title,
            self.kafka_consumer.summary(),
            self.worker.routines,
            self.store.summary()
        )
    }
}
