//! Error types for the ingestion pipeline
//!
//! Startup errors (`ConfigError`, `SourceError`, connect failures) abort the
//! process before serving begins. Per-message errors (`ClassifyError`,
//! `StoreError`) are contained to the message that produced them.

use rdkafka::error::KafkaError;
use std::fmt;

/// Configuration loading and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read configuration '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration document is not valid YAML for the expected shape
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A field holds a value the pipeline cannot run with
    #[error("Invalid configuration '{field}': {reason}")]
    Invalid { field: String, reason: String },

    /// The store hasher name is not one of the supported strategies
    #[error("Unknown hasher '{0}'. Valid values: fnv32, fnv32a, random, numeric-suffix")]
    UnknownHasher(String),
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by the upstream log source client
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Client creation or topic subscription failed
    #[error("Failed to connect consumer {consumer_id} to {brokers}: {source}")]
    Connect {
        consumer_id: usize,
        brokers: String,
        #[source]
        source: KafkaError,
    },

    /// Advancing the read position failed
    #[error("Failed to store offset {topic}/{partition}@{offset}: {source}")]
    Acknowledge {
        topic: String,
        partition: i32,
        offset: i64,
        #[source]
        source: KafkaError,
    },
}

/// Errors raised by the sharded store router and its pools
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A connection to a shard node could not be established
    #[error("Failed to connect to shard node {address}: {reason}")]
    Connect { address: String, reason: String },

    /// A network operation exceeded its configured timeout
    #[error("Timed out during {op} on shard node {address}")]
    Timeout { address: String, op: &'static str },

    /// The backend rejected or failed the command
    #[error("Command failed on shard node {address}: {reason}")]
    Command { address: String, reason: String },

    /// A direct shard call named an index outside the shard set
    #[error("Invalid shard index {index}, must be less than {shards}")]
    InvalidShard { index: usize, shards: usize },

    /// The shard pool was closed before or during the call
    #[error("Connection pool for shard {index} is closed")]
    PoolClosed { index: usize },

    /// One or more shard pools failed to close
    #[error("Failed to close store: {}", .0.join("|"))]
    Close(Vec<String>),
}

/// Reasons the classifier marks a payload invalid
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    /// The payload is not a well-formed record
    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A field required to build the record is missing
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),
}

/// Top-level error for pipeline construction and lifecycle calls
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A lifecycle call arrived in the wrong state
    #[error("Lifecycle violation: {0}")]
    Lifecycle(String),
}

impl PipelineError {
    pub fn lifecycle(message: impl fmt::Display) -> Self {
        Self::Lifecycle(message.to_string())
    }
}

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
