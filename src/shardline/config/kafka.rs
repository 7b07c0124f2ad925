//! Upstream source configuration

use crate::shardline::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_CLIENT_ID: &str = "shardline";
pub const DEFAULT_CHANNEL_BUFFER_SIZE: usize = 10_000;

/// Where a new consumer group starts reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetReset {
    Earliest,
    Latest,
}

impl OffsetReset {
    pub fn as_str(&self) -> &'static str {
        match self {
            OffsetReset::Earliest => "earliest",
            OffsetReset::Latest => "latest",
        }
    }
}

impl Default for OffsetReset {
    fn default() -> Self {
        OffsetReset::Earliest
    }
}

impl fmt::Display for OffsetReset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Consumer group settings shared by every partition consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KafkaConsumerConfig {
    pub brokers: Vec<String>,
    pub topics: Vec<String>,
    pub group_id: String,

    #[serde(default)]
    pub auto_offset_reset: OffsetReset,

    /// Number of partition consumers
    #[serde(default = "default_routines")]
    pub routines: usize,

    /// Capacity of the shared work queue
    #[serde(default = "default_channel_buffer_size")]
    pub channel_buffer_size: usize,

    /// Type tag stamped on every forwarded message
    #[serde(default)]
    pub message_type: i32,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// Socket and request timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_timeout_ms: Option<u64>,

    /// Raw librdkafka properties applied last
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, String>,
}

const REDACTED: &str = "******";

fn default_routines() -> usize {
    1
}

fn default_channel_buffer_size() -> usize {
    DEFAULT_CHANNEL_BUFFER_SIZE
}

fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.to_string()
}

impl KafkaConsumerConfig {
    pub fn new(
        brokers: impl Into<String>,
        topic: impl Into<String>,
        group_id: impl Into<String>,
    ) -> Self {
        Self {
            brokers: vec![brokers.into()],
            topics: vec![topic.into()],
            group_id: group_id.into(),
            auto_offset_reset: OffsetReset::default(),
            routines: default_routines(),
            channel_buffer_size: DEFAULT_CHANNEL_BUFFER_SIZE,
            message_type: 0,
            client_id: default_client_id(),
            username: None,
            password: None,
            timeout_ms: None,
            session_timeout_ms: None,
            properties: HashMap::new(),
        }
    }

    pub fn with_routines(mut self, routines: usize) -> Self {
        self.routines = routines;
        self
    }

    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size;
        self
    }

    pub fn with_message_type(mut self, message_type: i32) -> Self {
        self.message_type = message_type;
        self
    }

    pub fn with_offset_reset(mut self, reset: OffsetReset) -> Self {
        self.auto_offset_reset = reset;
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Comma-joined bootstrap list
    pub fn bootstrap_servers(&self) -> String {
        self.brokers.join(",")
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn session_timeout(&self) -> Option<Duration> {
        self.session_timeout_ms.map(Duration::from_millis)
    }

    /// Mask raw properties whose key names a password or secret
    pub fn redact_properties(&mut self) {
        for (key, value) in self.properties.iter_mut() {
            let key = key.to_ascii_lowercase();
            if key.contains("password") || key.contains("secret") {
                *value = REDACTED.to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.brokers.is_empty() || self.brokers.iter().any(|b| b.trim().is_empty()) {
            return Err(ConfigError::invalid(
                "kafka_consumer.brokers",
                "at least one non-empty broker is required",
            ));
        }
        if self.topics.is_empty() || self.topics.iter().any(|t| t.trim().is_empty()) {
            return Err(ConfigError::invalid(
                "kafka_consumer.topics",
                "at least one non-empty topic is required",
            ));
        }
        if self.group_id.trim().is_empty() {
            return Err(ConfigError::invalid("kafka_consumer.group_id", "must not be empty"));
        }
        if self.routines == 0 {
            return Err(ConfigError::invalid("kafka_consumer.routines", "must be at least 1"));
        }
        if self.channel_buffer_size == 0 {
            return Err(ConfigError::invalid(
                "kafka_consumer.channel_buffer_size",
                "must be at least 1",
            ));
        }
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::invalid("kafka_consumer.client_id", "must not be empty"));
        }
        if let Some(username) = &self.username {
            if !username.is_empty() && self.password.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::invalid(
                    "kafka_consumer.password",
                    "required when username is set",
                ));
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> String {
        format!(
            "brokers={}, topics={}, group_id={}, offset_reset={}, routines={}, buffer={}",
            self.bootstrap_servers(),
            self.topics.join(","),
            self.group_id,
            self.auto_offset_reset,
            self.routines,
            self.channel_buffer_size
        )
    }
}
