//! Sharded store configuration

use crate::shardline::error::ConfigError;
use crate::shardline::store::{HashStrategy, PoolOptions};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One shard node. Its position in `nodes` is its shard index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreNode {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Cluster name, used in logs and close errors
    pub name: String,

    #[serde(default)]
    pub hasher: HashStrategy,

    #[serde(default)]
    pub database: u32,

    #[serde(default = "default_max_idle")]
    pub max_idle: usize,

    /// 0 means unbounded
    #[serde(default)]
    pub max_active: usize,

    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    #[serde(default = "default_network_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_network_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_network_timeout_ms")]
    pub write_timeout_ms: u64,

    /// Extra attempts after a failed command
    #[serde(default)]
    pub max_retry: u32,

    /// PING every shard during startup
    #[serde(default = "default_verify_on_start")]
    pub verify_on_start: bool,

    pub nodes: Vec<StoreNode>,
}

fn default_max_idle() -> usize {
    5
}

fn default_idle_timeout_ms() -> u64 {
    5 * 60 * 1000
}

fn default_network_timeout_ms() -> u64 {
    5
}

fn default_verify_on_start() -> bool {
    true
}

impl StoreConfig {
    pub fn new(name: impl Into<String>, addresses: &[&str]) -> Self {
        Self {
            name: name.into(),
            hasher: HashStrategy::default(),
            database: 0,
            max_idle: default_max_idle(),
            max_active: 0,
            idle_timeout_ms: default_idle_timeout_ms(),
            connect_timeout_ms: default_network_timeout_ms(),
            read_timeout_ms: default_network_timeout_ms(),
            write_timeout_ms: default_network_timeout_ms(),
            max_retry: 0,
            verify_on_start: default_verify_on_start(),
            nodes: addresses
                .iter()
                .map(|a| StoreNode {
                    address: a.to_string(),
                })
                .collect(),
        }
    }

    pub fn with_hasher(mut self, hasher: HashStrategy) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    /// Apply one timeout to connect, read and write
    pub fn with_network_timeout(mut self, timeout: Duration) -> Self {
        let ms = timeout.as_millis() as u64;
        self.connect_timeout_ms = ms;
        self.read_timeout_ms = ms;
        self.write_timeout_ms = ms;
        self
    }

    pub fn addresses(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.address.clone()).collect()
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            database: self.database,
            max_idle: self.max_idle,
            max_active: self.max_active,
            idle_timeout: Duration::from_millis(self.idle_timeout_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("store.name", "must not be empty"));
        }
        if self.nodes.is_empty() {
            return Err(ConfigError::invalid("store.nodes", "at least one node is required"));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if node.address.trim().is_empty() {
                return Err(ConfigError::invalid(
                    format!("store.nodes[{}].address", i),
                    "must not be empty",
                ));
            }
        }
        for (field, value) in [
            ("store.connect_timeout_ms", self.connect_timeout_ms),
            ("store.read_timeout_ms", self.read_timeout_ms),
            ("store.write_timeout_ms", self.write_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be greater than 0"));
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> String {
        format!(
            "name={}, shards={}, hasher={}, max_retry={}, max_idle={}, max_active={}",
            self.name,
            self.nodes.len(),
            self.hasher,
            self.max_retry,
            self.max_idle,
            self.max_active
        )
    }
}
