//! Key-to-shard router over a fixed set of connection pools
//!
//! `shard_index = hash(key) mod N`. N is fixed for the lifetime of the router;
//! changing it remaps existing keys, there is no consistent-hash ring.

use super::connection::{Command, PoolOptions, Reply, ShardConnector};
use super::hash::HashStrategy;
use super::pool::ShardPool;
use crate::shardline::config::StoreConfig;
use crate::shardline::error::{ConfigError, StoreError, StoreResult};
use log::{debug, info, warn};
use std::sync::Arc;

/// Routes keyed commands to shard pools and retries failed attempts
pub struct StoreRouter {
    name: String,
    pools: Vec<ShardPool>,
    strategy: HashStrategy,
    max_retry: u32,
}

impl StoreRouter {
    /// Build one pool per address. Pool `i` is bound to `addresses[i]`.
    pub fn new(
        name: impl Into<String>,
        addresses: &[String],
        strategy: HashStrategy,
        options: PoolOptions,
        max_retry: u32,
        connector: Arc<dyn ShardConnector>,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConfigError::invalid("store.name", "must not be empty"));
        }
        if addresses.is_empty() {
            return Err(ConfigError::invalid("store.nodes", "at least one node is required"));
        }
        if let Some(i) = addresses.iter().position(|a| a.trim().is_empty()) {
            return Err(ConfigError::invalid(
                format!("store.nodes[{}].address", i),
                "must not be empty",
            ));
        }

        let pools = addresses
            .iter()
            .enumerate()
            .map(|(index, address)| {
                ShardPool::new(index, address.clone(), options.clone(), connector.clone())
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            "Store '{}': {} shards, hasher {}, max retry {}",
            name,
            addresses.len(),
            strategy,
            max_retry
        );

        Ok(Self {
            name,
            pools,
            strategy,
            max_retry,
        })
    }

    pub fn from_config(
        config: &StoreConfig,
        connector: Arc<dyn ShardConnector>,
    ) -> Result<Self, ConfigError> {
        Self::new(
            config.name.clone(),
            &config.addresses(),
            config.hasher,
            config.pool_options(),
            config.max_retry,
            connector,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shard_count(&self) -> usize {
        self.pools.len()
    }

    pub fn strategy(&self) -> HashStrategy {
        self.strategy
    }

    pub fn max_retry(&self) -> u32 {
        self.max_retry
    }

    pub fn pool(&self, index: usize) -> Option<&ShardPool> {
        self.pools.get(index)
    }

    /// Shard index for a routing key
    pub fn shard_for(&self, key: &str) -> usize {
        (self.strategy.hash(key) % self.pools.len() as u64) as usize
    }

    /// Run a keyed command on the shard its key hashes to.
    /// The key is sent as the command's first argument.
    pub async fn execute(&self, key: &str, command: Command) -> StoreResult<Reply> {
        let index = self.shard_for(key);
        self.run(&self.pools[index], &command.with_key(key)).await
    }

    /// Run a command on a specific shard, bypassing hashing
    pub async fn execute_on_shard(&self, index: usize, command: Command) -> StoreResult<Reply> {
        let pool = self.pools.get(index).ok_or(StoreError::InvalidShard {
            index,
            shards: self.pools.len(),
        })?;
        self.run(pool, &command).await
    }

    /// Up to `max_retry + 1` attempts. Nil replies count as success.
    async fn run(&self, pool: &ShardPool, command: &Command) -> StoreResult<Reply> {
        let mut attempt = 0;
        loop {
            match Self::attempt(pool, command).await {
                Ok(reply) => return Ok(reply),
                Err(e) if attempt < self.max_retry && !matches!(e, StoreError::PoolClosed { .. }) => {
                    attempt += 1;
                    debug!(
                        "Store '{}' shard {}: '{}' failed ({}), retry {}/{}",
                        self.name,
                        pool.index(),
                        command.name(),
                        e,
                        attempt,
                        self.max_retry
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt(pool: &ShardPool, command: &Command) -> StoreResult<Reply> {
        let mut conn = pool.get().await?;
        conn.execute(command).await
    }

    /// PING every shard once; used at startup to surface unreachable nodes
    pub async fn check_connectivity(&self) -> StoreResult<()> {
        for pool in &self.pools {
            self.run(pool, &Command::new("PING")).await?;
        }
        Ok(())
    }

    /// Close every pool, collecting all failures instead of stopping at the first
    pub async fn close(&self) -> StoreResult<()> {
        let mut failures = Vec::new();
        for pool in &self.pools {
            if let Err(e) = pool.close().await {
                warn!("Store '{}' shard {}: close failed: {}", self.name, pool.index(), e);
                failures.push(format!(
                    "fail to close connect pool for server: {}, cluster: {}, err: {}",
                    pool.index(),
                    self.name,
                    e
                ));
            }
        }
        if failures.is_empty() {
            info!("Store '{}' closed", self.name);
            Ok(())
        } else {
            Err(StoreError::Close(failures))
        }
    }
}
