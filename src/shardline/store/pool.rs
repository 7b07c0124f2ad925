//! Per-shard connection pool
//!
//! One `ShardPool` is bound to one node address for the lifetime of the
//! process. It is a `deadpool` managed pool over a [`ShardManager`] that opens
//! connections through the configured [`ShardConnector`] and health-checks
//! idle ones when they are borrowed again.

use super::connection::{Command, PoolOptions, Reply, ShardConnection, ShardConnector};
use crate::shardline::error::{ConfigError, StoreError, StoreResult};
use deadpool::managed::{self, Metrics, Object, Pool, PoolError, RecycleError, RecycleResult};
use deadpool::Runtime;
use log::{debug, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Idle connections older than this are pinged before reuse
const TEST_ON_BORROW_AFTER: Duration = Duration::from_secs(60);

/// Pool size used when `max_active` is 0
const UNBOUNDED_MAX_SIZE: usize = 1024;

/// A pooled connection together with the time it was last handed back
pub struct ShardSlot {
    conn: Box<dyn ShardConnection>,
    idle_since: Instant,
}

/// Opens and recycles connections for one shard node
pub struct ShardManager {
    index: usize,
    address: String,
    options: PoolOptions,
    connector: Arc<dyn ShardConnector>,
    opened: Arc<AtomicU64>,
}

impl managed::Manager for ShardManager {
    type Type = ShardSlot;
    type Error = StoreError;

    async fn create(&self) -> Result<ShardSlot, StoreError> {
        let conn = tokio::time::timeout(
            self.options.connect_timeout,
            self.connector.connect(&self.address, &self.options),
        )
        .await
        .map_err(|_| StoreError::Timeout {
            address: self.address.clone(),
            op: "connect",
        })??;
        self.opened.fetch_add(1, Ordering::Relaxed);
        Ok(ShardSlot {
            conn,
            idle_since: Instant::now(),
        })
    }

    async fn recycle(&self, slot: &mut ShardSlot, _: &Metrics) -> RecycleResult<StoreError> {
        let idle_for = slot.idle_since.elapsed();
        if idle_for > self.options.idle_timeout {
            debug!(
                "Shard {} ({}): discarding connection idle for {:?}",
                self.index, self.address, idle_for
            );
            return Err(RecycleError::Message("idle timeout exceeded".into()));
        }

        if idle_for >= TEST_ON_BORROW_AFTER {
            let ping = tokio::time::timeout(
                self.options.command_timeout(),
                slot.conn.execute(&Command::new("PING")),
            )
            .await;
            match ping {
                Ok(Ok(_)) => slot.idle_since = Instant::now(),
                Ok(Err(e)) => {
                    debug!(
                        "Shard {} ({}): idle connection failed health check: {}",
                        self.index, self.address, e
                    );
                    return Err(RecycleError::Backend(e));
                }
                Err(_) => {
                    debug!(
                        "Shard {} ({}): idle connection health check timed out",
                        self.index, self.address
                    );
                    return Err(RecycleError::Message("health check timed out".into()));
                }
            }
        }
        Ok(())
    }
}

/// Connection pool for a single shard node
pub struct ShardPool {
    index: usize,
    address: String,
    options: PoolOptions,
    opened: Arc<AtomicU64>,
    pool: Pool<ShardManager>,
}

impl ShardPool {
    pub fn new(
        index: usize,
        address: impl Into<String>,
        options: PoolOptions,
        connector: Arc<dyn ShardConnector>,
    ) -> Result<Self, ConfigError> {
        let address = address.into();
        let opened = Arc::new(AtomicU64::new(0));
        let manager = ShardManager {
            index,
            address: address.clone(),
            options: options.clone(),
            connector,
            opened: opened.clone(),
        };
        let max_size = match options.max_active {
            0 => UNBOUNDED_MAX_SIZE,
            n => n,
        };
        let timeouts = managed::Timeouts {
            wait: None,
            create: Some(options.connect_timeout),
            recycle: None,
        };
        let pool = Pool::builder(manager)
            .max_size(max_size)
            .timeouts(timeouts)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| {
                ConfigError::invalid(format!("store.nodes[{}]", index), e.to_string())
            })?;

        Ok(Self {
            index,
            address,
            options,
            opened,
            pool,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn options(&self) -> &PoolOptions {
        &self.options
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Connections currently parked in the idle set
    pub fn idle_count(&self) -> usize {
        self.pool.status().available
    }

    /// Connections opened over the pool's lifetime
    pub fn opened_count(&self) -> u64 {
        self.opened.load(Ordering::Relaxed)
    }

    /// Borrow a connection, reusing an idle one when it is still healthy
    pub async fn get(&self) -> StoreResult<PooledConnection<'_>> {
        let object = self.pool.get().await.map_err(|e| match e {
            PoolError::Closed => StoreError::PoolClosed { index: self.index },
            PoolError::Backend(e) => e,
            PoolError::Timeout(_) => StoreError::Timeout {
                address: self.address.clone(),
                op: "connect",
            },
            other => StoreError::Command {
                address: self.address.clone(),
                reason: other.to_string(),
            },
        })?;
        Ok(PooledConnection {
            pool: self,
            object: Some(object),
            broken: false,
        })
    }

    /// Close the pool and every idle connection. Waiting borrowers fail with
    /// `PoolClosed`; connections still borrowed are dropped when returned.
    pub async fn close(&self) -> StoreResult<()> {
        if self.pool.is_closed() {
            return Ok(());
        }
        let drained = self.pool.retain(|_, _| false).removed;
        self.pool.close();

        let mut failures = Vec::new();
        for slot in drained {
            if let Err(e) = slot.conn.close().await {
                failures.push(e.to_string());
            }
        }

        match failures.len() {
            0 => Ok(()),
            1 => Err(StoreError::Command {
                address: self.address.clone(),
                reason: failures.remove(0),
            }),
            _ => Err(StoreError::Close(failures)),
        }
    }
}

/// A borrowed connection. Returned to its pool on drop.
pub struct PooledConnection<'a> {
    pool: &'a ShardPool,
    object: Option<Object<ShardManager>>,
    broken: bool,
}

impl PooledConnection<'_> {
    /// Run one command within the pool's read and write timeouts
    pub async fn execute(&mut self, command: &Command) -> StoreResult<Reply> {
        let pool = self.pool;
        let slot = self
            .object
            .as_mut()
            .ok_or(StoreError::PoolClosed { index: pool.index })?;

        let result = match tokio::time::timeout(
            pool.options.command_timeout(),
            slot.conn.execute(command),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout {
                address: pool.address.clone(),
                op: "command",
            }),
        };

        if let Err(e) = &result {
            if matches!(e, StoreError::Timeout { .. } | StoreError::Connect { .. }) {
                warn!(
                    "Shard {} ({}): dropping broken connection: {}",
                    pool.index, pool.address, e
                );
                self.broken = true;
            }
        }
        result
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        let Some(mut object) = self.object.take() else {
            return;
        };
        let idle = self.pool.pool.status().available;
        if self.broken || idle >= self.pool.options.max_idle {
            let _ = Object::take(object);
            return;
        }
        object.idle_since = Instant::now();
    }
}
