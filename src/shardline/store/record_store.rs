//! Record store seam used by the workers

use super::connection::Command;
use super::router::StoreRouter;
use crate::shardline::error::StoreResult;
use async_trait::async_trait;
use std::time::Duration;

/// Default time to live for stored records: five days
pub const DEFAULT_RECORD_TTL: Duration = Duration::from_secs(5 * 24 * 60 * 60);

/// Key-value sink for accepted records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn close(&self) -> StoreResult<()>;
}

/// Writes records through a [`StoreRouter`] with a bounded TTL
pub struct ShardedRecordStore {
    router: StoreRouter,
    ttl: Duration,
}

impl ShardedRecordStore {
    pub fn new(router: StoreRouter, ttl: Duration) -> Self {
        Self { router, ttl }
    }

    pub fn router(&self) -> &StoreRouter {
        &self.router
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[async_trait]
impl RecordStore for ShardedRecordStore {
    /// `SET` then `EXPIRE`, both on the shard resolved once for the key so a
    /// non-deterministic hasher cannot split them across nodes.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let shard = self.router.shard_for(key);
        self.router
            .execute_on_shard(shard, Command::new("SET").arg(value).with_key(key))
            .await?;
        self.router
            .execute_on_shard(
                shard,
                Command::new("EXPIRE").arg(self.ttl.as_secs()).with_key(key),
            )
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let reply = self.router.execute(key, Command::new("GET")).await?;
        Ok(reply.as_string())
    }

    async fn close(&self) -> StoreResult<()> {
        self.router.close().await
    }
}
