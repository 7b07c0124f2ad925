//! Redis shard backend

use super::connection::{Command, PoolOptions, Reply, ShardConnection, ShardConnector};
use crate::shardline::error::{StoreError, StoreResult};
use async_trait::async_trait;
use log::debug;
use redis::aio::MultiplexedConnection;

/// Connects to Redis nodes given as `host:port` or full `redis://` URLs
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisConnector;

impl RedisConnector {
    fn url(address: &str, database: u32) -> String {
        if address.contains("://") {
            address.to_string()
        } else {
            format!("redis://{}/{}", address, database)
        }
    }
}

#[async_trait]
impl ShardConnector for RedisConnector {
    async fn connect(
        &self,
        address: &str,
        options: &PoolOptions,
    ) -> StoreResult<Box<dyn ShardConnection>> {
        let url = Self::url(address, options.database);
        let client = redis::Client::open(url.as_str()).map_err(|e| StoreError::Connect {
            address: address.to_string(),
            reason: e.to_string(),
        })?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Connect {
                address: address.to_string(),
                reason: e.to_string(),
            })?;
        debug!("Opened redis connection to {}", address);
        Ok(Box::new(RedisConnection {
            address: address.to_string(),
            conn,
        }))
    }
}

struct RedisConnection {
    address: String,
    conn: MultiplexedConnection,
}

impl RedisConnection {
    fn map_error(&self, err: redis::RedisError) -> StoreError {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            StoreError::Connect {
                address: self.address.clone(),
                reason: err.to_string(),
            }
        } else if err.is_timeout() {
            StoreError::Timeout {
                address: self.address.clone(),
                op: "command",
            }
        } else {
            StoreError::Command {
                address: self.address.clone(),
                reason: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl ShardConnection for RedisConnection {
    async fn execute(&mut self, command: &Command) -> StoreResult<Reply> {
        let mut cmd = redis::cmd(command.name());
        for arg in command.args() {
            cmd.arg(arg.as_str());
        }
        let value: redis::Value = match cmd.query_async(&mut self.conn).await {
            Ok(value) => value,
            Err(e) => return Err(self.map_error(e)),
        };
        Ok(Reply::from(value))
    }
}

impl From<redis::Value> for Reply {
    fn from(value: redis::Value) -> Self {
        match value {
            redis::Value::Nil => Reply::Nil,
            redis::Value::Int(i) => Reply::Int(i),
            redis::Value::BulkString(bytes) => Reply::Bytes(bytes),
            redis::Value::SimpleString(s) => Reply::Status(s),
            redis::Value::Okay => Reply::Status("OK".to_string()),
            redis::Value::Array(items) => Reply::Array(items.into_iter().map(Reply::from).collect()),
            other => Reply::Status(format!("{:?}", other)),
        }
    }
}
