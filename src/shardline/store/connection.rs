//! Shard connection contract
//!
//! The router speaks to shard nodes through [`ShardConnector`] and
//! [`ShardConnection`]. The Redis backend implements them for real nodes and
//! the in-memory backend implements them for tests.

use crate::shardline::error::StoreResult;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// A store command and its arguments, in wire order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    args: Vec<String>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument
    pub fn arg(mut self, arg: impl ToString) -> Self {
        self.args.push(arg.to_string());
        self
    }

    /// Prepend the routing key, which is always the first argument of a keyed command
    pub fn with_key(mut self, key: &str) -> Self {
        self.args.insert(0, key.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Reply from a shard node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Missing value. Counts as a successful command.
    Nil,
    Status(String),
    Int(i64),
    Bytes(Vec<u8>),
    Array(Vec<Reply>),
}

impl Reply {
    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Nil)
    }

    /// Textual view of a scalar reply; `None` for nil and arrays
    pub fn as_string(&self) -> Option<String> {
        match self {
            Reply::Status(s) => Some(s.clone()),
            Reply::Int(i) => Some(i.to_string()),
            Reply::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
            Reply::Nil | Reply::Array(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Reply::Int(i) => Some(*i),
            Reply::Bytes(_) | Reply::Status(_) => self.as_string()?.parse().ok(),
            Reply::Nil | Reply::Array(_) => None,
        }
    }
}

/// Per-pool connection parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    /// Logical database selected on connect
    pub database: u32,
    /// Connections kept idle for reuse
    pub max_idle: usize,
    /// Concurrent borrows allowed; 0 means unbounded
    pub max_active: usize,
    /// Idle connections older than this are discarded on borrow
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl PoolOptions {
    /// Deadline for one command round trip
    pub fn command_timeout(&self) -> Duration {
        self.read_timeout + self.write_timeout
    }
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            database: 0,
            max_idle: 5,
            max_active: 0,
            idle_timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_millis(5),
            read_timeout: Duration::from_millis(5),
            write_timeout: Duration::from_millis(5),
        }
    }
}

/// An open connection to one shard node
#[async_trait]
pub trait ShardConnection: Send {
    async fn execute(&mut self, command: &Command) -> StoreResult<Reply>;

    /// Release the underlying transport
    async fn close(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

/// Opens connections to shard nodes
#[async_trait]
pub trait ShardConnector: Send + Sync {
    async fn connect(
        &self,
        address: &str,
        options: &PoolOptions,
    ) -> StoreResult<Box<dyn ShardConnection>>;
}
