//! In-memory shard backend
//!
//! Process-local implementation of the shard connection contract. Each
//! address gets its own [`MemoryNode`] holding data, command counters and
//! injectable faults.

use super::connection::{Command, PoolOptions, Reply, ShardConnection, ShardConnector};
use crate::shardline::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum Data {
    Value(String),
    Hash(HashMap<String, String>),
}

#[derive(Debug, Clone)]
struct Entry {
    data: Data,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.expires_at.map_or(true, |at| at > Instant::now())
    }
}

/// One simulated shard node
#[derive(Debug, Default)]
pub struct MemoryNode {
    address: String,
    entries: Mutex<HashMap<String, Entry>>,
    commands: AtomicU64,
    connections: AtomicU64,
    fail_next: AtomicU32,
    refuse_connections: AtomicBool,
    latency: Mutex<Option<Duration>>,
    close_error: Mutex<Option<String>>,
}

impl MemoryNode {
    fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            ..Self::default()
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Commands received, including failed ones
    pub fn command_count(&self) -> u64 {
        self.commands.load(Ordering::SeqCst)
    }

    /// Connections opened against this node
    pub fn connection_count(&self) -> u64 {
        self.connections.load(Ordering::SeqCst)
    }

    /// Fail the next `n` commands with a command error
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Refuse new connections until reset
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    /// Delay every command by `latency`
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = Some(latency);
    }

    /// Make connection close report `reason`
    pub fn fail_close(&self, reason: impl Into<String>) {
        *self.close_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason.into());
    }

    /// Live value stored under `key`
    pub fn value(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some(Entry {
                data: Data::Value(v),
                expires_at,
            }) if expires_at.map_or(true, |at| at > Instant::now()) => Some(v.clone()),
            _ => None,
        }
    }

    /// Remaining time to live of `key`, if one is set
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Number of live keys
    pub fn key_count(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.values().filter(|e| e.is_live()).count()
    }

    async fn execute(&self, command: &Command) -> StoreResult<Reply> {
        self.commands.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(self.command_error("injected failure"));
        }

        self.apply(command)
    }

    fn command_error(&self, reason: impl Into<String>) -> StoreError {
        StoreError::Command {
            address: self.address.clone(),
            reason: reason.into(),
        }
    }

    fn apply(&self, command: &Command) -> StoreResult<Reply> {
        let args = command.args();
        let arity = |n: usize| -> StoreResult<()> {
            if args.len() < n {
                Err(self.command_error(format!(
                    "ERR wrong number of arguments for '{}' command",
                    command.name().to_lowercase()
                )))
            } else {
                Ok(())
            }
        };
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, e| e.is_live());

        match command.name().to_uppercase().as_str() {
            "PING" => Ok(Reply::Status("PONG".to_string())),
            "SET" => {
                arity(2)?;
                entries.insert(
                    args[0].clone(),
                    Entry {
                        data: Data::Value(args[1].clone()),
                        expires_at: None,
                    },
                );
                Ok(Reply::Status("OK".to_string()))
            }
            "SETEX" => {
                arity(3)?;
                let secs = self.parse_int(&args[1])?;
                entries.insert(
                    args[0].clone(),
                    Entry {
                        data: Data::Value(args[2].clone()),
                        expires_at: expiry(secs),
                    },
                );
                Ok(Reply::Status("OK".to_string()))
            }
            "GET" => {
                arity(1)?;
                match entries.get(&args[0]) {
                    Some(Entry {
                        data: Data::Value(v),
                        ..
                    }) => Ok(Reply::Bytes(v.clone().into_bytes())),
                    Some(_) => Err(self.command_error(
                        "WRONGTYPE Operation against a key holding the wrong kind of value",
                    )),
                    None => Ok(Reply::Nil),
                }
            }
            "EXPIRE" => {
                arity(2)?;
                let secs = self.parse_int(&args[1])?;
                match entries.get_mut(&args[0]) {
                    Some(entry) => {
                        entry.expires_at = expiry(secs);
                        Ok(Reply::Int(1))
                    }
                    None => Ok(Reply::Int(0)),
                }
            }
            "TTL" => {
                arity(1)?;
                match entries.get(&args[0]) {
                    Some(Entry {
                        expires_at: Some(at),
                        ..
                    }) => Ok(Reply::Int(
                        at.saturating_duration_since(Instant::now()).as_secs() as i64,
                    )),
                    Some(_) => Ok(Reply::Int(-1)),
                    None => Ok(Reply::Int(-2)),
                }
            }
            "DEL" => {
                arity(1)?;
                let removed = args.iter().filter(|k| entries.remove(*k).is_some()).count();
                Ok(Reply::Int(removed as i64))
            }
            "HINCRBY" => {
                arity(3)?;
                let delta = self.parse_int(&args[2])?;
                let entry = entries.entry(args[0].clone()).or_insert_with(|| Entry {
                    data: Data::Hash(HashMap::new()),
                    expires_at: None,
                });
                let Data::Hash(fields) = &mut entry.data else {
                    return Err(self.command_error(
                        "WRONGTYPE Operation against a key holding the wrong kind of value",
                    ));
                };
                let current = match fields.get(&args[1]) {
                    Some(v) => self.parse_int(v)?,
                    None => 0,
                };
                let next = current + delta;
                fields.insert(args[1].clone(), next.to_string());
                Ok(Reply::Int(next))
            }
            "HGET" => {
                arity(2)?;
                match entries.get(&args[0]) {
                    Some(Entry {
                        data: Data::Hash(fields),
                        ..
                    }) => Ok(fields
                        .get(&args[1])
                        .map_or(Reply::Nil, |v| Reply::Bytes(v.clone().into_bytes()))),
                    Some(_) => Err(self.command_error(
                        "WRONGTYPE Operation against a key holding the wrong kind of value",
                    )),
                    None => Ok(Reply::Nil),
                }
            }
            other => Err(self.command_error(format!("ERR unknown command '{}'", other))),
        }
    }

    fn parse_int(&self, raw: &str) -> StoreResult<i64> {
        raw.parse()
            .map_err(|_| self.command_error("ERR value is not an integer or out of range"))
    }
}

/// Deadline `secs` from now; `None` when it lies past the clock's range
fn expiry(secs: i64) -> Option<Instant> {
    Instant::now().checked_add(Duration::from_secs(secs.max(0) as u64))
}

/// Connector handing out connections to in-memory nodes, one node per address
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    nodes: Arc<Mutex<HashMap<String, Arc<MemoryNode>>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The node behind `address`, created on first use
    pub fn node(&self, address: &str) -> Arc<MemoryNode> {
        let mut nodes = self.nodes.lock().unwrap_or_else(PoisonError::into_inner);
        nodes
            .entry(address.to_string())
            .or_insert_with(|| Arc::new(MemoryNode::new(address)))
            .clone()
    }
}

#[async_trait]
impl ShardConnector for MemoryConnector {
    async fn connect(
        &self,
        address: &str,
        _options: &PoolOptions,
    ) -> StoreResult<Box<dyn ShardConnection>> {
        let node = self.node(address);
        if node.refuse_connections.load(Ordering::SeqCst) {
            return Err(StoreError::Connect {
                address: address.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        node.connections.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection { node }))
    }
}

struct MemoryConnection {
    node: Arc<MemoryNode>,
}

#[async_trait]
impl ShardConnection for MemoryConnection {
    async fn execute(&mut self, command: &Command) -> StoreResult<Reply> {
        self.node.execute(command).await
    }

    async fn close(self: Box<Self>) -> StoreResult<()> {
        let reason = self
            .node
            .close_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match reason {
            Some(reason) => Err(StoreError::Command {
                address: self.node.address.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }
}
