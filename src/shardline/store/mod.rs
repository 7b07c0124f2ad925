//! Sharded key-value store
//!
//! A [`StoreRouter`] owns one [`ShardPool`] per node and routes each key with
//! a [`HashStrategy`]. Workers write through the [`RecordStore`] seam.

pub mod connection;
pub mod hash;
pub mod memory;
pub mod pool;
pub mod record_store;
pub mod redis_backend;
pub mod router;

pub use connection::{Command, PoolOptions, Reply, ShardConnection, ShardConnector};
pub use hash::HashStrategy;
pub use memory::{MemoryConnector, MemoryNode};
pub use pool::{PooledConnection, ShardPool};
pub use record_store::{RecordStore, ShardedRecordStore, DEFAULT_RECORD_TTL};
pub use redis_backend::RedisConnector;
pub use router::StoreRouter;
