// Common helpers for pipeline tests

pub use serde_json::json;
pub use shardline::shardline::config::{
    ClassifierConfig, KafkaConsumerConfig, PipelineConfig, ShutdownConfig, StoreConfig,
    WorkerConfig,
};
pub use shardline::shardline::error::{ConfigError, PipelineError, StoreError};
pub use shardline::shardline::kafka::{ChannelSourceFactory, InboundMessage};
pub use shardline::shardline::store::{
    Command, HashStrategy, MemoryConnector, PoolOptions, RecordStore, ShardedRecordStore,
    StoreRouter,
};
pub use std::sync::Arc;
pub use std::time::Duration;

/// Generous timeouts so the in-memory backend never trips them by accident
pub fn test_pool_options() -> PoolOptions {
    PoolOptions {
        connect_timeout: Duration::from_millis(500),
        read_timeout: Duration::from_millis(500),
        write_timeout: Duration::from_millis(500),
        ..PoolOptions::default()
    }
}

pub fn node_addresses(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("node-{}", i)).collect()
}

/// Router over `nodes` in-memory shards named `node-0..`
pub fn memory_router(
    nodes: usize,
    strategy: HashStrategy,
    max_retry: u32,
) -> (StoreRouter, MemoryConnector) {
    let connector = MemoryConnector::new();
    let router = StoreRouter::new(
        "test-cluster",
        &node_addresses(nodes),
        strategy,
        test_pool_options(),
        max_retry,
        Arc::new(connector.clone()),
    )
    .expect("router config is valid");
    (router, connector)
}

pub fn memory_store(nodes: usize) -> (ShardedRecordStore, MemoryConnector) {
    let (router, connector) = memory_router(nodes, HashStrategy::Fnv32, 1);
    (
        ShardedRecordStore::new(router, Duration::from_secs(432_000)),
        connector,
    )
}

/// A transmit event that passes every default classifier rule
pub fn transmit_event(src_mid: &str) -> serde_json::Value {
    json!({
        "uid": "1001",
        "mid": "2002",
        "follow": 500,
        "src_uid": "3003",
        "src_mid": src_mid,
        "state": 0,
        "event": 2
    })
}

pub fn transmit_payload(src_mid: &str) -> Vec<u8> {
    transmit_event(src_mid).to_string().into_bytes()
}

/// Pipeline config over in-memory shards `node-0..node-{nodes-1}`
pub fn test_pipeline_config(consumers: usize, workers: usize, nodes: usize) -> PipelineConfig {
    let kafka = KafkaConsumerConfig::new("localhost:9092", "transmit", "test-group")
        .with_routines(consumers)
        .with_channel_buffer_size(64);
    let addresses = node_addresses(nodes);
    let refs: Vec<&str> = addresses.iter().map(String::as_str).collect();
    let store = StoreConfig::new("test-cluster", &refs)
        .with_max_retry(1)
        .with_network_timeout(Duration::from_millis(500));
    PipelineConfig::new(kafka, store).with_worker(WorkerConfig::default().with_routines(workers))
}

/// Poll `check` until it holds or `timeout` passes
pub async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
