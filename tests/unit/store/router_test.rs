use crate::unit::common::*;
use shardline::shardline::store::Reply;

#[test]
fn test_shard_index_is_deterministic_for_fixed_shard_count() {
    for strategy in [
        HashStrategy::Fnv32,
        HashStrategy::Fnv32a,
        HashStrategy::NumericSuffix,
    ] {
        for nodes in [1, 2, 3, 7, 16] {
            let (router, _) = memory_router(nodes, strategy, 0);
            for i in 0..200 {
                let key = format!("{}_transmit_new", i * 7919);
                let first = router.shard_for(&key);
                assert!(first < nodes);
                for _ in 0..5 {
                    assert_eq!(router.shard_for(&key), first, "{} {}", strategy, key);
                }
            }
        }
    }
}

#[test]
fn test_random_strategy_stays_in_range() {
    let (router, _) = memory_router(4, HashStrategy::Random, 0);
    for _ in 0..500 {
        assert!(router.shard_for("any") < 4);
    }
}

#[tokio::test]
async fn test_write_then_read_round_trip() {
    let (router, _) = memory_router(3, HashStrategy::Fnv32, 0);
    for i in 0..50 {
        let key = format!("user:{}", i);
        let value = format!("value-{}", i);
        router
            .execute(&key, Command::new("SET").arg(&value))
            .await
            .unwrap();
        let reply = router.execute(&key, Command::new("GET")).await.unwrap();
        assert_eq!(reply.as_string(), Some(value));
    }
}

#[tokio::test]
async fn test_set_lands_only_on_hashed_shard() {
    // fnv32("foobar") % 3 == 1
    let (router, connector) = memory_router(3, HashStrategy::Fnv32, 0);
    assert_eq!(router.shard_for("foobar"), 1);

    router
        .execute("foobar", Command::new("SET").arg("v"))
        .await
        .unwrap();

    assert_eq!(connector.node("node-1").value("foobar").as_deref(), Some("v"));
    assert_eq!(connector.node("node-0").command_count(), 0);
    assert_eq!(connector.node("node-2").command_count(), 0);
    assert_eq!(connector.node("node-0").value("foobar"), None);
    assert_eq!(connector.node("node-2").value("foobar"), None);
}

#[tokio::test]
async fn test_first_success_uses_one_attempt() {
    let (router, connector) = memory_router(1, HashStrategy::Fnv32, 3);
    router
        .execute("k", Command::new("SET").arg("v"))
        .await
        .unwrap();
    assert_eq!(connector.node("node-0").command_count(), 1);
}

#[tokio::test]
async fn test_persistent_failure_uses_retry_budget() {
    let (router, connector) = memory_router(1, HashStrategy::Fnv32, 2);
    connector.node("node-0").fail_next(100);

    let err = router
        .execute("k", Command::new("SET").arg("v"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Command { .. }));
    assert_eq!(connector.node("node-0").command_count(), 3);
}

#[tokio::test]
async fn test_zero_retry_budget_is_single_attempt() {
    let (router, connector) = memory_router(1, HashStrategy::Fnv32, 0);
    connector.node("node-0").fail_next(100);
    assert!(router.execute("k", Command::new("GET")).await.is_err());
    assert_eq!(connector.node("node-0").command_count(), 1);
}

#[tokio::test]
async fn test_transient_failure_recovers_within_budget() {
    let (router, connector) = memory_router(1, HashStrategy::Fnv32, 2);
    connector.node("node-0").fail_next(2);

    router
        .execute("k", Command::new("SET").arg("v"))
        .await
        .unwrap();
    assert_eq!(connector.node("node-0").command_count(), 3);
    assert_eq!(connector.node("node-0").value("k").as_deref(), Some("v"));
}

#[tokio::test]
async fn test_nil_reply_is_not_retried() {
    let (router, connector) = memory_router(1, HashStrategy::Fnv32, 5);
    let reply = router.execute("absent", Command::new("GET")).await.unwrap();
    assert_eq!(reply, Reply::Nil);
    assert_eq!(connector.node("node-0").command_count(), 1);
}

#[tokio::test]
async fn test_execute_on_shard_bypasses_hashing() {
    let (router, connector) = memory_router(3, HashStrategy::Fnv32, 0);
    router
        .execute_on_shard(2, Command::new("HINCRBY").arg("stats").arg("seen").arg(4))
        .await
        .unwrap();
    let reply = router
        .execute_on_shard(2, Command::new("HGET").arg("stats").arg("seen"))
        .await
        .unwrap();
    assert_eq!(reply.as_int(), Some(4));
    assert_eq!(connector.node("node-0").command_count(), 0);
    assert_eq!(connector.node("node-1").command_count(), 0);
}

#[tokio::test]
async fn test_unreachable_shard_fails_connectivity_check() {
    let (router, connector) = memory_router(2, HashStrategy::Fnv32, 1);
    connector.node("node-1").refuse_connections(true);
    let err = router.check_connectivity().await.unwrap_err();
    assert!(matches!(err, StoreError::Connect { address, .. } if address == "node-1"));
}

#[tokio::test]
async fn test_close_reports_every_failing_pool() {
    let (router, connector) = memory_router(3, HashStrategy::Fnv32, 0);
    for shard in 0..3 {
        router
            .execute_on_shard(shard, Command::new("PING"))
            .await
            .unwrap();
    }
    connector.node("node-1").fail_close("connection reset");
    connector.node("node-2").fail_close("broken pipe");

    let err = router.close().await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("server: 1"));
    assert!(message.contains("server: 2"));
    assert!(message.contains("cluster: test-cluster"));
    assert!(message.contains('|'));

    // pools stay closed afterwards
    let err = router.execute("k", Command::new("GET")).await.unwrap_err();
    assert!(matches!(err, StoreError::PoolClosed { .. }));
}

#[test]
fn test_router_rejects_empty_address() {
    let result = StoreRouter::new(
        "c",
        &["node-0".to_string(), " ".to_string()],
        HashStrategy::Fnv32,
        PoolOptions::default(),
        0,
        Arc::new(MemoryConnector::new()),
    );
    assert!(matches!(result, Err(ConfigError::Invalid { .. })));
}
