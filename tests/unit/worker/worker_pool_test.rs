use crate::unit::common::*;
use shardline::shardline::observability::PipelineMetrics;
use shardline::shardline::queue::{work_queue, WorkQueueReceiver, WorkQueueSender};
use shardline::shardline::worker::{TransmitClassifier, WorkerPool};

struct Fixture {
    pool: WorkerPool,
    tx: WorkQueueSender,
    rx: WorkQueueReceiver,
    store: Arc<ShardedRecordStore>,
    connector: MemoryConnector,
    metrics: Arc<PipelineMetrics>,
}

fn fixture(workers: usize) -> Fixture {
    let (tx, rx) = work_queue(32);
    let (store, connector) = memory_store(1);
    let store = Arc::new(store);
    let metrics = Arc::new(PipelineMetrics::new());
    let mut pool = WorkerPool::new(WorkerConfig::default().with_routines(workers));
    pool.init(
        rx.clone(),
        Arc::new(TransmitClassifier::new(ClassifierConfig::default())),
        store.clone(),
        metrics.clone(),
    );
    Fixture {
        pool,
        tx,
        rx,
        store,
        connector,
        metrics,
    }
}

#[tokio::test]
async fn test_accepted_records_are_stored_and_ignored_are_not() {
    let Fixture {
        mut pool,
        tx,
        store,
        metrics,
        ..
    } = fixture(3);
    pool.start().unwrap();

    tx.send(InboundMessage::new(transmit_payload("100"), 1))
        .await
        .unwrap();
    let mut ignored = transmit_event("200");
    ignored["follow"] = json!(10);
    tx.send(InboundMessage::new(ignored.to_string(), 1))
        .await
        .unwrap();
    tx.send(InboundMessage::new("garbage", 1)).await.unwrap();
    drop(tx);

    let outcome = pool.drain(Some(Duration::from_secs(5))).await;
    assert_eq!(outcome.drained, 3);
    assert!(!outcome.forced);

    assert!(store.get("100_transmit_new").await.unwrap().is_some());
    assert!(store.get("200_transmit_new").await.unwrap().is_none());

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.accepted, 1);
    assert_eq!(snapshot.ignored, 1);
    assert_eq!(snapshot.invalid, 1);
    assert_eq!(snapshot.store_success, 1);
}

#[tokio::test]
async fn test_store_failure_does_not_stop_worker() {
    let Fixture {
        mut pool,
        tx,
        store,
        connector,
        metrics,
        ..
    } = fixture(1);
    pool.start().unwrap();

    // max_retry is 1, so two failures exhaust the first write
    connector.node("node-0").fail_next(2);
    tx.send(InboundMessage::new(transmit_payload("1"), 1))
        .await
        .unwrap();
    tx.send(InboundMessage::new(transmit_payload("2"), 1))
        .await
        .unwrap();
    drop(tx);

    let outcome = pool.drain(None).await;
    assert_eq!(outcome.drained, 1);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.store_fail, 1);
    assert_eq!(snapshot.store_success, 1);
    assert!(store.get("1_transmit_new").await.unwrap().is_none());
    assert!(store.get("2_transmit_new").await.unwrap().is_some());
}

#[tokio::test]
async fn test_stop_signal_leaves_buffered_messages() {
    let Fixture {
        mut pool,
        tx,
        rx,
        metrics,
        ..
    } = fixture(2);
    pool.start().unwrap();
    pool.stop();
    assert!(wait_until(Duration::from_secs(1), || pool.active_workers() == 0).await);

    for i in 0..5 {
        tx.send(InboundMessage::new(transmit_payload(&i.to_string()), 1))
            .await
            .unwrap();
    }

    let outcome = pool.drain(Some(Duration::from_secs(1))).await;
    assert_eq!(outcome.stopped, 2);
    assert_eq!(outcome.drained, 0);
    assert_eq!(rx.len(), 5);
    assert_eq!(metrics.snapshot().accepted, 0);
}

#[tokio::test]
async fn test_drain_deadline_forces_stop() {
    let Fixture {
        mut pool,
        tx,
        connector,
        ..
    } = fixture(1);
    connector
        .node("node-0")
        .set_latency(Duration::from_millis(100));
    pool.start().unwrap();

    for i in 0..20 {
        tx.send(InboundMessage::new(transmit_payload(&i.to_string()), 1))
            .await
            .unwrap();
    }
    drop(tx);

    let outcome = pool.drain(Some(Duration::from_millis(150))).await;
    assert!(outcome.forced);
    assert_eq!(outcome.stopped, 1);
    assert_eq!(pool.active_workers(), 0);
}

#[tokio::test]
async fn test_start_requires_init_and_runs_once() {
    let mut empty = WorkerPool::new(WorkerConfig::default().with_routines(2));
    assert!(matches!(empty.start(), Err(PipelineError::Lifecycle(_))));

    let Fixture { mut pool, .. } = fixture(2);
    assert_eq!(pool.worker_count(), 2);
    pool.start().unwrap();
    assert!(matches!(pool.start(), Err(PipelineError::Lifecycle(_))));
    pool.stop();
    let outcome = pool.drain(None).await;
    assert_eq!(outcome.stopped + outcome.drained, 2);
}
