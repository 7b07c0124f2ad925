use crate::unit::common::*;
use shardline::shardline::server::{
    connect_store, LifecycleState, PipelineController, ShutdownCoordinator, ShutdownSignal,
};
use shardline::shardline::worker::TransmitClassifier;

struct Harness {
    controller: PipelineController,
    sources: ChannelSourceFactory,
    store: Arc<ShardedRecordStore>,
    connector: MemoryConnector,
}

async fn harness(config: PipelineConfig) -> Harness {
    let connector = MemoryConnector::new();
    let store = connect_store(
        &config.store,
        config.worker.ttl(),
        Arc::new(connector.clone()),
    )
    .await
    .expect("memory store connects");
    let store = Arc::new(store);
    let classifier = Arc::new(TransmitClassifier::new(config.classifier.clone()));
    let sources = ChannelSourceFactory::new("transmit");

    let mut controller = PipelineController::new(config);
    controller
        .init_with(&sources, store.clone(), classifier)
        .expect("init succeeds");
    Harness {
        controller,
        sources,
        store,
        connector,
    }
}

fn acknowledged(sources: &ChannelSourceFactory, consumers: usize) -> usize {
    (0..consumers)
        .filter_map(|id| sources.handle(id))
        .map(|h| h.acknowledged().len())
        .sum()
}

#[tokio::test]
async fn test_records_flow_from_source_to_shards() {
    let Harness {
        mut controller,
        sources,
        store,
        connector,
    } = harness(test_pipeline_config(2, 3, 3)).await;
    controller.start().unwrap();
    assert_eq!(controller.state(), LifecycleState::Running);

    for i in 0..10 {
        let handle = sources.handle(i % 2).unwrap();
        handle.push(transmit_payload(&format!("9{}", i)));
    }
    let mut low_followers = transmit_event("5");
    low_followers["follow"] = json!(3);
    sources.handle(0).unwrap().push(low_followers.to_string());

    let metrics = controller.metrics();
    assert!(
        wait_until(Duration::from_secs(5), || {
            let s = metrics.snapshot();
            s.store_success == 10 && s.ignored == 1
        })
        .await
    );

    for i in 0..10 {
        let key = format!("9{}_transmit_new", i);
        let shard = store.router().shard_for(&key);
        let holders: Vec<usize> = (0..3)
            .filter(|n| connector.node(&format!("node-{}", n)).value(&key).is_some())
            .collect();
        assert_eq!(holders, vec![shard], "key {}", key);
    }

    let report = controller.stop(Some(ShutdownSignal::Terminate)).await.unwrap();
    assert_eq!(report.signal, Some(ShutdownSignal::Terminate));
    assert_eq!(report.consumers_stopped, 2);
    assert_eq!(report.workers.drained, 3);
    assert!(report.all_graceful());
    assert_eq!(controller.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn test_stop_drains_forwarded_records_then_closes_store() {
    let Harness {
        mut controller,
        sources,
        store,
        connector,
    } = harness(test_pipeline_config(2, 2, 2)).await;
    for n in 0..2 {
        connector
            .node(&format!("node-{}", n))
            .set_latency(Duration::from_millis(2));
    }
    controller.start().unwrap();

    for i in 0..40 {
        sources
            .handle(i % 2)
            .unwrap()
            .push(transmit_payload(&i.to_string()));
    }
    assert!(wait_until(Duration::from_secs(2), || acknowledged(&sources, 2) >= 10).await);

    let report = controller.stop(Some(ShutdownSignal::Interrupt)).await.unwrap();
    assert!(report.all_graceful());
    assert_eq!(report.workers.drained, 2);
    assert_eq!(controller.queue_len(), 0);

    // everything handed to the queue was written before the store closed
    let forwarded = acknowledged(&sources, 2) as u64;
    assert_eq!(controller.metrics().snapshot().store_success, forwarded);

    let err = store.get("0_transmit_new").await.unwrap_err();
    assert!(matches!(err, StoreError::PoolClosed { .. }));
}

#[tokio::test]
async fn test_drain_deadline_reports_forced_stop() {
    let config = test_pipeline_config(1, 1, 1).with_shutdown(ShutdownConfig {
        drain_timeout_ms: Some(100),
    });
    let Harness {
        mut controller,
        sources,
        connector,
        ..
    } = harness(config).await;
    connector
        .node("node-0")
        .set_latency(Duration::from_millis(50));
    controller.start().unwrap();

    let handle = sources.handle(0).unwrap();
    for i in 0..20 {
        handle.push(transmit_payload(&i.to_string()));
    }
    assert!(wait_until(Duration::from_secs(2), || handle.acknowledged().len() == 20).await);

    let report = controller.stop(Some(ShutdownSignal::Terminate)).await.unwrap();
    assert!(report.workers.forced);
    assert_eq!(report.workers.stopped, 1);
    assert!(!report.all_graceful());
    assert!(controller.queue_len() > 0);
    assert!(controller.metrics().snapshot().store_success < 20);
}

#[tokio::test]
async fn test_store_close_failure_is_reported_not_returned() {
    let Harness {
        mut controller,
        sources,
        connector,
        ..
    } = harness(test_pipeline_config(1, 1, 2)).await;
    controller.start().unwrap();
    sources.handle(0).unwrap().push(transmit_payload("1"));
    let metrics = controller.metrics();
    assert!(wait_until(Duration::from_secs(2), || metrics.snapshot().store_success == 1).await);

    connector.node("node-0").fail_close("reset by peer");
    connector.node("node-1").fail_close("reset by peer");
    let report = controller.stop(None).await.unwrap();
    let Some(StoreError::Close(failures)) = &report.store_close_error else {
        panic!("expected store close failure");
    };
    assert!(!failures.is_empty());
    assert_eq!(report.workers.drained, 1);
    assert!(!report.all_graceful());
}

#[tokio::test]
async fn test_lifecycle_misuse_is_rejected() {
    let mut fresh = PipelineController::new(test_pipeline_config(1, 1, 1));
    assert!(matches!(fresh.start(), Err(PipelineError::Lifecycle(_))));

    let Harness {
        mut controller,
        sources,
        store,
        ..
    } = harness(test_pipeline_config(1, 1, 1)).await;
    let classifier = Arc::new(TransmitClassifier::new(ClassifierConfig::default()));
    assert!(matches!(
        controller.init_with(&sources, store.clone(), classifier),
        Err(PipelineError::Lifecycle(_))
    ));

    controller.start().unwrap();
    assert!(matches!(controller.start(), Err(PipelineError::Lifecycle(_))));

    controller.stop(None).await.unwrap();
    assert!(matches!(
        controller.stop(None).await,
        Err(PipelineError::Lifecycle(_))
    ));
}

#[tokio::test]
async fn test_unreachable_shard_fails_startup() {
    let config = test_pipeline_config(1, 1, 2);
    let connector = MemoryConnector::new();
    connector.node("node-1").refuse_connections(true);
    let result = connect_store(&config.store, config.worker.ttl(), Arc::new(connector)).await;
    assert!(matches!(
        result,
        Err(PipelineError::Store(StoreError::Connect { .. }))
    ));
}

#[tokio::test]
async fn test_serve_reloads_on_hangup_and_stops_on_terminate() {
    let Harness { mut controller, .. } = harness(test_pipeline_config(1, 2, 1)).await;
    controller.start().unwrap();

    let coordinator = ShutdownCoordinator::new();
    let signals = coordinator.subscribe();
    let trigger = coordinator.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.trigger(ShutdownSignal::Hangup);
        trigger.trigger(ShutdownSignal::Hangup);
        trigger.trigger(ShutdownSignal::Terminate);
    });

    let report = tokio::time::timeout(Duration::from_secs(5), controller.serve(signals))
        .await
        .expect("serve returns after terminate")
        .unwrap();
    assert_eq!(report.signal, Some(ShutdownSignal::Terminate));
    assert_eq!(controller.reload_count(), 2);
    assert_eq!(controller.state(), LifecycleState::Stopped);
    assert!(report.all_graceful());
}

#[tokio::test]
async fn test_reload_is_idempotent() {
    let Harness {
        mut controller,
        sources,
        store,
        ..
    } = harness(test_pipeline_config(1, 1, 1)).await;
    controller.start().unwrap();
    for _ in 0..3 {
        controller.reload();
    }
    assert_eq!(controller.reload_count(), 3);
    assert_eq!(controller.state(), LifecycleState::Running);

    sources.handle(0).unwrap().push(transmit_payload("77"));
    let metrics = controller.metrics();
    assert!(wait_until(Duration::from_secs(2), || metrics.snapshot().store_success == 1).await);
    assert!(store.get("77_transmit_new").await.unwrap().is_some());
    controller.stop(None).await.unwrap();
}
