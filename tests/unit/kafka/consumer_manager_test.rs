use crate::unit::common::*;
use shardline::shardline::kafka::ConsumerManager;
use shardline::shardline::observability::PipelineMetrics;

fn manager(routines: usize, capacity: usize) -> (ConsumerManager, Arc<PipelineMetrics>) {
    let config = KafkaConsumerConfig::new("localhost:9092", "transmit", "test-group")
        .with_routines(routines)
        .with_channel_buffer_size(capacity)
        .with_message_type(7);
    let metrics = Arc::new(PipelineMetrics::new());
    (ConsumerManager::new(config, metrics.clone()), metrics)
}

#[tokio::test]
async fn test_full_queue_applies_backpressure() {
    let sources = ChannelSourceFactory::new("transmit");
    let (mut manager, metrics) = manager(1, 2);
    manager.init(&sources).unwrap();
    let rx = manager.receiver();
    let handle = sources.handle(0).unwrap();

    for i in 0..5 {
        handle.push(format!("m{}", i));
    }
    manager.start().unwrap();

    // two records fill the queue, the third is acknowledged and waits
    assert!(wait_until(Duration::from_secs(2), || handle.acknowledged().len() == 3).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handle.acknowledged(), vec![0, 1, 2]);
    assert_eq!(rx.len(), 2);
    assert_eq!(metrics.snapshot().consumed, 2);

    let first = rx.recv().await.unwrap();
    assert_eq!(first.payload, b"m0".to_vec());
    assert_eq!(first.type_tag, 7);
    assert!(wait_until(Duration::from_secs(2), || handle.acknowledged().len() == 4).await);
    assert_eq!(rx.len(), 2);

    let mut received = Vec::new();
    while received.len() < 4 {
        received.push(rx.recv().await.unwrap().payload);
    }
    assert_eq!(
        received,
        vec![b"m1".to_vec(), b"m2".to_vec(), b"m3".to_vec(), b"m4".to_vec()]
    );

    manager.stop().await;
    assert_eq!(rx.recv().await, None);
}

#[tokio::test]
async fn test_queue_closes_only_after_every_consumer_stops() {
    let sources = ChannelSourceFactory::new("transmit");
    let (mut manager, _) = manager(3, 4);
    manager.init(&sources).unwrap();
    let rx = manager.receiver();
    manager.start().unwrap();

    for id in 0..3 {
        let handle = sources.handle(id).unwrap();
        for i in 0..4 {
            handle.push(format!("{}-{}", id, i));
        }
    }

    let reader = tokio::spawn(async move {
        let mut count = 0;
        while rx.recv().await.is_some() {
            count += 1;
        }
        count
    });

    assert!(wait_until(Duration::from_secs(2), || {
        (0..3).all(|id| sources.handle(id).unwrap().acknowledged().len() == 4)
    })
    .await);

    assert!(!manager.is_queue_closed());
    manager.stop().await;
    assert!(manager.is_queue_closed());
    assert_eq!(manager.active_consumers(), 0);

    // every record handed off before the close is still delivered
    assert_eq!(reader.await.unwrap(), 12);
}

#[tokio::test]
async fn test_source_errors_do_not_stop_consumer() {
    let sources = ChannelSourceFactory::new("transmit");
    let (mut manager, metrics) = manager(1, 8);
    manager.init(&sources).unwrap();
    let rx = manager.receiver();
    manager.start().unwrap();

    let handle = sources.handle(0).unwrap();
    handle.push_error("broker transport failure");
    handle.push_rebalance("assigned transmit[0]");
    handle.push("after-error");

    let message = rx.recv().await.unwrap();
    assert_eq!(message.payload, b"after-error".to_vec());
    assert_eq!(metrics.snapshot().consume_errors, 1);
    assert_eq!(manager.active_consumers(), 1);

    manager.stop().await;
}

#[tokio::test]
async fn test_closed_sources_end_consumers() {
    let sources = ChannelSourceFactory::new("transmit");
    let (mut manager, _) = manager(2, 8);
    manager.init(&sources).unwrap();
    manager.start().unwrap();

    sources.close_all();
    assert!(wait_until(Duration::from_secs(2), || manager.active_consumers() == 0).await);
    manager.stop().await;
    assert!(manager.is_queue_closed());
}
