//! Pipeline lifecycle controller
//!
//! Wires the consumer manager's queue into the worker pool and enforces the
//! ordering rules:
//!
//! - init: store, then workers, then consumers
//! - start: workers before consumers, so early records find a reader
//! - stop: consumers stop and the queue closes, workers drain (bounded by
//!   the drain deadline), then the store closes

use super::shutdown::{ShutdownReport, ShutdownSignal};
use crate::shardline::config::{PipelineConfig, StoreConfig};
use crate::shardline::error::{PipelineError, PipelineResult};
use crate::shardline::kafka::{ConsumerManager, KafkaSourceFactory, SourceFactory};
use crate::shardline::observability::{PipelineMetrics, PipelineObserver};
use crate::shardline::store::{
    RecordStore, RedisConnector, ShardConnector, ShardedRecordStore, StoreRouter,
};
use crate::shardline::worker::{Classifier, TransmitClassifier, WorkerPool};
use log::{error, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Initialized,
    Running,
    Stopped,
}

/// Build the sharded store from configuration, optionally pinging every shard
pub async fn connect_store(
    config: &StoreConfig,
    ttl: Duration,
    connector: Arc<dyn ShardConnector>,
) -> PipelineResult<ShardedRecordStore> {
    let router = StoreRouter::from_config(config, connector)?;
    if config.verify_on_start {
        router.check_connectivity().await?;
    }
    Ok(ShardedRecordStore::new(router, ttl))
}

pub struct PipelineController {
    config: PipelineConfig,
    metrics: Arc<PipelineMetrics>,
    consumers: ConsumerManager,
    workers: WorkerPool,
    store: Option<Arc<dyn RecordStore>>,
    state: LifecycleState,
    reloads: AtomicU64,
}

impl PipelineController {
    pub fn new(config: PipelineConfig) -> Self {
        let metrics = Arc::new(PipelineMetrics::new());
        let observer: Arc<dyn PipelineObserver> = metrics.clone();
        let consumers = ConsumerManager::new(config.kafka_consumer.clone(), observer);
        let workers = WorkerPool::new(config.worker.clone());
        Self {
            config,
            metrics,
            consumers,
            workers,
            store: None,
            state: LifecycleState::Created,
            reloads: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        self.metrics.clone()
    }

    /// Messages buffered in the shared queue
    pub fn queue_len(&self) -> usize {
        self.consumers.receiver().len()
    }

    pub fn reload_count(&self) -> u64 {
        self.reloads.load(Ordering::Relaxed)
    }

    /// Connect to Redis and Kafka with the configured settings
    pub async fn init(&mut self) -> PipelineResult<()> {
        let store = connect_store(
            &self.config.store,
            self.config.worker.ttl(),
            Arc::new(RedisConnector),
        )
        .await?;
        let classifier = TransmitClassifier::new(self.config.classifier.clone());
        let sources = KafkaSourceFactory::new(self.config.kafka_consumer.clone());
        self.init_with(&sources, Arc::new(store), Arc::new(classifier))
    }

    /// Init with explicit collaborators. Workers are built before consumers.
    pub fn init_with(
        &mut self,
        sources: &dyn SourceFactory,
        store: Arc<dyn RecordStore>,
        classifier: Arc<dyn Classifier>,
    ) -> PipelineResult<()> {
        if self.state != LifecycleState::Created {
            return Err(PipelineError::lifecycle(format!(
                "init called in state {:?}",
                self.state
            )));
        }
        let observer: Arc<dyn PipelineObserver> = self.metrics.clone();
        self.workers
            .init(self.consumers.receiver(), classifier, store.clone(), observer);
        self.store = Some(store);
        self.consumers.init(sources)?;
        self.state = LifecycleState::Initialized;
        info!("{}", self.config.summary());
        Ok(())
    }

    /// Start workers, then consumers
    pub fn start(&mut self) -> PipelineResult<()> {
        if self.state != LifecycleState::Initialized {
            return Err(PipelineError::lifecycle(format!(
                "start called in state {:?}",
                self.state
            )));
        }
        self.workers.start()?;
        self.consumers.start()?;
        self.state = LifecycleState::Running;
        info!(
            "Pipeline '{}' running: {} consumer(s), {} worker(s)",
            self.config.title,
            self.consumers.consumer_count(),
            self.workers.worker_count()
        );
        Ok(())
    }

    /// Reload has no behavior yet; safe to call any number of times
    pub fn reload(&self) {
        let n = self.reloads.fetch_add(1, Ordering::Relaxed) + 1;
        info!("Reload requested (#{}), nothing to reload", n);
    }

    /// Stop consumers and close the queue, drain workers, close the store.
    /// Store close errors are reported, not returned.
    pub async fn stop(&mut self, signal: Option<ShutdownSignal>) -> PipelineResult<ShutdownReport> {
        if self.state == LifecycleState::Stopped {
            return Err(PipelineError::lifecycle("stop called twice"));
        }
        let started = Instant::now();
        info!("Pipeline '{}' stopping", self.config.title);

        let consumers_stopped = self.consumers.consumer_count();
        self.consumers.stop().await;

        let workers = self
            .workers
            .drain(self.config.shutdown.drain_timeout())
            .await;
        if workers.forced {
            warn!(
                "Workers force-stopped with {} message(s) left in the queue",
                self.queue_len()
            );
        }

        let store_close_error = match self.store.take() {
            Some(store) => store.close().await.err(),
            None => None,
        };
        if let Some(e) = &store_close_error {
            error!("{}", e);
        }

        self.state = LifecycleState::Stopped;
        info!("{}", self.metrics.snapshot().format_summary());

        let report = ShutdownReport {
            signal,
            consumers_stopped,
            workers,
            store_close_error,
            elapsed: started.elapsed(),
        };
        info!("{}", report);
        Ok(report)
    }

    /// Serve until a stop signal arrives. SIGHUP triggers a reload and the
    /// loop continues.
    pub async fn serve(
        &mut self,
        mut signals: broadcast::Receiver<ShutdownSignal>,
    ) -> PipelineResult<ShutdownReport> {
        loop {
            match signals.recv().await {
                Ok(ShutdownSignal::Hangup) => self.reload(),
                Ok(signal) => return self.stop(Some(signal)).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Missed {} lifecycle signal(s)", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    warn!("Signal channel closed, stopping");
                    return self.stop(None).await;
                }
            }
        }
    }
}
