//! Consumer manager
//!
//! Owns a fixed set of partition consumers and the shared work queue. Stop
//! order is fixed: signal every consumer, wait for all of them, then close
//! the queue. Closing earlier would let a consumer send on a closed queue.

use super::partition_consumer::{ConsumerExit, PartitionConsumer};
use super::source::SourceFactory;
use crate::shardline::config::KafkaConsumerConfig;
use crate::shardline::error::{PipelineError, PipelineResult, SourceError};
use crate::shardline::observability::PipelineObserver;
use crate::shardline::queue::{work_queue, WorkQueueReceiver, WorkQueueSender};
use log::{error, info};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

struct ConsumerHandle {
    id: usize,
    stop: watch::Sender<bool>,
    task: JoinHandle<ConsumerExit>,
}

pub struct ConsumerManager {
    config: KafkaConsumerConfig,
    observer: Arc<dyn PipelineObserver>,
    queue_tx: Option<WorkQueueSender>,
    queue_rx: WorkQueueReceiver,
    pending: Vec<(PartitionConsumer, watch::Sender<bool>)>,
    running: Vec<ConsumerHandle>,
    started: bool,
}

impl ConsumerManager {
    /// Creates the shared queue with `channel_buffer_size` capacity
    pub fn new(config: KafkaConsumerConfig, observer: Arc<dyn PipelineObserver>) -> Self {
        let (queue_tx, queue_rx) = work_queue(config.channel_buffer_size);
        Self {
            config,
            observer,
            queue_tx: Some(queue_tx),
            queue_rx,
            pending: Vec::new(),
            running: Vec::new(),
            started: false,
        }
    }

    /// Receiving end of the shared queue, for the worker pool
    pub fn receiver(&self) -> WorkQueueReceiver {
        self.queue_rx.clone()
    }

    pub fn consumer_count(&self) -> usize {
        self.pending.len() + self.running.len()
    }

    /// Consumers whose loop has not finished yet
    pub fn active_consumers(&self) -> usize {
        self.running.iter().filter(|h| !h.task.is_finished()).count()
    }

    pub fn is_queue_closed(&self) -> bool {
        self.queue_tx.is_none()
    }

    /// Build `routines` partition consumers, all in the same consumer group
    pub fn init(&mut self, sources: &dyn SourceFactory) -> Result<(), SourceError> {
        let queue = match &self.queue_tx {
            Some(tx) => tx.clone(),
            None => return Ok(()),
        };
        for id in 0..self.config.routines {
            let source = sources.create(id)?;
            let (stop_tx, stop_rx) = watch::channel(false);
            let consumer = PartitionConsumer::new(
                id,
                source,
                self.config.message_type,
                queue.clone(),
                stop_rx,
                self.observer.clone(),
            );
            self.pending.push((consumer, stop_tx));
        }
        info!(
            "ConsumerManager initialized {} consumer(s) for [{}]",
            self.pending.len(),
            self.config.topics.join(",")
        );
        Ok(())
    }

    /// Spawn one task per consumer
    pub fn start(&mut self) -> PipelineResult<()> {
        if self.started {
            return Err(PipelineError::lifecycle("consumer manager already started"));
        }
        if self.pending.is_empty() {
            return Err(PipelineError::lifecycle("consumer manager has no consumers, call init first"));
        }
        self.started = true;
        for (consumer, stop) in self.pending.drain(..) {
            let id = consumer.id();
            let task = tokio::spawn(consumer.run());
            self.running.push(ConsumerHandle { id, stop, task });
        }
        info!("ConsumerManager started {} consumer(s)", self.running.len());
        Ok(())
    }

    /// Signal every consumer, wait for all of them, then close the queue
    pub async fn stop(&mut self) {
        self.stop_consumers().await;
        self.close_queue();
    }

    /// Signal and wait for every consumer without closing the queue
    pub async fn stop_consumers(&mut self) {
        for handle in &self.running {
            let _ = handle.stop.send(true);
        }
        // consumers never started still hold queue senders
        self.pending.clear();

        for handle in self.running.drain(..) {
            match handle.task.await {
                Ok(exit) => info!("ConsumerManager: consumer {} finished ({:?})", handle.id, exit),
                Err(e) => error!("ConsumerManager: consumer {} task failed: {}", handle.id, e),
            }
        }
    }

    /// Drop the manager's sender. Once no consumer holds one, workers see
    /// the queue closed after draining it.
    fn close_queue(&mut self) {
        if self.queue_tx.take().is_some() {
            info!("ConsumerManager: work queue closed");
        }
    }
}
