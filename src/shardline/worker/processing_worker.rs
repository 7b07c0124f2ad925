//! Processing worker
//!
//! Pulls messages from the shared queue, classifies them and writes accepted
//! records to the store. Exits when the queue is closed and drained, or
//! immediately when its private stop signal fires, even if messages are still
//! buffered.

use super::classifier::{Classification, Classifier};
use crate::shardline::kafka::InboundMessage;
use crate::shardline::observability::PipelineObserver;
use crate::shardline::queue::WorkQueueReceiver;
use crate::shardline::store::RecordStore;
use log::{debug, error, info};
use std::sync::Arc;
use tokio::sync::watch;

/// Why a worker loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The queue was closed and fully drained
    QueueClosed,
    /// The private stop signal fired
    Stopped,
}

pub struct ProcessingWorker {
    id: usize,
    queue: WorkQueueReceiver,
    stop: watch::Receiver<bool>,
    classifier: Arc<dyn Classifier>,
    store: Arc<dyn RecordStore>,
    observer: Arc<dyn PipelineObserver>,
}

impl ProcessingWorker {
    pub fn new(
        id: usize,
        queue: WorkQueueReceiver,
        stop: watch::Receiver<bool>,
        classifier: Arc<dyn Classifier>,
        store: Arc<dyn RecordStore>,
        observer: Arc<dyn PipelineObserver>,
    ) -> Self {
        Self {
            id,
            queue,
            stop,
            classifier,
            store,
            observer,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub async fn run(mut self) -> WorkerExit {
        debug!("Worker:{} started", self.id);
        let exit = loop {
            if *self.stop.borrow() {
                break WorkerExit::Stopped;
            }
            tokio::select! {
                biased;
                _ = self.stop.changed() => break WorkerExit::Stopped,
                message = self.queue.recv() => match message {
                    Some(message) => self.process(message).await,
                    None => break WorkerExit::QueueClosed,
                },
            }
        };
        info!("Worker:{} stopped ({:?})", self.id, exit);
        exit
    }

    /// Classify and store one message. Failures stay with this message.
    async fn process(&self, message: InboundMessage) {
        match self.classifier.classify(&message) {
            Classification::Accept(record) => {
                let key = record.routing_key;
                self.observer.on_accept(&key);
                match self.store.set(&key, &record.value).await {
                    Ok(()) => self.observer.on_store_success(&key),
                    Err(e) => {
                        error!("Worker:{} failed to store key {}: {}", self.id, key, e);
                        self.observer.on_store_fail(&key, &e);
                    }
                }
            }
            Classification::Ignore(reason) => {
                debug!("Worker:{} ignored message: {:?}", self.id, reason);
                self.observer.on_ignore();
            }
            Classification::Invalid(e) => {
                error!("Worker:{} invalid message (type {}): {}", self.id, message.type_tag, e);
                self.observer.on_invalid(&e);
            }
        }
    }
}
