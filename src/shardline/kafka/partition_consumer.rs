//! Partition consumer
//!
//! Reads one consumer-group member's stream and forwards each record into the
//! shared work queue. The read position is advanced before the record is
//! handed off, so a crash between the two drops that record (at-most-once).

use super::message::InboundMessage;
use super::source::{RecordSource, SourceEvent, SourceRecord};
use crate::shardline::observability::PipelineObserver;
use crate::shardline::queue::WorkQueueSender;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::watch;

/// Why a partition consumer loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerExit {
    /// The private stop signal fired
    Stopped,
    /// The source reported its message stream closed
    SourceClosed,
    /// Every queue receiver is gone
    QueueDisconnected,
}

pub struct PartitionConsumer {
    id: usize,
    source: Box<dyn RecordSource>,
    type_tag: i32,
    queue: WorkQueueSender,
    stop: watch::Receiver<bool>,
    observer: Arc<dyn PipelineObserver>,
}

impl PartitionConsumer {
    pub fn new(
        id: usize,
        source: Box<dyn RecordSource>,
        type_tag: i32,
        queue: WorkQueueSender,
        stop: watch::Receiver<bool>,
        observer: Arc<dyn PipelineObserver>,
    ) -> Self {
        Self {
            id,
            source,
            type_tag,
            queue,
            stop,
            observer,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Receive loop. Returns when stopped or when the source closes; the
    /// queue sender is dropped on return.
    pub async fn run(mut self) -> ConsumerExit {
        let label = self.source.describe();
        info!("{} PartitionConsumer:{} started", label, self.id);

        let exit = loop {
            if *self.stop.borrow() {
                break ConsumerExit::Stopped;
            }
            tokio::select! {
                biased;
                _ = self.stop.changed() => break ConsumerExit::Stopped,
                event = self.source.next_event() => match event {
                    None => {
                        warn!("{} PartitionConsumer:{} message stream closed", label, self.id);
                        break ConsumerExit::SourceClosed;
                    }
                    Some(SourceEvent::Record(record)) => {
                        if !self.forward(record).await {
                            break ConsumerExit::QueueDisconnected;
                        }
                    }
                    Some(SourceEvent::Error(e)) => {
                        self.observer.on_consume_error();
                        error!("{} PartitionConsumer:{} source error: {}", label, self.id, e);
                    }
                    Some(SourceEvent::Rebalance(description)) => {
                        info!("{} PartitionConsumer:{} rebalance: {}", label, self.id, description);
                    }
                },
            }
        };

        self.source.close();
        info!("{} PartitionConsumer:{} stopped ({:?})", label, self.id, exit);
        exit
    }

    /// Acknowledge, then hand off. The send waits while the queue is full.
    async fn forward(&mut self, record: SourceRecord) -> bool {
        if let Err(e) = self.source.acknowledge(&record) {
            error!("PartitionConsumer:{} {}", self.id, e);
        }
        debug!(
            "PartitionConsumer:{} forwarding {}/{}@{}",
            self.id, record.topic, record.partition, record.offset
        );
        let message = InboundMessage::new(record.payload, self.type_tag);
        match self.queue.send(message).await {
            Ok(()) => {
                self.observer.on_consumed();
                true
            }
            Err(e) => {
                error!("PartitionConsumer:{} {}", self.id, e);
                false
            }
        }
    }
}
