//! Shared bounded work queue
//!
//! Multi-producer, multi-consumer FIFO between partition consumers and
//! processing workers. A full queue blocks senders; nothing is dropped.
//! The queue closes when the last [`WorkQueueSender`] is dropped, after
//! which receivers drain what is buffered and then see `None`.

use crate::shardline::kafka::InboundMessage;

pub fn work_queue(capacity: usize) -> (WorkQueueSender, WorkQueueReceiver) {
    let (tx, rx) = flume::bounded(capacity);
    (WorkQueueSender { tx }, WorkQueueReceiver { rx })
}

/// Returned when every receiver is gone
#[derive(Debug, thiserror::Error)]
#[error("work queue has no receivers")]
pub struct QueueDisconnected(pub InboundMessage);

#[derive(Debug, Clone)]
pub struct WorkQueueSender {
    tx: flume::Sender<InboundMessage>,
}

impl WorkQueueSender {
    /// Waits while the queue is full
    pub async fn send(&self, message: InboundMessage) -> Result<(), QueueDisconnected> {
        self.tx
            .send_async(message)
            .await
            .map_err(|e| QueueDisconnected(e.into_inner()))
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(usize::MAX)
    }
}

#[derive(Debug, Clone)]
pub struct WorkQueueReceiver {
    rx: flume::Receiver<InboundMessage>,
}

impl WorkQueueReceiver {
    /// Next message, or `None` once the queue is closed and drained
    pub async fn recv(&self) -> Option<InboundMessage> {
        self.rx.recv_async().await.ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.rx.capacity().unwrap_or(usize::MAX)
    }

    /// Every sender has been dropped
    pub fn is_closed(&self) -> bool {
        self.rx.is_disconnected()
    }
}
