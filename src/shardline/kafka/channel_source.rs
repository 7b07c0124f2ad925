//! In-process record source
//!
//! A [`RecordSource`] fed through a channel. Records pushed through the
//! [`ChannelSourceHandle`] get consecutive offsets starting at 0; dropping
//! every handle closes the source's message stream.

use super::source::{RecordSource, SourceEvent, SourceFactory, SourceRecord};
use crate::shardline::error::SourceError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Default)]
struct Positions {
    next_offset: AtomicI64,
    acknowledged: Mutex<Vec<i64>>,
}

/// Producer side of a [`ChannelSource`]
#[derive(Debug, Clone)]
pub struct ChannelSourceHandle {
    topic: String,
    partition: i32,
    events: flume::Sender<SourceEvent>,
    positions: Arc<Positions>,
}

impl ChannelSourceHandle {
    /// Queue a record; returns its offset
    pub fn push(&self, payload: impl Into<Vec<u8>>) -> i64 {
        let offset = self.positions.next_offset.fetch_add(1, Ordering::SeqCst);
        let _ = self.events.send(SourceEvent::Record(SourceRecord {
            topic: self.topic.clone(),
            partition: self.partition,
            offset,
            payload: payload.into(),
        }));
        offset
    }

    pub fn push_error(&self, message: impl Into<String>) {
        let _ = self.events.send(SourceEvent::Error(message.into()));
    }

    pub fn push_rebalance(&self, description: impl Into<String>) {
        let _ = self.events.send(SourceEvent::Rebalance(description.into()));
    }

    /// Offsets acknowledged so far, in acknowledgement order
    pub fn acknowledged(&self) -> Vec<i64> {
        self.positions
            .acknowledged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events queued but not yet read
    pub fn pending(&self) -> usize {
        self.events.len()
    }
}

/// Consumer side, handed to a partition consumer
pub struct ChannelSource {
    topic: String,
    partition: i32,
    events: flume::Receiver<SourceEvent>,
    positions: Arc<Positions>,
}

pub fn channel_source(topic: impl Into<String>, partition: i32) -> (ChannelSourceHandle, ChannelSource) {
    let topic = topic.into();
    let (tx, rx) = flume::unbounded();
    let positions = Arc::new(Positions::default());
    (
        ChannelSourceHandle {
            topic: topic.clone(),
            partition,
            events: tx,
            positions: positions.clone(),
        },
        ChannelSource {
            topic,
            partition,
            events: rx,
            positions,
        },
    )
}

#[async_trait]
impl RecordSource for ChannelSource {
    async fn next_event(&mut self) -> Option<SourceEvent> {
        self.events.recv_async().await.ok()
    }

    fn acknowledge(&self, record: &SourceRecord) -> Result<(), SourceError> {
        self.positions
            .acknowledged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.offset);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{}[{}]", self.topic, self.partition)
    }
}

/// Hands out one channel source per consumer id and keeps the handles
#[derive(Debug, Default)]
pub struct ChannelSourceFactory {
    topic: String,
    handles: Mutex<HashMap<usize, ChannelSourceHandle>>,
}

impl ChannelSourceFactory {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Handle for the source created for `consumer_id`
    pub fn handle(&self, consumer_id: usize) -> Option<ChannelSourceHandle> {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&consumer_id)
            .cloned()
    }

    /// Drop every retained handle so sources see their streams close
    pub fn close_all(&self) {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl SourceFactory for ChannelSourceFactory {
    fn create(&self, consumer_id: usize) -> Result<Box<dyn RecordSource>, SourceError> {
        let (handle, source) = channel_source(self.topic.clone(), consumer_id as i32);
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(consumer_id, handle);
        Ok(Box::new(source))
    }
}
