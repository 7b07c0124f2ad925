//! Record source contract for partition consumers

use crate::shardline::error::SourceError;
use async_trait::async_trait;

/// One record read from the source, with its position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Vec<u8>,
}

/// What a source hands back on each read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    Record(SourceRecord),
    /// Source-reported error; the consumer keeps reading
    Error(String),
    /// Partition assignment changed
    Rebalance(String),
}

/// A stream of records from one consumer-group member
#[async_trait]
pub trait RecordSource: Send {
    /// Next event, or `None` once the source's message stream is closed
    async fn next_event(&mut self) -> Option<SourceEvent>;

    /// Advance the read position past `record`
    fn acknowledge(&self, record: &SourceRecord) -> Result<(), SourceError>;

    /// Label used in log lines
    fn describe(&self) -> String;

    /// Release the underlying client
    fn close(&mut self) {}
}

/// Creates one source per partition consumer
pub trait SourceFactory: Send + Sync {
    fn create(&self, consumer_id: usize) -> Result<Box<dyn RecordSource>, SourceError>;
}
