//! Upstream log source: partition consumers and their manager

pub mod channel_source;
pub mod client_config_builder;
pub mod consumer_manager;
pub mod kafka_source;
pub mod message;
pub mod partition_consumer;
pub mod source;
pub mod utils;

pub use channel_source::{channel_source, ChannelSource, ChannelSourceFactory, ChannelSourceHandle};
pub use client_config_builder::ClientConfigBuilder;
pub use consumer_manager::ConsumerManager;
pub use kafka_source::{IngestConsumerContext, KafkaRecordSource, KafkaSourceFactory};
pub use message::InboundMessage;
pub use partition_consumer::{ConsumerExit, PartitionConsumer};
pub use source::{RecordSource, SourceEvent, SourceFactory, SourceRecord};
pub use utils::convert_kafka_log_level;
