//! Kafka-backed record source

use super::client_config_builder::ClientConfigBuilder;
use super::source::{RecordSource, SourceEvent, SourceFactory, SourceRecord};
use super::utils::convert_kafka_log_level;
use crate::shardline::config::KafkaConsumerConfig;
use crate::shardline::error::SourceError;
use async_trait::async_trait;
use log::{error, info};
use rdkafka::config::RDKafkaLogLevel;
use rdkafka::consumer::{Consumer, ConsumerContext, Rebalance, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::{ClientContext, Message};
use tokio::sync::mpsc;

/// Consumer context that bridges librdkafka logs into `log` and forwards
/// rebalance notifications to the consumer loop
pub struct IngestConsumerContext {
    consumer_id: usize,
    rebalances: mpsc::UnboundedSender<String>,
}

impl ClientContext for IngestConsumerContext {
    fn log(&self, level: RDKafkaLogLevel, fac: &str, message: &str) {
        log::log!(
            convert_kafka_log_level(level),
            "Kafka log (consumer {}, {}): {}",
            self.consumer_id,
            fac,
            message
        );
    }

    fn error(&self, error: KafkaError, reason: &str) {
        error!(
            "Kafka client error (consumer {}): {:?}, reason: {}",
            self.consumer_id, error, reason
        );
    }
}

impl ConsumerContext for IngestConsumerContext {
    fn post_rebalance(&self, rebalance: &Rebalance<'_>) {
        let description = match rebalance {
            Rebalance::Assign(partitions) => {
                format!("assigned {} partition(s)", partitions.count())
            }
            Rebalance::Revoke(partitions) => {
                format!("revoked {} partition(s)", partitions.count())
            }
            Rebalance::Error(e) => format!("rebalance error: {}", e),
        };
        let _ = self.rebalances.send(description);
    }
}

/// One consumer-group member subscribed to the configured topics
pub struct KafkaRecordSource {
    consumer_id: usize,
    topics: String,
    consumer: StreamConsumer<IngestConsumerContext>,
    rebalances: mpsc::UnboundedReceiver<String>,
}

impl KafkaRecordSource {
    pub fn new(consumer_id: usize, config: &KafkaConsumerConfig) -> Result<Self, SourceError> {
        let connect_error = |source: KafkaError| SourceError::Connect {
            consumer_id,
            brokers: config.bootstrap_servers(),
            source,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let context = IngestConsumerContext {
            consumer_id,
            rebalances: tx,
        };
        let consumer: StreamConsumer<IngestConsumerContext> =
            ClientConfigBuilder::for_consumer(config)
                .build()
                .create_with_context(context)
                .map_err(connect_error)?;

        let topics: Vec<&str> = config.topics.iter().map(String::as_str).collect();
        consumer.subscribe(&topics).map_err(connect_error)?;

        info!(
            "Kafka consumer {} subscribed to [{}] as group '{}'",
            consumer_id,
            config.topics.join(","),
            config.group_id
        );

        Ok(Self {
            consumer_id,
            topics: config.topics.join(","),
            consumer,
            rebalances: rx,
        })
    }
}

#[async_trait]
impl RecordSource for KafkaRecordSource {
    /// The Kafka stream never closes on its own; consumers leave on stop
    async fn next_event(&mut self) -> Option<SourceEvent> {
        tokio::select! {
            biased;
            Some(description) = self.rebalances.recv() => Some(SourceEvent::Rebalance(description)),
            result = self.consumer.recv() => match result {
                Ok(message) => Some(SourceEvent::Record(SourceRecord {
                    topic: message.topic().to_string(),
                    partition: message.partition(),
                    offset: message.offset(),
                    payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                })),
                Err(e) => Some(SourceEvent::Error(e.to_string())),
            },
        }
    }

    /// Stores the next read position; the background auto-commit picks it up
    fn acknowledge(&self, record: &SourceRecord) -> Result<(), SourceError> {
        self.consumer
            .store_offset(&record.topic, record.partition, record.offset + 1)
            .map_err(|source| SourceError::Acknowledge {
                topic: record.topic.clone(),
                partition: record.partition,
                offset: record.offset,
                source,
            })
    }

    fn describe(&self) -> String {
        format!("Topic({}) consumer {}", self.topics, self.consumer_id)
    }

    fn close(&mut self) {
        self.consumer.unsubscribe();
    }
}

/// Builds a [`KafkaRecordSource`] per partition consumer
pub struct KafkaSourceFactory {
    config: KafkaConsumerConfig,
}

impl KafkaSourceFactory {
    pub fn new(config: KafkaConsumerConfig) -> Self {
        Self { config }
    }
}

impl SourceFactory for KafkaSourceFactory {
    fn create(&self, consumer_id: usize) -> Result<Box<dyn RecordSource>, SourceError> {
        Ok(Box::new(KafkaRecordSource::new(consumer_id, &self.config)?))
    }
}
