//! Kafka transport for the order consumer.
//!
//! [`KafkaSource`] wraps an rdkafka `StreamConsumer` with auto-commit disabled. Offsets are committed explicitly, one
//! message at a time, after the order has been stored. A live consumer session keeps reading forward regardless of
//! what has been committed, so redelivery is done by seeking the partition back to the failed message. The seek is a
//! blocking librdkafka call, so it runs on the blocking thread pool.
//!
//! [`ServerDeadLetters`] chooses between publishing exhausted messages to a Kafka topic and discarding them.
use std::{sync::Arc, time::Duration};

use log::*;
use order_cache_engine::{DeadLetterSink, DiscardDeadLetters, MessageSource, StreamError, StreamMessage};
use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer, StreamConsumer},
    message::{Header, OwnedHeaders},
    producer::{FutureProducer, FutureRecord},
    Message,
    Offset,
    TopicPartitionList,
};

use crate::config::StreamConfig;

const SEEK_TIMEOUT: Duration = Duration::from_secs(5);
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

pub struct KafkaSource {
    consumer: Arc<StreamConsumer>,
}

impl KafkaSource {
    /// Creates the consumer and subscribes to the configured topic. New consumer groups start at the latest offset.
    pub fn new(config: &StreamConfig) -> Result<Self, StreamError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "latest")
            .create()
            .map_err(|e| StreamError::FetchError(format!("Could not create the Kafka consumer. {e}")))?;
        consumer
            .subscribe(&[config.topic.as_str()])
            .map_err(|e| StreamError::FetchError(format!("Could not subscribe to {}. {e}", config.topic)))?;
        info!("📡️ Subscribed to {} on {} as {}", config.topic, config.brokers, config.group_id);
        Ok(Self { consumer: Arc::new(consumer) })
    }
}

impl MessageSource for KafkaSource {
    async fn fetch(&mut self) -> Result<StreamMessage, StreamError> {
        let msg = self.consumer.recv().await.map_err(|e| StreamError::FetchError(e.to_string()))?;
        Ok(StreamMessage {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            key: msg.key().map(<[u8]>::to_vec),
            payload: msg.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        })
    }

    async fn commit(&mut self, message: &StreamMessage) -> Result<(), StreamError> {
        let commit_error = |reason: String| StreamError::CommitError {
            partition: message.partition,
            offset: message.offset,
            reason,
        };
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(&message.topic, message.partition, Offset::Offset(message.offset + 1))
            .map_err(|e| commit_error(e.to_string()))?;
        self.consumer.commit(&offsets, CommitMode::Async).map_err(|e| commit_error(e.to_string()))?;
        trace!("📡️ Committed {message}");
        Ok(())
    }

    async fn redeliver(&mut self, message: &StreamMessage) -> Result<(), StreamError> {
        let redelivery_error = |reason: String| StreamError::RedeliveryError {
            partition: message.partition,
            offset: message.offset,
            reason,
        };
        let consumer = Arc::clone(&self.consumer);
        let topic = message.topic.clone();
        let (partition, offset) = (message.partition, message.offset);
        tokio::task::spawn_blocking(move || consumer.seek(&topic, partition, Offset::Offset(offset), SEEK_TIMEOUT))
            .await
            .map_err(|e| redelivery_error(e.to_string()))?
            .map_err(|e| redelivery_error(e.to_string()))?;
        debug!("📡️ Rewound to {message}");
        Ok(())
    }
}

/// Publishes exhausted messages, with their original key and payload, to a dead-letter topic.
pub struct KafkaDeadLetters {
    producer: FutureProducer,
    topic: String,
}

impl KafkaDeadLetters {
    pub fn new(brokers: &str, topic: &str) -> Result<Self, StreamError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", PUBLISH_TIMEOUT.as_millis().to_string())
            .create()
            .map_err(|e| StreamError::DeadLetterError(format!("Could not create the Kafka producer. {e}")))?;
        info!("📡️ Dead letters will be published to {topic}");
        Ok(Self { producer, topic: topic.to_string() })
    }
}

impl DeadLetterSink for KafkaDeadLetters {
    async fn publish(&self, message: &StreamMessage, reason: &str) -> Result<(), StreamError> {
        let partition = message.partition.to_string();
        let offset = message.offset.to_string();
        let headers = OwnedHeaders::new()
            .insert(Header { key: "ocs_source_topic", value: Some(message.topic.as_str()) })
            .insert(Header { key: "ocs_source_partition", value: Some(partition.as_str()) })
            .insert(Header { key: "ocs_source_offset", value: Some(offset.as_str()) })
            .insert(Header { key: "ocs_failure_reason", value: Some(reason) });
        let mut record = FutureRecord::<[u8], [u8]>::to(&self.topic).payload(&message.payload).headers(headers);
        if let Some(key) = &message.key {
            record = record.key(key.as_slice());
        }
        self.producer
            .send(record, PUBLISH_TIMEOUT)
            .await
            .map_err(|(e, _)| StreamError::DeadLetterError(e.to_string()))?;
        Ok(())
    }
}

pub enum ServerDeadLetters {
    Kafka(KafkaDeadLetters),
    Discard(DiscardDeadLetters),
}

impl ServerDeadLetters {
    pub fn from_config(config: &StreamConfig) -> Result<Self, StreamError> {
        match &config.dead_letter_topic {
            Some(topic) => Ok(Self::Kafka(KafkaDeadLetters::new(&config.brokers, topic)?)),
            None => Ok(Self::Discard(DiscardDeadLetters)),
        }
    }
}

impl DeadLetterSink for ServerDeadLetters {
    async fn publish(&self, message: &StreamMessage, reason: &str) -> Result<(), StreamError> {
        match self {
            Self::Kafka(sink) => sink.publish(message, reason).await,
            Self::Discard(sink) => sink.publish(message, reason).await,
        }
    }
}
