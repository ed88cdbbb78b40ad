use super::{
    Broker, ConsumedRecord, FetchRequest, PartitionInfo, ProduceRecord, ProducedOffset,
};
use crate::error::BrokerError;
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::{Header, Headers, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{Offset, TopicPartitionList};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Connection settings for [`RdkafkaBroker`].
#[derive(Debug, Clone)]
pub struct RdkafkaBrokerConfig {
    /// Kafka brokers (comma-separated list)
    pub brokers: String,
    /// How long one fetch may wait for records before returning what it has.
    pub fetch_timeout: Duration,
    /// Delivery timeout of a produce, passed as `message.timeout.ms`.
    pub produce_timeout: Duration,
    /// Timeout of metadata, watermark and offset lookups.
    pub metadata_timeout: Duration,
}

impl Default for RdkafkaBrokerConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            fetch_timeout: Duration::from_secs(5),
            produce_timeout: Duration::from_secs(5),
            metadata_timeout: Duration::from_secs(5),
        }
    }
}

/// A [`Broker`] backed by librdkafka.
///
/// Lookups share one metadata consumer. Every fetch assigns a fresh consumer
/// to the single partition it reads, so concurrent partition workers never
/// contend for one assignment.
pub struct RdkafkaBroker {
    config: RdkafkaBrokerConfig,
    producer: FutureProducer,
    metadata: Arc<BaseConsumer>,
}

impl RdkafkaBroker {
    pub fn new(config: RdkafkaBrokerConfig) -> Result<Self, BrokerError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set(
                "message.timeout.ms",
                config.produce_timeout.as_millis().to_string(),
            )
            .create()
            .map_err(|e| BrokerError::Kafka(format!("Failed to create producer: {e}")))?;

        let metadata = Self::consumer(&config.brokers)?;

        info!(brokers = %config.brokers, "Connected Kafka broker client");
        Ok(Self {
            config,
            producer,
            metadata: Arc::new(metadata),
        })
    }

    fn consumer(brokers: &str) -> Result<BaseConsumer, BrokerError> {
        ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", format!("kafka-messaging-{}", uuid::Uuid::new_v4()))
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "true")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(|e| BrokerError::Kafka(format!("Failed to create consumer: {e}")))
    }

    /// Runs a blocking librdkafka call off the async runtime.
    async fn blocking<T, F>(f: F) -> Result<T, BrokerError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, BrokerError> + Send + 'static,
    {
        tokio::task::spawn_blocking(f)
            .await
            .map_err(|e| BrokerError::Kafka(format!("Blocking Kafka task failed: {e}")))?
    }
}

fn kafka_error(context: &str, error: KafkaError) -> BrokerError {
    match error.rdkafka_error_code() {
        Some(RDKafkaErrorCode::MessageTimedOut)
        | Some(RDKafkaErrorCode::OperationTimedOut)
        | Some(RDKafkaErrorCode::RequestTimedOut) => {
            BrokerError::Timeout(format!("{context}: {error}"))
        }
        _ => BrokerError::Kafka(format!("{context}: {error}")),
    }
}

fn consumed(message: &impl Message) -> ConsumedRecord {
    let headers = message
        .headers()
        .map(|headers| {
            headers
                .iter()
                .map(|header| {
                    (
                        header.key.to_string(),
                        header.value.unwrap_or_default().to_vec(),
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    ConsumedRecord {
        partition: message.partition(),
        offset: message.offset(),
        timestamp: message.timestamp().to_millis(),
        key: message.key().map(<[u8]>::to_vec),
        value: message.payload().map(<[u8]>::to_vec),
        headers,
    }
}

#[async_trait]
impl Broker for RdkafkaBroker {
    async fn partitions(&self, topic: &str) -> Result<Vec<PartitionInfo>, BrokerError> {
        let consumer = Arc::clone(&self.metadata);
        let topic = topic.to_string();
        let timeout = self.config.metadata_timeout;

        Self::blocking(move || {
            let metadata = consumer
                .fetch_metadata(Some(&topic), timeout)
                .map_err(|e| kafka_error("Failed to fetch metadata", e))?;
            let Some(topic_metadata) = metadata.topics().first() else {
                return Err(BrokerError::TopicNotFound(topic));
            };
            if topic_metadata.error().is_some() || topic_metadata.partitions().is_empty() {
                return Err(BrokerError::TopicNotFound(topic));
            }

            let mut ids: Vec<i32> = topic_metadata.partitions().iter().map(|p| p.id()).collect();
            ids.sort_unstable();

            ids.into_iter()
                .map(|partition| {
                    let (low, high) = consumer
                        .fetch_watermarks(&topic, partition, timeout)
                        .map_err(|e| kafka_error("Failed to fetch watermarks", e))?;
                    Ok(PartitionInfo {
                        partition,
                        low,
                        high,
                    })
                })
                .collect()
        })
        .await
    }

    async fn offset_for_timestamp(
        &self,
        topic: &str,
        partition: i32,
        timestamp: i64,
    ) -> Result<Option<i64>, BrokerError> {
        let consumer = Arc::clone(&self.metadata);
        let topic = topic.to_string();
        let timeout = self.config.metadata_timeout;

        Self::blocking(move || {
            let mut tpl = TopicPartitionList::new();
            tpl.add_partition_offset(&topic, partition, Offset::Offset(timestamp))
                .map_err(|e| kafka_error("Failed to build partition list", e))?;

            let offsets = consumer
                .offsets_for_times(tpl, timeout)
                .map_err(|e| kafka_error("Failed to look up offsets for timestamp", e))?;

            let found = offsets
                .find_partition(&topic, partition)
                .map(|element| element.offset());
            match found {
                Some(Offset::Offset(offset)) if offset >= 0 => Ok(Some(offset)),
                _ => Ok(None),
            }
        })
        .await
    }

    async fn fetch(&self, request: FetchRequest) -> Result<Vec<ConsumedRecord>, BrokerError> {
        let brokers = self.config.brokers.clone();
        let fetch_timeout = self.config.fetch_timeout;

        Self::blocking(move || {
            let consumer = Self::consumer(&brokers)?;
            let mut tpl = TopicPartitionList::new();
            tpl.add_partition_offset(&request.topic, request.partition, Offset::Offset(request.from))
                .map_err(|e| kafka_error("Failed to build partition list", e))?;
            consumer
                .assign(&tpl)
                .map_err(|e| kafka_error("Failed to assign partition", e))?;

            let deadline = Instant::now() + fetch_timeout;
            let mut records = Vec::new();
            while records.len() < request.max_records {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match consumer.poll(remaining) {
                    None => break,
                    Some(Err(KafkaError::PartitionEOF(_))) => break,
                    Some(Err(e)) => return Err(kafka_error("Failed to fetch records", e)),
                    Some(Ok(message)) => {
                        if message.offset() >= request.until {
                            break;
                        }
                        records.push(consumed(&message));
                    }
                }
            }

            debug!(
                topic = %request.topic,
                partition = request.partition,
                from = request.from,
                count = records.len(),
                "Fetched records"
            );
            Ok(records)
        })
        .await
    }

    async fn produce(&self, record: ProduceRecord) -> Result<ProducedOffset, BrokerError> {
        let mut headers = OwnedHeaders::new();
        for (key, value) in &record.headers {
            headers = headers.insert(Header {
                key: key.as_str(),
                value: Some(value.as_slice()),
            });
        }

        let mut future_record = FutureRecord::<[u8], [u8]>::to(&record.topic).headers(headers);
        if let Some(key) = record.key.as_deref() {
            future_record = future_record.key(key);
        }
        if let Some(value) = record.value.as_deref() {
            future_record = future_record.payload(value);
        }
        if let Some(partition) = record.partition {
            future_record = future_record.partition(partition);
        }

        let (partition, offset) = self
            .producer
            .send(future_record, self.config.produce_timeout)
            .await
            .map_err(|(e, _)| kafka_error("Failed to produce record", e))?;

        debug!(topic = %record.topic, partition, offset, "Produced record");
        Ok(ProducedOffset { partition, offset })
    }
}
