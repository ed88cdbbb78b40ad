use super::{
    Broker, ConsumedRecord, FetchRequest, PartitionInfo, ProduceRecord, ProducedOffset,
};
use crate::error::BrokerError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Partition {
    /// Offset of `records[0]`.
    low: i64,
    records: Vec<ConsumedRecord>,
}

impl Partition {
    fn high(&self) -> i64 {
        self.low + self.records.len() as i64
    }
}

#[derive(Debug, Default)]
struct Topic {
    partitions: Vec<Partition>,
    next_partition: usize,
}

/// A broker held in memory, for tests and local experiments.
///
/// Produced records without an explicit partition go to the partition chosen
/// by a hash of the key, or round-robin when there is no key.
#[derive(Debug, Default)]
pub struct InMemoryBroker {
    topics: Mutex<HashMap<String, Topic>>,
    fetches: AtomicUsize,
    failing: AtomicBool,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_topic(&self, topic: &str, partitions: usize) {
        let mut topics = self.lock();
        let entry = topics.entry(topic.to_string()).or_default();
        while entry.partitions.len() < partitions.max(1) {
            entry.partitions.push(Partition::default());
        }
    }

    /// Appends a record with an explicit timestamp and returns its offset.
    pub fn append(
        &self,
        topic: &str,
        partition: i32,
        timestamp: i64,
        key: Option<&[u8]>,
        value: Option<&[u8]>,
        headers: &[(&str, &[u8])],
    ) -> Result<i64, BrokerError> {
        let mut topics = self.lock();
        let slot = topics
            .get_mut(topic)
            .ok_or_else(|| BrokerError::TopicNotFound(topic.to_string()))?
            .partitions
            .get_mut(partition_index(topic, partition)?)
            .ok_or_else(|| BrokerError::PartitionNotFound {
                topic: topic.to_string(),
                partition,
            })?;

        let offset = slot.high();
        slot.records.push(ConsumedRecord {
            partition,
            offset,
            timestamp: Some(timestamp),
            key: key.map(<[u8]>::to_vec),
            value: value.map(<[u8]>::to_vec),
            headers: headers
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_vec()))
                .collect(),
        });
        Ok(offset)
    }

    /// Drops every record below `low`, as retention would.
    pub fn truncate(&self, topic: &str, partition: i32, low: i64) {
        let mut topics = self.lock();
        let Some(slot) = topics
            .get_mut(topic)
            .and_then(|t| t.partitions.get_mut(partition.max(0) as usize))
        else {
            return;
        };
        let removed = (low - slot.low).clamp(0, slot.records.len() as i64) as usize;
        slot.records.drain(..removed);
        slot.low += removed as i64;
    }

    /// Makes every following fetch fail until reset.
    pub fn fail_fetches(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of fetch calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Topic>> {
        self.topics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn partition_index(topic: &str, partition: i32) -> Result<usize, BrokerError> {
    usize::try_from(partition).map_err(|_| BrokerError::PartitionNotFound {
        topic: topic.to_string(),
        partition,
    })
}

/// FNV-1a, so keyed records land on a stable partition.
fn key_hash(key: &[u8]) -> u64 {
    key.iter().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn partitions(&self, topic: &str) -> Result<Vec<PartitionInfo>, BrokerError> {
        let topics = self.lock();
        let entry = topics
            .get(topic)
            .ok_or_else(|| BrokerError::TopicNotFound(topic.to_string()))?;
        Ok(entry
            .partitions
            .iter()
            .enumerate()
            .map(|(id, p)| PartitionInfo {
                partition: id as i32,
                low: p.low,
                high: p.high(),
            })
            .collect())
    }

    async fn offset_for_timestamp(
        &self,
        topic: &str,
        partition: i32,
        timestamp: i64,
    ) -> Result<Option<i64>, BrokerError> {
        let topics = self.lock();
        let slot = topics
            .get(topic)
            .ok_or_else(|| BrokerError::TopicNotFound(topic.to_string()))?
            .partitions
            .get(partition_index(topic, partition)?)
            .ok_or_else(|| BrokerError::PartitionNotFound {
                topic: topic.to_string(),
                partition,
            })?;

        Ok(slot
            .records
            .iter()
            .find(|r| r.timestamp.unwrap_or(i64::MIN) >= timestamp)
            .map(|r| r.offset))
    }

    async fn fetch(&self, request: FetchRequest) -> Result<Vec<ConsumedRecord>, BrokerError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(BrokerError::Kafka(format!(
                "fetch from {}/{} failed",
                request.topic, request.partition
            )));
        }

        let topics = self.lock();
        let slot = topics
            .get(&request.topic)
            .ok_or_else(|| BrokerError::TopicNotFound(request.topic.clone()))?
            .partitions
            .get(partition_index(&request.topic, request.partition)?)
            .ok_or_else(|| BrokerError::PartitionNotFound {
                topic: request.topic.clone(),
                partition: request.partition,
            })?;

        let start = (request.from.max(slot.low) - slot.low) as usize;
        let end = (request.until.min(slot.high()) - slot.low).max(0) as usize;
        if start >= end {
            return Ok(Vec::new());
        }
        let end = end.min(start + request.max_records);
        Ok(slot.records[start..end].to_vec())
    }

    async fn produce(&self, record: ProduceRecord) -> Result<ProducedOffset, BrokerError> {
        let mut topics = self.lock();
        let entry = topics
            .get_mut(&record.topic)
            .ok_or_else(|| BrokerError::TopicNotFound(record.topic.clone()))?;

        let count = entry.partitions.len();
        let partition = match (record.partition, &record.key) {
            (Some(partition), _) => partition,
            (None, Some(key)) => (key_hash(key) % count as u64) as i32,
            (None, None) => {
                let next = entry.next_partition % count;
                entry.next_partition = next + 1;
                next as i32
            }
        };

        let slot = entry
            .partitions
            .get_mut(partition_index(&record.topic, partition)?)
            .ok_or_else(|| BrokerError::PartitionNotFound {
                topic: record.topic.clone(),
                partition,
            })?;

        let offset = slot.high();
        slot.records.push(ConsumedRecord {
            partition,
            offset,
            timestamp: Some(chrono::Utc::now().timestamp_millis()),
            key: record.key,
            value: record.value,
            headers: record.headers,
        });
        Ok(ProducedOffset { partition, offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetch(topic: &str, partition: i32, from: i64, until: i64, max: usize) -> FetchRequest {
        FetchRequest {
            topic: topic.to_string(),
            partition,
            from,
            until,
            max_records: max,
        }
    }

    #[tokio::test]
    async fn test_produce_and_fetch() {
        let broker = InMemoryBroker::new();
        broker.create_topic("orders", 2);

        for i in 0..5 {
            let produced = broker
                .produce(ProduceRecord {
                    topic: "orders".to_string(),
                    partition: Some(1),
                    key: None,
                    value: Some(format!("v{i}").into_bytes()),
                    headers: vec![],
                })
                .await
                .unwrap();
            assert_eq!(produced, ProducedOffset { partition: 1, offset: i });
        }

        let partitions = broker.partitions("orders").await.unwrap();
        assert_eq!(partitions[0], PartitionInfo { partition: 0, low: 0, high: 0 });
        assert_eq!(partitions[1], PartitionInfo { partition: 1, low: 0, high: 5 });

        let batch = broker.fetch(fetch("orders", 1, 1, 5, 2)).await.unwrap();
        assert_eq!(
            batch.iter().map(|r| r.offset).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert!(broker.fetch(fetch("orders", 1, 5, 10, 2)).await.unwrap().is_empty());
        assert_eq!(broker.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_keyed_records_stick_to_a_partition() {
        let broker = InMemoryBroker::new();
        broker.create_topic("keyed", 4);

        let mut seen = Vec::new();
        for _ in 0..3 {
            let produced = broker
                .produce(ProduceRecord {
                    topic: "keyed".to_string(),
                    partition: None,
                    key: Some(b"customer-7".to_vec()),
                    value: None,
                    headers: vec![],
                })
                .await
                .unwrap();
            seen.push(produced.partition);
        }
        assert!(seen.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn test_unknown_topic_and_partition() {
        let broker = InMemoryBroker::new();
        assert_eq!(
            broker.partitions("missing").await.unwrap_err(),
            BrokerError::TopicNotFound("missing".to_string())
        );

        broker.create_topic("one", 1);
        let err = broker
            .produce(ProduceRecord {
                topic: "one".to_string(),
                partition: Some(3),
                key: None,
                value: None,
                headers: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::PartitionNotFound { partition: 3, .. }));
    }

    #[tokio::test]
    async fn test_offset_for_timestamp_and_truncate() {
        let broker = InMemoryBroker::new();
        broker.create_topic("ts", 1);
        for (i, ts) in [100, 200, 300].into_iter().enumerate() {
            let offset = broker
                .append("ts", 0, ts, None, Some(b"x"), &[])
                .unwrap();
            assert_eq!(offset, i as i64);
        }

        assert_eq!(broker.offset_for_timestamp("ts", 0, 150).await.unwrap(), Some(1));
        assert_eq!(broker.offset_for_timestamp("ts", 0, 300).await.unwrap(), Some(2));
        assert_eq!(broker.offset_for_timestamp("ts", 0, 301).await.unwrap(), None);

        broker.truncate("ts", 0, 2);
        let partitions = broker.partitions("ts").await.unwrap();
        assert_eq!(partitions[0], PartitionInfo { partition: 0, low: 2, high: 3 });
        let batch = broker.fetch(fetch("ts", 0, 0, 3, 10)).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].offset, 2);
    }

    #[tokio::test]
    async fn test_failing_fetches() {
        let broker = InMemoryBroker::new();
        broker.create_topic("t", 1);
        broker.fail_fetches(true);
        assert!(matches!(
            broker.fetch(fetch("t", 0, 0, 1, 1)).await,
            Err(BrokerError::Kafka(_))
        ));
    }
}
