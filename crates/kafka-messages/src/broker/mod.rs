//! The broker collaborator: metadata, offset lookup, fetch and produce.

mod memory;
mod kafka;

pub use self::memory::InMemoryBroker;
pub use self::kafka::{RdkafkaBroker, RdkafkaBrokerConfig};

use crate::error::BrokerError;
use async_trait::async_trait;

/// Watermarks of one partition. `high` is the offset the next record gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionInfo {
    pub partition: i32,
    pub low: i64,
    pub high: i64,
}

impl PartitionInfo {
    pub fn is_empty(&self) -> bool {
        self.high <= self.low
    }
}

/// Records `[from, until)` of one partition, at most `max_records` of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub topic: String,
    pub partition: i32,
    pub from: i64,
    pub until: i64,
    pub max_records: usize,
}

/// A record as stored on the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedRecord {
    pub partition: i32,
    pub offset: i64,
    /// Epoch millis.
    pub timestamp: Option<i64>,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub headers: Vec<(String, Vec<u8>)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceRecord {
    pub topic: String,
    pub partition: Option<i32>,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub headers: Vec<(String, Vec<u8>)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProducedOffset {
    pub partition: i32,
    pub offset: i64,
}

#[async_trait]
pub trait Broker: Send + Sync {
    /// Partitions of `topic` in ascending id order, with their watermarks.
    async fn partitions(&self, topic: &str) -> Result<Vec<PartitionInfo>, BrokerError>;

    /// The first offset whose timestamp is at or after `timestamp`, or
    /// `None` when every record is older.
    async fn offset_for_timestamp(
        &self,
        topic: &str,
        partition: i32,
        timestamp: i64,
    ) -> Result<Option<i64>, BrokerError>;

    /// Records in offset order. May return fewer than requested, and an
    /// empty batch once `until` or the end of the partition is reached.
    async fn fetch(&self, request: FetchRequest) -> Result<Vec<ConsumedRecord>, BrokerError>;

    async fn produce(&self, record: ProduceRecord) -> Result<ProducedOffset, BrokerError>;
}
