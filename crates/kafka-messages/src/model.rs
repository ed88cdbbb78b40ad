//! Records going in and out of a topic.

use crate::error::Error;
use chrono::{DateTime, Utc};
use message_codec::{DecodedField, FormatTag};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// A record to produce. `None` key or value is sent as a Kafka null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundRecord {
    pub key: Option<String>,
    pub value: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Target partition; the broker picks one when unset.
    pub partition: Option<i32>,
}

impl OutboundRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_partition(mut self, partition: i32) -> Self {
        self.partition = Some(partition);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeekType {
    Beginning,
    Offset,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeekDirection {
    #[default]
    Forward,
    Backward,
}

/// Where a poll session starts, per partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerPosition {
    pub seek_type: SeekType,
    /// Partition to offset (OFFSET) or epoch millis (TIMESTAMP). Empty means
    /// every partition of the topic.
    #[serde(default)]
    pub seek_to: BTreeMap<i32, i64>,
    #[serde(default)]
    pub direction: SeekDirection,
}

impl ConsumerPosition {
    pub fn beginning(direction: SeekDirection) -> Self {
        Self {
            seek_type: SeekType::Beginning,
            seek_to: BTreeMap::new(),
            direction,
        }
    }

    pub fn offsets(
        offsets: impl IntoIterator<Item = (i32, i64)>,
        direction: SeekDirection,
    ) -> Self {
        Self {
            seek_type: SeekType::Offset,
            seek_to: offsets.into_iter().collect(),
            direction,
        }
    }

    pub fn timestamps(
        timestamps: impl IntoIterator<Item = (i32, i64)>,
        direction: SeekDirection,
    ) -> Self {
        Self {
            seek_type: SeekType::Timestamp,
            seek_to: timestamps.into_iter().collect(),
            direction,
        }
    }
}

/// A consumed record after decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicMessage {
    pub partition: i32,
    pub offset: i64,
    pub timestamp: Option<DateTime<Utc>>,
    pub key: Option<DecodedField>,
    pub content: Option<DecodedField>,
    pub headers: BTreeMap<String, String>,
    pub key_size: i64,
    pub value_size: i64,
    pub headers_size: i64,
}

impl TopicMessage {
    pub fn key_text(&self) -> Option<&str> {
        self.key.as_ref().map(|field| field.value.as_str())
    }

    pub fn content_text(&self) -> Option<&str> {
        self.content.as_ref().map(|field| field.value.as_str())
    }

    pub fn key_format(&self) -> Option<FormatTag> {
        self.key.as_ref().map(|field| field.format)
    }

    pub fn value_format(&self) -> Option<FormatTag> {
        self.content.as_ref().map(|field| field.format)
    }

    pub fn key_schema_id(&self) -> Option<&str> {
        self.key.as_ref().and_then(|field| field.schema_id.as_deref())
    }

    pub fn value_schema_id(&self) -> Option<&str> {
        self.content
            .as_ref()
            .and_then(|field| field.schema_id.as_deref())
    }
}

/// Sum of the UTF-8 lengths of every header name and value.
pub fn headers_size(headers: &BTreeMap<String, String>) -> i64 {
    headers
        .iter()
        .map(|(name, value)| (name.len() + value.len()) as i64)
        .sum()
}

/// Counters reported when a poll session completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSummary {
    pub messages_consumed: u64,
    pub messages_emitted: u64,
    pub bytes_consumed: u64,
    pub filter_applications: u64,
    pub elapsed_ms: u64,
}

/// One item of a poll stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamEvent {
    Message(TopicMessage),
    Phase(String),
    Done(PollSummary),
    Error(Error),
}

impl StreamEvent {
    pub fn as_message(&self) -> Option<&TopicMessage> {
        match self {
            StreamEvent::Message(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            StreamEvent::Done(_) => true,
            StreamEvent::Error(error) => !matches!(error, Error::RecordDecode { .. }),
            _ => false,
        }
    }
}

/// When to stop a poll session. Unset fields do not limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollLimit {
    pub max_messages: Option<usize>,
    pub max_duration: Option<Duration>,
}

impl PollLimit {
    pub fn messages(max_messages: usize) -> Self {
        Self {
            max_messages: Some(max_messages),
            max_duration: None,
        }
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResult {
    pub partition: i32,
    pub offset: i64,
    pub key_size: i64,
    pub value_size: i64,
}
