use crate::broker::{Broker, ProduceRecord};
use crate::error::Result;
use crate::model::{OutboundRecord, SendResult};
use message_codec::RecordCodec;
use schema_resolver::SchemaDescriptor;
use std::sync::Arc;
use tracing::info;

/// Encodes outbound records with the topic's schemas and produces them.
pub struct MessageSender {
    broker: Arc<dyn Broker>,
    codec: Arc<RecordCodec>,
}

impl MessageSender {
    pub fn new(broker: Arc<dyn Broker>, codec: Arc<RecordCodec>) -> Self {
        Self { broker, codec }
    }

    /// Sends one record. Nothing reaches the broker unless both key and
    /// value encode.
    pub async fn send(&self, topic: &str, record: OutboundRecord) -> Result<SendResult> {
        let schemas = self.codec.resolver().resolve_topic(topic).await?;

        let key = self.encode(record.key.as_deref(), schemas.key.as_deref())?;
        let value = self.encode(record.value.as_deref(), schemas.value.as_deref())?;

        let key_size = key.as_ref().map_or(0, Vec::len) as i64;
        let value_size = value.as_ref().map_or(0, Vec::len) as i64;

        let produced = self
            .broker
            .produce(ProduceRecord {
                topic: topic.to_string(),
                partition: record.partition,
                key,
                value,
                headers: record
                    .headers
                    .into_iter()
                    .map(|(name, value)| (name, value.into_bytes()))
                    .collect(),
            })
            .await?;

        info!(
            topic,
            partition = produced.partition,
            offset = produced.offset,
            key_size,
            value_size,
            "Sent record"
        );

        Ok(SendResult {
            partition: produced.partition,
            offset: produced.offset,
            key_size,
            value_size,
        })
    }

    fn encode(
        &self,
        text: Option<&str>,
        schema: Option<&SchemaDescriptor>,
    ) -> Result<Option<Vec<u8>>> {
        text.map(|text| self.codec.encode(text, schema))
            .transpose()
            .map_err(Into::into)
    }
}
