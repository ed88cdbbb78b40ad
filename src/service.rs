use crate::config::Config;
use anyhow::Context;
use kafka_messages::{
    Broker, ConsumerPosition, MessageSender, MessageStream, OutboundRecord, PollLimit, Poller,
    PollerSettings, RdkafkaBroker, SendResult,
};
use message_codec::RecordCodec;
use schema_resolver::{HttpSchemaRegistry, NoSchemaRegistry, SchemaRegistry, SchemaResolver};
use std::sync::Arc;
use tracing::info;

/// The two caller operations, `send` and `poll`, over one broker and one
/// schema cache.
pub struct MessagesService {
    resolver: Arc<SchemaResolver>,
    sender: MessageSender,
    poller: Poller,
}

impl MessagesService {
    /// Connects to the configured Kafka cluster and Schema Registry.
    pub fn connect(config: &Config) -> anyhow::Result<Self> {
        let broker =
            RdkafkaBroker::new(config.broker_config()).context("Failed to create Kafka client")?;

        let registry: Arc<dyn SchemaRegistry> = match config.registry_config() {
            Some(registry_config) => {
                info!(url = %registry_config.url, "Using Schema Registry");
                Arc::new(
                    HttpSchemaRegistry::new(registry_config)
                        .context("Failed to create Schema Registry client")?,
                )
            }
            None => {
                info!("No Schema Registry configured, all topics are RAW");
                Arc::new(NoSchemaRegistry)
            }
        };

        let resolver =
            SchemaResolver::new(registry).with_pinned_versions(config.pinned_versions()?);

        Ok(Self::new(
            Arc::new(broker),
            Arc::new(resolver),
            config.poller_settings()?,
        ))
    }

    pub fn new(
        broker: Arc<dyn Broker>,
        resolver: Arc<SchemaResolver>,
        settings: PollerSettings,
    ) -> Self {
        let codec = Arc::new(RecordCodec::new(resolver.clone()));
        Self {
            sender: MessageSender::new(broker.clone(), codec.clone()),
            poller: Poller::new(broker, codec, settings),
            resolver,
        }
    }

    pub async fn send(
        &self,
        topic: &str,
        record: OutboundRecord,
    ) -> kafka_messages::Result<SendResult> {
        self.sender.send(topic, record).await
    }

    pub fn poll(
        &self,
        topic: &str,
        position: ConsumerPosition,
        filter: Option<String>,
        limit: PollLimit,
    ) -> MessageStream {
        self.poller.poll(topic, position, filter, limit)
    }

    /// Drops the cached key and value schemas of `topic`; the next send or
    /// poll fetches them again.
    pub fn invalidate_topic(&self, topic: &str) {
        self.resolver.invalidate_topic(topic);
    }

    pub fn resolver(&self) -> &Arc<SchemaResolver> {
        &self.resolver
    }
}
