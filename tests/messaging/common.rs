use futures::StreamExt;
use kafka_messages::{
    ConsumerPosition, InMemoryBroker, OutboundRecord, PollLimit, PollerSettings, SeekDirection,
    StreamEvent, TopicMessage,
};
use kafka_messaging::MessagesService;
use schema_resolver::{InMemorySchemaRegistry, SchemaFormat, SchemaRegistry, SchemaResolver};
use std::sync::Arc;

pub const TOPIC: &str = "send-and-read";

pub const AVRO_SCHEMA_1: &str = r#"{
  "type": "record",
  "name": "TestAvroRecord1",
  "fields": [
    { "name": "field1", "type": "string" },
    { "name": "field2", "type": "int" }
  ]
}"#;

pub const AVRO_SCHEMA_2: &str = r#"{
  "type": "record",
  "name": "TestAvroRecord2",
  "fields": [
    { "name": "f1", "type": "int" },
    { "name": "f2", "type": "string" }
  ]
}"#;

pub const AVRO_SCHEMA_1_RECORD: &str = r#"{ "field1":"testStr", "field2": 123 }"#;
pub const AVRO_SCHEMA_2_RECORD: &str = r#"{ "f1": 111, "f2": "testStr" }"#;

pub const PROTOBUF_SCHEMA: &str = r#"syntax = "proto3";
package com.provectus;

message TestProtoRecord {
  string f1 = 1;
  int32 f2 = 2;
}
"#;

pub const PROTOBUF_RECORD: &str = r#"{ "f1" : "test str", "f2" : 123 }"#;

pub const JSON_SCHEMA: &str = r#"{
  "$schema": "http://json-schema.org/draft-07/schema#",
  "$id": "http://example.com/myURI.schema.json",
  "title": "TestRecord",
  "type": "object",
  "additionalProperties": false,
  "properties": {
    "f1": { "type": "integer" },
    "f2": { "type": "string" },
    "schema": { "type": "string" }
  }
}"#;

pub const JSON_SCHEMA_RECORD: &str =
    r#"{ "f1": 12, "f2": "testJsonSchema1", "schema": "some txt" }"#;

/// A service over an in-memory broker and registry, with one topic.
pub struct Harness {
    pub broker: Arc<InMemoryBroker>,
    pub registry: Arc<InMemorySchemaRegistry>,
    pub service: MessagesService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_partitions(1)
    }

    pub fn with_partitions(partitions: usize) -> Self {
        Self::with_settings(partitions, PollerSettings::default())
    }

    pub fn with_settings(partitions: usize, settings: PollerSettings) -> Self {
        kafka_messaging::init_tracing();

        let broker = Arc::new(InMemoryBroker::new());
        broker.create_topic(TOPIC, partitions);
        let registry = Arc::new(InMemorySchemaRegistry::default());
        let resolver = Arc::new(SchemaResolver::new(registry.clone()));
        let service = MessagesService::new(broker.clone(), resolver, settings);

        Self {
            broker,
            registry,
            service,
        }
    }

    pub async fn key_schema(&self, format: SchemaFormat, schema: &str) -> &Self {
        self.registry
            .register(&format!("{TOPIC}-key"), format, schema)
            .await
            .unwrap();
        self
    }

    pub async fn value_schema(&self, format: SchemaFormat, schema: &str) -> &Self {
        self.registry
            .register(&format!("{TOPIC}-value"), format, schema)
            .await
            .unwrap();
        self
    }

    pub async fn send_all(&self, records: Vec<OutboundRecord>) {
        for record in records {
            self.service.send(TOPIC, record).await.unwrap();
        }
    }

    pub async fn events(&self, filter: Option<&str>, limit: PollLimit) -> Vec<StreamEvent> {
        self.service
            .poll(
                TOPIC,
                ConsumerPosition::beginning(SeekDirection::Forward),
                filter.map(str::to_string),
                limit,
            )
            .collect()
            .await
    }

    /// Every message from the beginning; panics on a terminal error.
    pub async fn poll_all(&self, filter: Option<&str>) -> Vec<TopicMessage> {
        let events = self.events(filter, PollLimit::default()).await;
        match events.last() {
            Some(StreamEvent::Done(_)) => {}
            other => panic!("poll did not finish cleanly: {other:?}"),
        }
        messages(&events)
    }

    pub async fn poll_one(&self) -> TopicMessage {
        let mut polled = self.poll_all(None).await;
        assert_eq!(polled.len(), 1, "expected exactly one message");
        polled.remove(0)
    }
}

pub fn messages(events: &[StreamEvent]) -> Vec<TopicMessage> {
    events
        .iter()
        .filter_map(StreamEvent::as_message)
        .cloned()
        .collect()
}

pub fn assert_json_eq(actual: Option<&str>, expected: &str) {
    let actual: serde_json::Value =
        serde_json::from_str(actual.expect("field should not be null")).unwrap();
    let expected: serde_json::Value = serde_json::from_str(expected).unwrap();
    assert_eq!(actual, expected);
}
