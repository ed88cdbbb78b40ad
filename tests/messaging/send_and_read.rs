//! Round trips through send and poll for each payload format.

use crate::common::*;
use kafka_messages::{ErrorKind, OutboundRecord};
use message_codec::FormatTag;
use schema_resolver::SchemaFormat;

#[tokio::test]
async fn no_schemas_read_back_as_raw() {
    let harness = Harness::new();
    harness
        .send_all(vec![OutboundRecord::new().with_key("123").with_value("234.56")])
        .await;

    let polled = harness.poll_one().await;
    assert_eq!(polled.key_text(), Some("123"));
    assert_eq!(polled.content_text(), Some("234.56"));
    assert_eq!(polled.key_format(), Some(FormatTag::Raw));
    assert_eq!(polled.value_format(), Some(FormatTag::Raw));
    assert_eq!(polled.key_schema_id(), None);
    assert_eq!(polled.key_size, 3);
    assert_eq!(polled.value_size, 6);
}

#[tokio::test]
async fn non_json_text_is_kept_verbatim() {
    let harness = Harness::new();
    harness
        .send_all(vec![OutboundRecord::new()
            .with_key("not a json object")
            .with_value("{ broken")])
        .await;

    let polled = harness.poll_one().await;
    assert_eq!(polled.key_text(), Some("not a json object"));
    assert_eq!(polled.content_text(), Some("{ broken"));
}

#[tokio::test]
async fn key_is_avro_value_is_avro() {
    let harness = Harness::new();
    harness.key_schema(SchemaFormat::Avro, AVRO_SCHEMA_1).await;
    harness.value_schema(SchemaFormat::Avro, AVRO_SCHEMA_2).await;
    harness
        .send_all(vec![OutboundRecord::new()
            .with_key(AVRO_SCHEMA_1_RECORD)
            .with_value(AVRO_SCHEMA_2_RECORD)])
        .await;

    let polled = harness.poll_one().await;
    assert_json_eq(polled.key_text(), AVRO_SCHEMA_1_RECORD);
    assert_json_eq(polled.content_text(), AVRO_SCHEMA_2_RECORD);
}

#[tokio::test]
async fn raw_key_with_avro_value() {
    let harness = Harness::new();
    harness.value_schema(SchemaFormat::Avro, AVRO_SCHEMA_1).await;
    harness
        .send_all(vec![OutboundRecord::new()
            .with_key("testKey")
            .with_value(AVRO_SCHEMA_1_RECORD)])
        .await;

    let polled = harness.poll_one().await;
    assert_eq!(polled.key_text(), Some("testKey"));
    assert_eq!(polled.key_format(), Some(FormatTag::Raw));
    assert_json_eq(polled.content_text(), AVRO_SCHEMA_1_RECORD);
}

#[tokio::test]
async fn avro_key_with_raw_value() {
    let harness = Harness::new();
    harness.key_schema(SchemaFormat::Avro, AVRO_SCHEMA_1).await;
    harness
        .send_all(vec![OutboundRecord::new()
            .with_key(AVRO_SCHEMA_1_RECORD)
            .with_value("testVal")])
        .await;

    let polled = harness.poll_one().await;
    assert_json_eq(polled.key_text(), AVRO_SCHEMA_1_RECORD);
    assert_eq!(polled.content_text(), Some("testVal"));
}

#[tokio::test]
async fn raw_key_with_protobuf_value() {
    let harness = Harness::new();
    harness.value_schema(SchemaFormat::Protobuf, PROTOBUF_SCHEMA).await;
    harness
        .send_all(vec![OutboundRecord::new()
            .with_key("testKey")
            .with_value(PROTOBUF_RECORD)])
        .await;

    let polled = harness.poll_one().await;
    assert_eq!(polled.key_text(), Some("testKey"));
    assert_json_eq(polled.content_text(), PROTOBUF_RECORD);
}

#[tokio::test]
async fn null_key_is_preserved() {
    let harness = Harness::new();
    harness.key_schema(SchemaFormat::Avro, AVRO_SCHEMA_1).await;
    harness.value_schema(SchemaFormat::Avro, AVRO_SCHEMA_2).await;
    harness
        .send_all(vec![OutboundRecord::new().with_value(AVRO_SCHEMA_2_RECORD)])
        .await;

    let polled = harness.poll_one().await;
    assert!(polled.key.is_none());
    assert_eq!(polled.key_size, 0);
    assert_json_eq(polled.content_text(), AVRO_SCHEMA_2_RECORD);
}

#[tokio::test]
async fn null_value_is_preserved() {
    let harness = Harness::new();
    harness.key_schema(SchemaFormat::Avro, AVRO_SCHEMA_1).await;
    harness.value_schema(SchemaFormat::Avro, AVRO_SCHEMA_2).await;
    harness
        .send_all(vec![OutboundRecord::new().with_key(AVRO_SCHEMA_1_RECORD)])
        .await;

    let polled = harness.poll_one().await;
    assert_json_eq(polled.key_text(), AVRO_SCHEMA_1_RECORD);
    assert!(polled.content.is_none());
    assert_eq!(polled.value_size, 0);
}

#[tokio::test]
async fn avro_key_with_protobuf_value() {
    let harness = Harness::new();
    harness.key_schema(SchemaFormat::Avro, AVRO_SCHEMA_1).await;
    harness.value_schema(SchemaFormat::Protobuf, PROTOBUF_SCHEMA).await;
    harness
        .send_all(vec![OutboundRecord::new()
            .with_key(AVRO_SCHEMA_1_RECORD)
            .with_value(PROTOBUF_RECORD)])
        .await;

    let polled = harness.poll_one().await;
    assert_json_eq(polled.key_text(), AVRO_SCHEMA_1_RECORD);
    assert_json_eq(polled.content_text(), PROTOBUF_RECORD);
}

#[tokio::test]
async fn protobuf_key_with_json_schema_value() {
    let harness = Harness::new();
    harness.key_schema(SchemaFormat::Protobuf, PROTOBUF_SCHEMA).await;
    harness.value_schema(SchemaFormat::JsonSchema, JSON_SCHEMA).await;
    harness
        .send_all(vec![OutboundRecord::new()
            .with_key(PROTOBUF_RECORD)
            .with_value(JSON_SCHEMA_RECORD)])
        .await;

    let polled = harness.poll_one().await;
    assert_json_eq(polled.key_text(), PROTOBUF_RECORD);
    assert_json_eq(polled.content_text(), JSON_SCHEMA_RECORD);
}

#[tokio::test]
async fn json_schema_key_with_null_value() {
    let harness = Harness::new();
    harness.key_schema(SchemaFormat::JsonSchema, JSON_SCHEMA).await;
    harness.value_schema(SchemaFormat::JsonSchema, JSON_SCHEMA).await;
    harness
        .send_all(vec![OutboundRecord::new().with_key(JSON_SCHEMA_RECORD)])
        .await;

    let polled = harness.poll_one().await;
    assert_json_eq(polled.key_text(), JSON_SCHEMA_RECORD);
    assert!(polled.content.is_none());
}

#[tokio::test]
async fn avro_mismatch_fails_the_send() {
    let harness = Harness::new();
    harness.value_schema(SchemaFormat::Avro, AVRO_SCHEMA_2).await;

    let err = harness
        .service
        .send(
            TOPIC,
            OutboundRecord::new().with_value(r#"{ "f1": 111, "f2": {} }"#),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPayloadForSchema);
    assert!(harness.poll_all(None).await.is_empty());
}

#[tokio::test]
async fn protobuf_mismatch_fails_the_send() {
    let harness = Harness::new();
    harness.value_schema(SchemaFormat::Protobuf, PROTOBUF_SCHEMA).await;

    let err = harness
        .service
        .send(
            TOPIC,
            OutboundRecord::new().with_value(r#"{ "f1" : "test str", "f2" : {} }"#),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPayloadForSchema);
}

#[tokio::test]
async fn json_schema_mismatch_fails_the_send() {
    let harness = Harness::new();
    harness.value_schema(SchemaFormat::JsonSchema, JSON_SCHEMA).await;

    let err = harness
        .service
        .send(
            TOPIC,
            OutboundRecord::new().with_value(r#"{ "f1": 12, "f2": {}, "schema": "some txt" }"#),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPayloadForSchema);
}

#[tokio::test]
async fn key_mismatch_aborts_even_with_a_valid_value() {
    let harness = Harness::new();
    harness.key_schema(SchemaFormat::Avro, AVRO_SCHEMA_1).await;

    let err = harness
        .service
        .send(
            TOPIC,
            OutboundRecord::new().with_key("plain text").with_value("fine"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPayloadForSchema);
    assert!(harness.poll_all(None).await.is_empty());
}

#[tokio::test]
async fn avro_metadata() {
    let harness = Harness::new();
    harness.key_schema(SchemaFormat::Avro, AVRO_SCHEMA_1).await;
    harness.value_schema(SchemaFormat::Avro, AVRO_SCHEMA_2).await;
    harness
        .send_all(vec![OutboundRecord::new()
            .with_key(AVRO_SCHEMA_1_RECORD)
            .with_value(AVRO_SCHEMA_2_RECORD)])
        .await;

    let polled = harness.poll_one().await;
    assert_eq!(polled.key_size, 15);
    assert_eq!(polled.value_size, 15);
    assert_eq!(polled.key_format(), Some(FormatTag::Avro));
    assert_eq!(polled.value_format(), Some(FormatTag::Avro));
    assert!(!polled.key_schema_id().unwrap_or_default().is_empty());
    assert!(!polled.value_schema_id().unwrap_or_default().is_empty());
}

#[tokio::test]
async fn protobuf_metadata() {
    let harness = Harness::new();
    harness.key_schema(SchemaFormat::Protobuf, PROTOBUF_SCHEMA).await;
    harness.value_schema(SchemaFormat::Protobuf, PROTOBUF_SCHEMA).await;
    harness
        .send_all(vec![OutboundRecord::new()
            .with_key(PROTOBUF_RECORD)
            .with_value(PROTOBUF_RECORD)])
        .await;

    let polled = harness.poll_one().await;
    assert_json_eq(polled.key_text(), PROTOBUF_RECORD);
    assert_json_eq(polled.content_text(), PROTOBUF_RECORD);
    assert_eq!(polled.key_size, 18);
    assert_eq!(polled.value_size, 18);
    assert_eq!(polled.key_format(), Some(FormatTag::Protobuf));
    assert_eq!(polled.value_format(), Some(FormatTag::Protobuf));
    // Identical schema text under both subjects shares one id.
    assert_eq!(polled.key_schema_id(), polled.value_schema_id());
}

#[tokio::test]
async fn json_schema_metadata_and_headers() {
    let harness = Harness::new();
    harness.key_schema(SchemaFormat::JsonSchema, JSON_SCHEMA).await;
    harness.value_schema(SchemaFormat::JsonSchema, JSON_SCHEMA).await;
    harness
        .send_all(vec![OutboundRecord::new()
            .with_key(JSON_SCHEMA_RECORD)
            .with_value(JSON_SCHEMA_RECORD)
            .with_header("header1", "value1")])
        .await;

    let polled = harness.poll_one().await;
    assert_json_eq(polled.key_text(), JSON_SCHEMA_RECORD);
    assert_json_eq(polled.content_text(), JSON_SCHEMA_RECORD);
    assert_eq!(polled.key_format(), Some(FormatTag::JsonSchema));
    assert_eq!(polled.value_format(), Some(FormatTag::JsonSchema));
    assert_eq!(polled.key_size, 57);
    assert_eq!(polled.value_size, 57);
    assert_eq!(polled.headers_size, 13);
    assert_eq!(
        polled.headers.get("header1").map(String::as_str),
        Some("value1")
    );
}

#[tokio::test]
async fn send_result_reports_encoded_sizes() {
    let harness = Harness::new();
    harness.key_schema(SchemaFormat::Avro, AVRO_SCHEMA_1).await;

    let result = harness
        .service
        .send(
            TOPIC,
            OutboundRecord::new()
                .with_key(AVRO_SCHEMA_1_RECORD)
                .with_value("abc"),
        )
        .await
        .unwrap();
    assert_eq!(result.partition, 0);
    assert_eq!(result.offset, 0);
    assert_eq!(result.key_size, 15);
    assert_eq!(result.value_size, 3);
}

#[tokio::test]
async fn schema_registered_later_is_seen_after_invalidation() {
    let harness = Harness::new();
    harness
        .send_all(vec![OutboundRecord::new().with_value("before")])
        .await;

    harness.value_schema(SchemaFormat::Avro, AVRO_SCHEMA_1).await;
    // The RAW answer is cached until the topic is invalidated.
    harness
        .send_all(vec![OutboundRecord::new().with_value("still raw")])
        .await;

    harness.service.invalidate_topic(TOPIC);
    let err = harness
        .service
        .send(TOPIC, OutboundRecord::new().with_value("now rejected"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPayloadForSchema);
}
