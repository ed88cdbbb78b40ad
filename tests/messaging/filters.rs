//! Filtering a poll with a JavaScript predicate.

use crate::common::*;
use kafka_messages::{Error, ErrorKind, OutboundRecord, PollLimit, StreamEvent};

const SIGNATURE: &str = "function filter(key, content, headers, offset, partition)";

fn filter(body: &str) -> String {
    format!("{SIGNATURE} {{ {body} }}")
}

#[tokio::test]
async fn empty_filter_passes_everything() {
    let harness = Harness::new();
    harness
        .send_all(vec![OutboundRecord::new().with_key("test-key")])
        .await;

    for source in [None, Some(""), Some("  ")] {
        let polled = harness.poll_all(source).await;
        assert_eq!(polled.len(), 1);
        assert_eq!(polled[0].key_text(), Some("test-key"));
    }
}

#[tokio::test]
async fn filter_on_key() {
    let harness = Harness::new();
    harness
        .send_all(vec![
            OutboundRecord::new().with_key("key1"),
            OutboundRecord::new().with_key("key2"),
            OutboundRecord::new().with_key("test"),
        ])
        .await;

    let polled = harness
        .poll_all(Some(&filter("return key.indexOf('key') != -1;")))
        .await;
    assert_eq!(polled.len(), 2);
    assert_eq!(polled[0].key_text(), Some("key1"));
    assert_eq!(polled[1].key_text(), Some("key2"));
}

#[tokio::test]
async fn filter_on_content() {
    let harness = Harness::new();
    harness
        .send_all(vec![
            OutboundRecord::new().with_value("kafka"),
            OutboundRecord::new().with_value("ui"),
            OutboundRecord::new().with_value("tests"),
        ])
        .await;

    let polled = harness
        .poll_all(Some(&filter("return content.length > 4;")))
        .await;
    assert_eq!(polled.len(), 2);
    assert_eq!(polled[0].content_text(), Some("kafka"));
    assert_eq!(polled[1].content_text(), Some("tests"));
}

#[tokio::test]
async fn filter_on_headers() {
    let harness = Harness::new();
    harness
        .send_all(
            ["1", "20", "110"]
                .into_iter()
                .map(|value| OutboundRecord::new().with_value("1").with_header("value", value))
                .collect(),
        )
        .await;

    let polled = harness
        .poll_all(Some(&filter("return headers.value > 10;")))
        .await;
    assert_eq!(polled.len(), 2);
    assert_eq!(polled[0].headers.get("value").map(String::as_str), Some("20"));
    assert_eq!(polled[1].headers.get("value").map(String::as_str), Some("110"));
}

#[tokio::test]
async fn filter_on_offset() {
    let harness = Harness::new();
    harness
        .send_all(vec![
            OutboundRecord::new().with_key("key1"),
            OutboundRecord::new().with_key("key2"),
            OutboundRecord::new().with_key("key3"),
        ])
        .await;

    let polled = harness.poll_all(Some(&filter("return offset > 0;"))).await;
    assert_eq!(polled.len(), 2);
    assert_eq!(polled[0].offset, 1);
    assert_eq!(polled[1].offset, 2);
}

#[tokio::test]
async fn filter_on_partition() {
    let harness = Harness::with_partitions(2);
    harness
        .send_all(vec![
            OutboundRecord::new().with_key("key1").with_partition(0),
            OutboundRecord::new().with_key("key2").with_partition(0),
            OutboundRecord::new().with_key("key3").with_partition(1),
        ])
        .await;

    let polled = harness
        .poll_all(Some(&filter("return partition == 0;")))
        .await;
    assert_eq!(polled.len(), 2);
    assert!(polled.iter().all(|m| m.partition == 0));
}

#[tokio::test]
async fn filter_sees_decoded_content() {
    let harness = Harness::new();
    harness
        .value_schema(schema_resolver::SchemaFormat::Avro, AVRO_SCHEMA_2)
        .await;
    harness
        .send_all(vec![
            OutboundRecord::new().with_value(r#"{"f1": 1, "f2": "skip"}"#),
            OutboundRecord::new().with_value(r#"{"f1": 2, "f2": "keep"}"#),
        ])
        .await;

    let polled = harness
        .poll_all(Some(&filter("return JSON.parse(content).f2 === 'keep';")))
        .await;
    assert_eq!(polled.len(), 1);
    assert_json_eq(polled[0].content_text(), r#"{"f1": 2, "f2": "keep"}"#);
}

#[tokio::test]
async fn filter_runtime_error_ends_the_poll() {
    let harness = Harness::new();
    harness
        .send_all(vec![OutboundRecord::new().with_key("key1")])
        .await;

    let source = filter("return key.content.headers;");
    let events = harness.events(Some(&source), PollLimit::default()).await;

    assert!(messages(&events).is_empty());
    match events.last() {
        Some(StreamEvent::Error(error @ Error::Filter(_))) => {
            assert_eq!(error.kind(), ErrorKind::FilterEval);
            assert!(error.to_string().contains(&source));
        }
        other => panic!("expected a filter error, got {other:?}"),
    }
}

#[tokio::test]
async fn filter_compile_error_ends_the_poll() {
    let harness = Harness::new();
    harness
        .send_all(vec![OutboundRecord::new().with_key("key1")])
        .await;

    let events = harness
        .events(Some("function filter(key {"), PollLimit::default())
        .await;
    assert_eq!(events.len(), 1);
    match &events[0] {
        StreamEvent::Error(error) => assert_eq!(error.kind(), ErrorKind::FilterCompile),
        other => panic!("expected a compile error, got {other:?}"),
    }
}

#[tokio::test]
async fn filtered_out_messages_do_not_count_toward_the_limit() {
    let harness = Harness::new();
    harness
        .send_all(
            (0..10)
                .map(|i| OutboundRecord::new().with_value(i.to_string()))
                .collect(),
        )
        .await;

    let events = harness
        .events(
            Some(&filter("return Number(content) % 2 === 1;")),
            PollLimit::messages(3),
        )
        .await;
    let values: Vec<_> = messages(&events)
        .iter()
        .filter_map(|m| m.content_text().map(str::to_string))
        .collect();
    assert_eq!(values, ["1", "3", "5"]);

    match events.last() {
        Some(StreamEvent::Done(summary)) => {
            assert_eq!(summary.messages_emitted, 3);
            assert_eq!(summary.filter_applications, summary.messages_consumed);
        }
        other => panic!("expected DONE, got {other:?}"),
    }
}
