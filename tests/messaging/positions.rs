//! Seek positions, limits and cancellation.

use crate::common::*;
use futures::StreamExt;
use kafka_messages::{
    ConsumerPosition, Error, ErrorKind, OutboundRecord, PollLimit, PollerSettings, SeekDirection,
    StreamEvent,
};
use std::time::Duration;

async fn seeded(harness: &Harness, partition: i32, count: usize) {
    harness
        .send_all(
            (0..count)
                .map(|i| {
                    OutboundRecord::new()
                        .with_value(format!("p{partition}-{i}"))
                        .with_partition(partition)
                })
                .collect(),
        )
        .await;
}

async fn values(harness: &Harness, position: ConsumerPosition, limit: PollLimit) -> Vec<String> {
    let events: Vec<StreamEvent> = harness.service.poll(TOPIC, position, None, limit).collect().await;
    messages(&events)
        .iter()
        .filter_map(|m| m.content_text().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn forward_from_offset() {
    let harness = Harness::new();
    seeded(&harness, 0, 5).await;

    let got = values(
        &harness,
        ConsumerPosition::offsets([(0, 3)], SeekDirection::Forward),
        PollLimit::default(),
    )
    .await;
    assert_eq!(got, ["p0-3", "p0-4"]);
}

#[tokio::test]
async fn backward_from_beginning_is_newest_first() {
    let harness = Harness::new();
    seeded(&harness, 0, 4).await;

    let got = values(
        &harness,
        ConsumerPosition::beginning(SeekDirection::Backward),
        PollLimit::messages(2),
    )
    .await;
    assert_eq!(got, ["p0-3", "p0-2"]);
}

#[tokio::test]
async fn backward_from_offset_includes_that_offset() {
    let harness = Harness::new();
    seeded(&harness, 0, 5).await;

    let got = values(
        &harness,
        ConsumerPosition::offsets([(0, 2)], SeekDirection::Backward),
        PollLimit::default(),
    )
    .await;
    assert_eq!(got, ["p0-2", "p0-1", "p0-0"]);
}

#[tokio::test]
async fn offsets_outside_the_watermarks_are_clamped() {
    let harness = Harness::new();
    seeded(&harness, 0, 3).await;

    let past_end = values(
        &harness,
        ConsumerPosition::offsets([(0, 50)], SeekDirection::Forward),
        PollLimit::default(),
    )
    .await;
    assert!(past_end.is_empty());

    let before_start = values(
        &harness,
        ConsumerPosition::offsets([(0, -4)], SeekDirection::Forward),
        PollLimit::default(),
    )
    .await;
    assert_eq!(before_start.len(), 3);
}

#[tokio::test]
async fn truncated_partition_starts_at_the_low_watermark() {
    let harness = Harness::new();
    seeded(&harness, 0, 5).await;
    harness.broker.truncate(TOPIC, 0, 3);

    let got = values(
        &harness,
        ConsumerPosition::beginning(SeekDirection::Forward),
        PollLimit::default(),
    )
    .await;
    assert_eq!(got, ["p0-3", "p0-4"]);

    let backward = values(
        &harness,
        ConsumerPosition::beginning(SeekDirection::Backward),
        PollLimit::default(),
    )
    .await;
    assert_eq!(backward, ["p0-4", "p0-3"]);
}

#[tokio::test]
async fn timestamp_seek_per_partition() {
    let harness = Harness::with_partitions(2);
    for (i, ts) in [100, 200, 300].into_iter().enumerate() {
        let value = format!("p0-{i}");
        harness
            .broker
            .append(TOPIC, 0, ts, None, Some(value.as_bytes()), &[])
            .unwrap();
    }

    let got = values(
        &harness,
        ConsumerPosition::timestamps([(0, 200)], SeekDirection::Forward),
        PollLimit::default(),
    )
    .await;
    assert_eq!(got, ["p0-1", "p0-2"]);

    let older = values(
        &harness,
        ConsumerPosition::timestamps([(0, 200)], SeekDirection::Backward),
        PollLimit::default(),
    )
    .await;
    assert_eq!(older, ["p0-0"]);
}

#[tokio::test]
async fn unknown_partition_fails_before_fetching() {
    let harness = Harness::new();
    seeded(&harness, 0, 2).await;

    let events: Vec<StreamEvent> = harness
        .service
        .poll(
            TOPIC,
            ConsumerPosition::offsets([(4, 0)], SeekDirection::Forward),
            None,
            PollLimit::default(),
        )
        .collect()
        .await;
    assert_eq!(events.len(), 1);
    match &events[0] {
        StreamEvent::Error(error) => assert_eq!(error.kind(), ErrorKind::InvalidPosition),
        other => panic!("expected an error, got {other:?}"),
    }
    assert_eq!(harness.broker.fetch_count(), 0);
}

#[tokio::test]
async fn unknown_topic_is_a_broker_error() {
    let harness = Harness::new();
    let events: Vec<StreamEvent> = harness
        .service
        .poll(
            "no-such-topic",
            ConsumerPosition::beginning(SeekDirection::Forward),
            None,
            PollLimit::default(),
        )
        .collect()
        .await;
    match events.last() {
        Some(StreamEvent::Error(error)) => assert_eq!(error.kind(), ErrorKind::Broker),
        other => panic!("expected an error, got {other:?}"),
    }
}

#[tokio::test]
async fn message_limit_and_phases() {
    let harness = Harness::with_partitions(3);
    for partition in 0..3 {
        seeded(&harness, partition, 4).await;
    }

    let events: Vec<StreamEvent> = harness
        .service
        .poll(
            TOPIC,
            ConsumerPosition::beginning(SeekDirection::Forward),
            None,
            PollLimit::messages(5),
        )
        .collect()
        .await;

    let phases = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::Phase(_)))
        .count();
    assert_eq!(phases, 3);
    assert_eq!(messages(&events).len(), 5);
    assert!(matches!(events.last(), Some(StreamEvent::Done(s)) if s.messages_emitted == 5));
}

#[tokio::test]
async fn per_partition_order_is_kept() {
    let harness = Harness::with_partitions(2);
    seeded(&harness, 0, 20).await;
    seeded(&harness, 1, 20).await;

    let events: Vec<StreamEvent> = harness
        .service
        .poll(
            TOPIC,
            ConsumerPosition::beginning(SeekDirection::Forward),
            None,
            PollLimit::default(),
        )
        .collect()
        .await;
    let polled = messages(&events);
    assert_eq!(polled.len(), 40);
    for partition in 0..2 {
        let offsets: Vec<i64> = polled
            .iter()
            .filter(|m| m.partition == partition)
            .map(|m| m.offset)
            .collect();
        assert_eq!(offsets, (0..20).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn duration_limit_returns_partial_results() {
    let settings = PollerSettings {
        fetch_batch_size: 1,
        channel_capacity: 1,
        ..PollerSettings::default()
    };
    let harness = Harness::with_settings(1, settings);
    seeded(&harness, 0, 3).await;

    let events: Vec<StreamEvent> = harness
        .service
        .poll(
            TOPIC,
            ConsumerPosition::beginning(SeekDirection::Forward),
            None,
            PollLimit::default().with_max_duration(Duration::ZERO),
        )
        .collect()
        .await;
    assert!(matches!(events.last(), Some(StreamEvent::Done(_))));
}

#[tokio::test]
async fn dropping_the_stream_cancels_the_session() {
    let settings = PollerSettings {
        fetch_batch_size: 1,
        channel_capacity: 1,
        ..PollerSettings::default()
    };
    let harness = Harness::with_settings(1, settings);
    seeded(&harness, 0, 200).await;

    let mut stream = harness.service.poll(
        TOPIC,
        ConsumerPosition::beginning(SeekDirection::Forward),
        None,
        PollLimit::default(),
    );
    while let Some(event) = stream.next().await {
        if event.as_message().is_some() {
            break;
        }
    }
    drop(stream);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let fetched = harness.broker.fetch_count();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.broker.fetch_count(), fetched);
    assert!(fetched < 200);
}

#[tokio::test]
async fn explicit_cancel_reports_cancellation() {
    let settings = PollerSettings {
        fetch_batch_size: 1,
        channel_capacity: 1,
        ..PollerSettings::default()
    };
    let harness = Harness::with_settings(1, settings);
    seeded(&harness, 0, 200).await;

    let mut stream = harness.service.poll(
        TOPIC,
        ConsumerPosition::beginning(SeekDirection::Forward),
        None,
        PollLimit::default(),
    );
    let mut last = None;
    let mut seen = 0;
    while let Some(event) = stream.next().await {
        if event.as_message().is_some() {
            seen += 1;
            if seen == 1 {
                stream.cancel();
            }
        }
        last = Some(event);
    }
    assert!(seen < 200);
    assert!(matches!(last, Some(StreamEvent::Error(Error::Cancelled))));
}

#[tokio::test]
async fn undecodable_records_are_reported_and_skipped() {
    let harness = Harness::new();
    harness
        .broker
        .append(TOPIC, 0, 0, None, Some(b"written before the schema"), &[])
        .unwrap();
    harness
        .value_schema(schema_resolver::SchemaFormat::Avro, AVRO_SCHEMA_2)
        .await;
    harness
        .send_all(vec![OutboundRecord::new().with_value(AVRO_SCHEMA_2_RECORD)])
        .await;

    let events: Vec<StreamEvent> = harness
        .service
        .poll(
            TOPIC,
            ConsumerPosition::beginning(SeekDirection::Forward),
            None,
            PollLimit::default(),
        )
        .collect()
        .await;

    let inline_errors: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Error(error) => Some(error),
            _ => None,
        })
        .collect();
    assert_eq!(inline_errors.len(), 1);
    assert_eq!(inline_errors[0].kind(), ErrorKind::Decode);
    assert!(matches!(inline_errors[0], Error::RecordDecode { offset: 0, .. }));

    let polled = messages(&events);
    assert_eq!(polled.len(), 1);
    assert_eq!(polled[0].offset, 1);
    assert!(matches!(events.last(), Some(StreamEvent::Done(_))));
}
