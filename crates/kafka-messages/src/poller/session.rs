//! One poll session: setup, partition workers and the emit stage.

use super::cursor::{PartitionCursor, StartPoint};
use super::PollerSettings;
use crate::broker::{Broker, ConsumedRecord, FetchRequest, PartitionInfo};
use crate::error::{Error, Result};
use crate::model::{
    headers_size, ConsumerPosition, PollLimit, PollSummary, SeekDirection, SeekType, StreamEvent,
    TopicMessage,
};
use chrono::{DateTime, Utc};
use message_codec::RecordCodec;
use message_filter::{FilterInput, MessageFilter};
use schema_resolver::TopicSchemas;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What a partition worker hands to the emit stage.
enum WorkerItem {
    Message { message: TopicMessage, bytes: u64 },
    Undecodable(Error),
    Failed(Error),
}

pub(crate) struct Session {
    pub broker: Arc<dyn Broker>,
    pub codec: Arc<RecordCodec>,
    pub settings: PollerSettings,
    pub topic: String,
    pub position: ConsumerPosition,
    pub filter: Option<String>,
    pub limit: PollLimit,
    pub events: mpsc::Sender<StreamEvent>,
    pub cancel: CancellationToken,
}

impl Session {
    pub async fn run(self) {
        let started = Instant::now();
        info!(
            topic = %self.topic,
            seek = ?self.position.seek_type,
            direction = ?self.position.direction,
            "Poll session started"
        );

        let prepared = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                let _ = self.events.send(StreamEvent::Error(Error::Cancelled)).await;
                return;
            }
            prepared = self.prepare() => prepared,
        };

        let (filter, schemas, cursors) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(topic = %self.topic, "Poll session failed to start: {e}");
                let _ = self.events.send(StreamEvent::Error(e)).await;
                return;
            }
        };

        let total = cursors.len();
        for (n, cursor) in cursors.iter().enumerate() {
            debug!(
                topic = %self.topic,
                partition = cursor.partition,
                remaining = cursor.remaining(),
                "Partition assigned"
            );
            let phase = StreamEvent::Phase(format!("partition {} of {} assigned", n + 1, total));
            if !self.emit(phase).await {
                return;
            }
        }

        let workers = self.cancel.child_token();
        let (items_tx, items) = mpsc::channel(self.settings.channel_capacity.max(1));
        let schemas = Arc::new(schemas);
        let mut tasks = JoinSet::new();
        for cursor in cursors {
            let worker = PartitionWorker {
                broker: self.broker.clone(),
                codec: self.codec.clone(),
                schemas: schemas.clone(),
                topic: self.topic.clone(),
                batch_size: self.settings.fetch_batch_size,
                items: items_tx.clone(),
                cancel: workers.clone(),
            };
            tasks.spawn(worker.run(cursor));
        }
        drop(items_tx);

        let outcome = self.emit_stage(filter, items, started).await;
        workers.cancel();
        tasks.abort_all();

        match outcome {
            Outcome::Done(summary) => {
                info!(
                    topic = %self.topic,
                    consumed = summary.messages_consumed,
                    emitted = summary.messages_emitted,
                    elapsed_ms = summary.elapsed_ms,
                    "Poll session finished"
                );
                let _ = self.emit(StreamEvent::Done(summary)).await;
            }
            Outcome::Failed(e) => {
                warn!(topic = %self.topic, "Poll session failed: {e}");
                let _ = self.emit(StreamEvent::Error(e)).await;
            }
            Outcome::Cancelled => {
                debug!(topic = %self.topic, "Poll session cancelled");
                let _ = self.events.send(StreamEvent::Error(Error::Cancelled)).await;
            }
        }
    }

    async fn prepare(&self) -> Result<(MessageFilter, TopicSchemas, Vec<PartitionCursor>)> {
        let filter =
            MessageFilter::compile(self.filter.as_deref(), self.settings.filter_limits.clone())
                .await?;
        let schemas = self.codec.resolver().resolve_topic(&self.topic).await?;
        let partitions = self.broker.partitions(&self.topic).await?;

        let selected = self.select_partitions(&partitions)?;
        let mut cursors = Vec::with_capacity(selected.len());
        for info in selected {
            let start = self.start_point(&info).await?;
            cursors.push(PartitionCursor::new(&info, start, self.position.direction));
        }
        Ok((filter, schemas, cursors))
    }

    /// Partitions named by the seek points, or all of them.
    fn select_partitions(&self, partitions: &[PartitionInfo]) -> Result<Vec<PartitionInfo>> {
        if self.position.seek_to.is_empty() {
            return Ok(partitions.to_vec());
        }
        self.position
            .seek_to
            .keys()
            .map(|partition| {
                partitions
                    .iter()
                    .find(|info| info.partition == *partition)
                    .copied()
                    .ok_or_else(|| {
                        Error::InvalidPosition(format!(
                            "partition {partition} does not exist in topic '{}'",
                            self.topic
                        ))
                    })
            })
            .collect()
    }

    async fn start_point(&self, info: &PartitionInfo) -> Result<StartPoint> {
        let seek = self.position.seek_to.get(&info.partition).copied();
        Ok(match (self.position.seek_type, seek) {
            (SeekType::Offset, Some(offset)) => StartPoint::Offset(offset),
            (SeekType::Timestamp, Some(timestamp)) => StartPoint::Timestamp(
                self.broker
                    .offset_for_timestamp(&self.topic, info.partition, timestamp)
                    .await?,
            ),
            _ => StartPoint::Beginning,
        })
    }

    async fn emit_stage(
        &self,
        filter: MessageFilter,
        mut items: mpsc::Receiver<WorkerItem>,
        started: Instant,
    ) -> Outcome {
        let mut summary = PollSummary::default();
        let deadline = self
            .limit
            .max_duration
            .or(self.settings.max_poll_duration)
            .map(|d| tokio::time::Instant::from_std(started) + d);
        let expired = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expired);

        let limit_reached = |summary: &PollSummary| {
            matches!(self.limit.max_messages, Some(max) if summary.messages_emitted >= max as u64)
        };

        while !limit_reached(&summary) {
            let item = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Outcome::Cancelled,
                _ = &mut expired => {
                    debug!(topic = %self.topic, "Poll duration limit reached");
                    break;
                }
                item = items.recv() => item,
            };

            match item {
                None => break,
                Some(WorkerItem::Failed(e)) => return Outcome::Failed(e),
                Some(WorkerItem::Undecodable(e)) => {
                    summary.messages_consumed += 1;
                    if !self.emit(StreamEvent::Error(e)).await {
                        return Outcome::Cancelled;
                    }
                }
                Some(WorkerItem::Message { message, bytes }) => {
                    summary.messages_consumed += 1;
                    summary.bytes_consumed += bytes;

                    if !filter.is_accept_all() {
                        summary.filter_applications += 1;
                        match filter.evaluate(filter_input(&message)).await {
                            Ok(true) => {}
                            Ok(false) => continue,
                            Err(e) => return Outcome::Failed(e.into()),
                        }
                    }

                    if !self.emit(StreamEvent::Message(message)).await {
                        return Outcome::Cancelled;
                    }
                    summary.messages_emitted += 1;
                }
            }
        }

        summary.elapsed_ms = started.elapsed().as_millis() as u64;
        Outcome::Done(summary)
    }

    /// Sends an event unless the session is cancelled first.
    async fn emit(&self, event: StreamEvent) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.events.send(event) => sent.is_ok(),
        }
    }
}

enum Outcome {
    Done(PollSummary),
    Failed(Error),
    Cancelled,
}

fn filter_input(message: &TopicMessage) -> FilterInput {
    FilterInput {
        key: message.key_text().map(str::to_string),
        content: message.content_text().map(str::to_string),
        headers: message.headers.clone(),
        offset: message.offset,
        partition: message.partition,
    }
}

struct PartitionWorker {
    broker: Arc<dyn Broker>,
    codec: Arc<RecordCodec>,
    schemas: Arc<TopicSchemas>,
    topic: String,
    batch_size: usize,
    items: mpsc::Sender<WorkerItem>,
    cancel: CancellationToken,
}

impl PartitionWorker {
    async fn run(self, mut cursor: PartitionCursor) {
        while let Some(window) = cursor.next_window(self.batch_size) {
            if self.cancel.is_cancelled() {
                return;
            }

            let fetched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                fetched = self.fetch_window(cursor.partition, window) => fetched,
            };
            let mut records = match fetched {
                Ok(records) => records,
                Err(e) => {
                    let _ = self.items.send(WorkerItem::Failed(e)).await;
                    return;
                }
            };
            cursor.advance(window);

            if cursor.direction == SeekDirection::Backward {
                records.reverse();
            }
            debug!(
                topic = %self.topic,
                partition = cursor.partition,
                from = window.0,
                until = window.1,
                count = records.len(),
                "Fetched batch"
            );

            for record in records {
                let item = self.decode(record).await;
                if self.items.send(item).await.is_err() {
                    return;
                }
            }
        }
    }

    /// Every record in `[from, until)`, in offset order.
    async fn fetch_window(
        &self,
        partition: i32,
        (from, until): (i64, i64),
    ) -> Result<Vec<ConsumedRecord>> {
        let mut records = Vec::new();
        let mut next = from;
        while next < until {
            let batch = self
                .broker
                .fetch(FetchRequest {
                    topic: self.topic.clone(),
                    partition,
                    from: next,
                    until,
                    max_records: self.batch_size.max(1),
                })
                .await?;
            let Some(last) = batch.last() else {
                break;
            };
            next = last.offset + 1;
            records.extend(batch);
        }
        Ok(records)
    }

    async fn decode(&self, record: ConsumedRecord) -> WorkerItem {
        let key_size = record.key.as_ref().map_or(0, Vec::len);
        let value_size = record.value.as_ref().map_or(0, Vec::len);

        let decoded = async {
            let key = match &record.key {
                Some(bytes) => Some(self.codec.decode(bytes, self.schemas.key.as_ref()).await?),
                None => None,
            };
            let content = match &record.value {
                Some(bytes) => Some(self.codec.decode(bytes, self.schemas.value.as_ref()).await?),
                None => None,
            };
            Ok::<_, message_codec::CodecError>((key, content))
        }
        .await;

        let (key, content) = match decoded {
            Ok(fields) => fields,
            Err(error) => {
                warn!(
                    topic = %self.topic,
                    partition = record.partition,
                    offset = record.offset,
                    "Failed to decode record: {error}"
                );
                return WorkerItem::Undecodable(Error::RecordDecode {
                    partition: record.partition,
                    offset: record.offset,
                    error,
                });
            }
        };

        let headers: BTreeMap<String, String> = record
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), String::from_utf8_lossy(value).into_owned()))
            .collect();

        let message = TopicMessage {
            partition: record.partition,
            offset: record.offset,
            timestamp: record.timestamp.and_then(DateTime::<Utc>::from_timestamp_millis),
            key,
            content,
            headers_size: headers_size(&headers),
            headers,
            key_size: key_size as i64,
            value_size: value_size as i64,
        };

        WorkerItem::Message {
            message,
            bytes: (key_size + value_size) as u64,
        }
    }
}
