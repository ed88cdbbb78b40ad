//! Streaming consumption of a topic.

mod cursor;
mod session;
mod stream;

pub use stream::MessageStream;

use crate::broker::Broker;
use crate::model::{ConsumerPosition, PollLimit};
use message_codec::RecordCodec;
use message_filter::FilterLimits;
use session::Session;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct PollerSettings {
    /// Records requested per broker fetch; also the BACKWARD window size.
    pub fetch_batch_size: usize,
    /// Events buffered ahead of the consumer.
    pub channel_capacity: usize,
    /// Upper bound on a session when the caller sets no duration.
    pub max_poll_duration: Option<Duration>,
    pub filter_limits: FilterLimits,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            fetch_batch_size: 100,
            channel_capacity: 64,
            max_poll_duration: None,
            filter_limits: FilterLimits::default(),
        }
    }
}

pub struct Poller {
    broker: Arc<dyn Broker>,
    codec: Arc<RecordCodec>,
    settings: PollerSettings,
}

impl Poller {
    pub fn new(broker: Arc<dyn Broker>, codec: Arc<RecordCodec>, settings: PollerSettings) -> Self {
        Self {
            broker,
            codec,
            settings,
        }
    }

    pub fn settings(&self) -> &PollerSettings {
        &self.settings
    }

    /// Starts a poll session on the current tokio runtime.
    ///
    /// The stream yields PHASE events, then MESSAGE and inline decode ERROR
    /// events, and ends with DONE or a terminal ERROR.
    pub fn poll(
        &self,
        topic: &str,
        position: ConsumerPosition,
        filter: Option<String>,
        limit: PollLimit,
    ) -> MessageStream {
        let (events, receiver) = mpsc::channel(self.settings.channel_capacity.max(1));
        let cancel = CancellationToken::new();

        let session = Session {
            broker: self.broker.clone(),
            codec: self.codec.clone(),
            settings: self.settings.clone(),
            topic: topic.to_string(),
            position,
            filter,
            limit,
            events,
            cancel: cancel.clone(),
        };
        tokio::spawn(session.run());

        MessageStream::new(ReceiverStream::new(receiver), cancel)
    }
}
