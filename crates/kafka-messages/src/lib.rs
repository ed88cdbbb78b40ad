//! Sending and polling Kafka records.
//!
//! [`MessageSender`] encodes an [`OutboundRecord`] with the schemas registered
//! for the topic and produces it. [`Poller`] streams a topic back as
//! [`StreamEvent`]s, decoding each record and passing it through an optional
//! JavaScript filter.
//!
//! Both talk to Kafka through the [`Broker`] trait: [`RdkafkaBroker`] for a
//! real cluster, [`InMemoryBroker`] for tests.

pub mod broker;
pub mod error;
pub mod model;
pub mod poller;
pub mod sender;

pub use broker::{
    Broker, ConsumedRecord, FetchRequest, InMemoryBroker, PartitionInfo, ProduceRecord,
    ProducedOffset, RdkafkaBroker, RdkafkaBrokerConfig,
};
pub use error::{BrokerError, Error, ErrorKind, Result};
pub use model::{
    headers_size, ConsumerPosition, OutboundRecord, PollLimit, PollSummary, SeekDirection,
    SeekType, SendResult, StreamEvent, TopicMessage,
};
pub use poller::{MessageStream, Poller, PollerSettings};
pub use sender::MessageSender;
