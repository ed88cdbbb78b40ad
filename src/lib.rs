//! kafka-messaging
//!
//! The message-exchange core of a Kafka management tool: send records to a
//! topic and stream them back, with schema-aware encoding and an optional
//! per-message JavaScript filter.
//!
//! # Crates
//!
//! - `schema_resolver` - Schema Registry clients and the schema cache
//! - `message_codec` - RAW, AVRO, PROTOBUF and JSON_SCHEMA codecs and wire framing
//! - `message_filter` - the sandboxed filter engine
//! - `kafka_messages` - the broker abstraction, `MessageSender` and `Poller`
//!
//! # Usage
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use kafka_messaging::{Config, MessagesService};
//! use kafka_messages::{ConsumerPosition, OutboundRecord, PollLimit, SeekDirection};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let service = MessagesService::connect(&Config::default())?;
//! service
//!     .send("orders", OutboundRecord::new().with_key("k1").with_value("v1"))
//!     .await?;
//!
//! let mut stream = service.poll(
//!     "orders",
//!     ConsumerPosition::beginning(SeekDirection::Forward),
//!     Some("function filter(key) { return key === 'k1'; }".to_string()),
//!     PollLimit::messages(10),
//! );
//! while let Some(event) = stream.next().await {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod service;
pub mod telemetry;

pub use config::{parse_duration, Config};
pub use service::MessagesService;
pub use telemetry::init_tracing;
