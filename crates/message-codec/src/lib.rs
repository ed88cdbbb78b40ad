//! Record codecs for kafka-messaging.
//!
//! Keys and values are encoded independently. A registered schema selects
//! AVRO, PROTOBUF or JSON_SCHEMA with Confluent framing; everything else is RAW.

pub mod avro;
pub mod codec;
pub mod error;
pub mod format;
pub mod framing;
pub mod json_schema;
pub mod proto;
pub mod raw;
pub mod record;

pub use codec::{CodecTable, FormatCodec};
pub use error::{CodecError, Result};
pub use format::{DecodedField, FormatTag};
pub use record::RecordCodec;
