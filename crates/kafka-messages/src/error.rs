//! Error taxonomy for sending and polling.

use message_codec::CodecError;
use message_filter::FilterError;
use schema_resolver::SchemaError;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// Failures reported by a [`crate::Broker`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrokerError {
    #[error("Topic '{0}' not found")]
    TopicNotFound(String),

    #[error("Partition {partition} of topic '{topic}' not found")]
    PartitionNotFound { topic: String, partition: i32 },

    #[error("Kafka operation timed out: {0}")]
    Timeout(String),

    #[error("Kafka error: {0}")]
    Kafka(String),
}

/// Coarse classification of [`Error`], for callers that branch on failure type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    SchemaNotFound,
    InvalidSchema,
    InvalidPayloadForSchema,
    Decode,
    FilterCompile,
    FilterEval,
    Broker,
    InvalidPosition,
    Timeout,
    Cancelled,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A consumed record that could not be decoded. The session continues.
    #[error("Record at partition {partition}, offset {offset}: {error}")]
    RecordDecode {
        partition: i32,
        offset: i64,
        error: CodecError,
    },

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("Invalid consumer position: {0}")]
    InvalidPosition(String),

    #[error("Poll session cancelled")]
    Cancelled,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Schema(SchemaError::InvalidSchema { .. }) => ErrorKind::InvalidSchema,
            Error::Schema(_) => ErrorKind::SchemaNotFound,
            Error::Codec(CodecError::InvalidPayloadForSchema { .. }) => {
                ErrorKind::InvalidPayloadForSchema
            }
            Error::Codec(CodecError::Decode { .. }) | Error::RecordDecode { .. } => {
                ErrorKind::Decode
            }
            Error::Filter(FilterError::Compile { .. }) => ErrorKind::FilterCompile,
            Error::Filter(FilterError::Eval { .. }) => ErrorKind::FilterEval,
            Error::Broker(BrokerError::Timeout(_)) => ErrorKind::Timeout,
            Error::Broker(_) => ErrorKind::Broker,
            Error::InvalidPosition(_) => ErrorKind::InvalidPosition,
            Error::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Serialized as `{ "kind": ..., "message": ... }`.
impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Error", 2)?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
