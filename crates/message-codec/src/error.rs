//! Error types for the message-codec crate.

use crate::format::FormatTag;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    /// The payload is not valid JSON, or does not match the schema.
    #[error("Payload is not valid for {format} schema '{subject}': {reason}")]
    InvalidPayloadForSchema {
        subject: String,
        format: FormatTag,
        reason: String,
    },

    #[error("Failed to decode {format} payload: {reason}")]
    Decode { format: FormatTag, reason: String },
}

impl CodecError {
    pub fn decode(format: FormatTag, reason: impl Into<String>) -> Self {
        CodecError::Decode {
            format,
            reason: reason.into(),
        }
    }
}

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
