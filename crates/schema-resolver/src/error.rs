//! Error types for the schema-resolver crate.

use crate::descriptor::SchemaFormat;
use thiserror::Error;

/// Errors surfaced by [`crate::SchemaResolver`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// The subject is not registered, or the registry could not be reached.
    #[error("Schema not found for subject '{subject}': {reason}")]
    NotFound { subject: String, reason: String },

    #[error("Schema id {id} not found: {reason}")]
    IdNotFound { id: i32, reason: String },

    /// The registry returned a schema that does not parse.
    #[error("Invalid {format} schema for subject '{subject}': {reason}")]
    InvalidSchema {
        subject: String,
        format: SchemaFormat,
        reason: String,
    },
}

impl SchemaError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SchemaError::NotFound { .. } | SchemaError::IdNotFound { .. }
        )
    }
}

/// Errors from a [`crate::SchemaRegistry`] implementation.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Schema registry request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Schema registry returned HTTP {status} for {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Unexpected schema registry response from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    #[error("Unknown schema type: {0}")]
    UnknownSchemaType(String),

    #[error("Schema rejected by registry: {0}")]
    Rejected(String),

    #[error("No schema registry configured")]
    NotConfigured,
}

/// Errors from the runtime `.proto` parser.
#[derive(Error, Debug)]
pub enum ProtoError {
    #[error("Protobuf parse error: {0}")]
    Parse(String),

    #[error("Message type not found: {0}")]
    MessageTypeNotFound(String),
}
