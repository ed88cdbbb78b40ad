//! Schema Registry access for kafka-messaging.
//!
//! This crate provides:
//! - The [`SchemaRegistry`] collaborator trait with HTTP, in-memory and
//!   no-op implementations
//! - [`SchemaDescriptor`] and the parsed schema forms (Avro, Protobuf, JSON Schema)
//! - A runtime `.proto` parser built on `protobuf-parse`
//! - [`SchemaResolver`], the single-flight cache the codecs read from

pub mod descriptor;
pub mod error;
pub mod http;
pub mod memory;
pub mod proto;
pub mod registry;
pub mod resolver;

pub use descriptor::{JsonSchemaDefinition, ParsedSchema, SchemaDescriptor, SchemaFormat};
pub use error::{ProtoError, RegistryError, SchemaError};
pub use http::{HttpRegistryConfig, HttpSchemaRegistry};
pub use memory::InMemorySchemaRegistry;
pub use proto::{
    ProtoEnumDescriptor, ProtoFieldDescriptor, ProtoMessageDescriptor, ProtoSchema, ProtoType,
};
pub use registry::{NoSchemaRegistry, RegisteredSchema, SchemaRegistry, SubjectVersion};
pub use resolver::{key_subject, value_subject, SchemaResolver, TopicSchemas};
