//! Schema descriptors and their parsed forms.

use crate::error::{ProtoError, RegistryError, SchemaError};
use crate::proto::ProtoSchema;
use crate::registry::RegisteredSchema;
use jsonschema::Validator;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Schema formats a registry can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaFormat {
    Avro,
    Protobuf,
    JsonSchema,
}

impl SchemaFormat {
    /// The `schemaType` value used by the Confluent REST API.
    pub fn registry_name(&self) -> &'static str {
        match self {
            SchemaFormat::Avro => "AVRO",
            SchemaFormat::Protobuf => "PROTOBUF",
            SchemaFormat::JsonSchema => "JSON",
        }
    }

    /// Parses a `schemaType` value. A missing type means AVRO.
    pub fn from_registry_name(name: Option<&str>) -> Result<Self, RegistryError> {
        match name {
            None | Some("AVRO") => Ok(SchemaFormat::Avro),
            Some("PROTOBUF") => Ok(SchemaFormat::Protobuf),
            Some("JSON") => Ok(SchemaFormat::JsonSchema),
            Some(other) => Err(RegistryError::UnknownSchemaType(other.to_string())),
        }
    }
}

impl fmt::Display for SchemaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaFormat::Avro => write!(f, "AVRO"),
            SchemaFormat::Protobuf => write!(f, "PROTOBUF"),
            SchemaFormat::JsonSchema => write!(f, "JSON_SCHEMA"),
        }
    }
}

/// A registered schema, fetched once and shared by every codec call in a session.
#[derive(Debug, Clone)]
pub struct SchemaDescriptor {
    pub subject: String,
    /// Subject version. Zero when the schema was resolved by id only.
    pub version: i32,
    pub id: i32,
    pub format: SchemaFormat,
    pub raw: String,
    pub parsed: ParsedSchema,
}

impl SchemaDescriptor {
    pub fn from_registered(
        subject: &str,
        registered: RegisteredSchema,
    ) -> Result<Self, SchemaError> {
        let parsed = ParsedSchema::parse(registered.schema_type, &registered.schema).map_err(
            |reason| SchemaError::InvalidSchema {
                subject: subject.to_string(),
                format: registered.schema_type,
                reason,
            },
        )?;

        Ok(SchemaDescriptor {
            subject: registered.subject.unwrap_or_else(|| subject.to_string()),
            version: registered.version.unwrap_or(0),
            id: registered.id,
            format: registered.schema_type,
            raw: registered.schema,
            parsed,
        })
    }
}

/// Parsed schema, ready for encoding and decoding.
#[derive(Debug, Clone)]
pub enum ParsedSchema {
    Avro(apache_avro::Schema),
    Protobuf(ProtoSchema),
    JsonSchema(JsonSchemaDefinition),
}

impl ParsedSchema {
    pub fn parse(format: SchemaFormat, text: &str) -> Result<Self, String> {
        match format {
            SchemaFormat::Avro => apache_avro::Schema::parse_str(text)
                .map(ParsedSchema::Avro)
                .map_err(|e| e.to_string()),
            SchemaFormat::Protobuf => {
                let schema = ProtoSchema::from_string(text).map_err(|e| e.to_string())?;
                if schema.root_message().is_none() {
                    return Err(ProtoError::MessageTypeNotFound(
                        "schema declares no top-level message".to_string(),
                    )
                    .to_string());
                }
                Ok(ParsedSchema::Protobuf(schema))
            }
            SchemaFormat::JsonSchema => JsonSchemaDefinition::parse(text).map(ParsedSchema::JsonSchema),
        }
    }
}

/// A JSON Schema document together with its compiled validator.
#[derive(Clone)]
pub struct JsonSchemaDefinition {
    pub document: Value,
    validator: Arc<Validator>,
}

impl JsonSchemaDefinition {
    pub fn parse(text: &str) -> Result<Self, String> {
        let document: Value =
            serde_json::from_str(text).map_err(|e| format!("Invalid JSON: {e}"))?;
        let validator =
            Validator::new(&document).map_err(|e| format!("Invalid JSON Schema: {e}"))?;
        Ok(JsonSchemaDefinition {
            document,
            validator: Arc::new(validator),
        })
    }

    /// Returns every validation failure, not just the first.
    pub fn validate(&self, instance: &Value) -> Result<(), Vec<String>> {
        let errors: Vec<String> = self
            .validator
            .iter_errors(instance)
            .map(|e| e.to_string())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl fmt::Debug for JsonSchemaDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchemaDefinition")
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}
