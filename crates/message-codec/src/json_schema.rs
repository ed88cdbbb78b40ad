use crate::codec::FormatCodec;
use crate::error::{CodecError, Result};
use crate::format::FormatTag;
use schema_resolver::{ParsedSchema, SchemaDescriptor};
use serde_json::Value;

/// JSON payloads validated against a JSON Schema and written compactly.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSchemaCodec;

impl FormatCodec for JsonSchemaCodec {
    fn format(&self) -> FormatTag {
        FormatTag::JsonSchema
    }

    fn encode(&self, text: &str, schema: Option<&SchemaDescriptor>) -> Result<Vec<u8>> {
        let descriptor = schema.ok_or_else(|| CodecError::InvalidPayloadForSchema {
            subject: String::new(),
            format: FormatTag::JsonSchema,
            reason: "no JSON schema supplied".to_string(),
        })?;
        let invalid = |reason: String| CodecError::InvalidPayloadForSchema {
            subject: descriptor.subject.clone(),
            format: FormatTag::JsonSchema,
            reason,
        };
        let ParsedSchema::JsonSchema(definition) = &descriptor.parsed else {
            return Err(invalid(format!(
                "schema is {}, not JSON_SCHEMA",
                descriptor.format
            )));
        };

        let json: Value =
            serde_json::from_str(text).map_err(|e| invalid(format!("invalid JSON: {e}")))?;
        definition
            .validate(&json)
            .map_err(|errors| invalid(errors.join("; ")))?;

        serde_json::to_vec(&json).map_err(|e| invalid(e.to_string()))
    }

    fn decode(&self, body: &[u8], _schema: Option<&SchemaDescriptor>) -> Result<String> {
        let json: Value = serde_json::from_slice(body)
            .map_err(|e| CodecError::decode(FormatTag::JsonSchema, e.to_string()))?;
        serde_json::to_string(&json)
            .map_err(|e| CodecError::decode(FormatTag::JsonSchema, e.to_string()))
    }
}
