//! Avro binary datum encoding driven by JSON text.

use crate::codec::FormatCodec;
use crate::error::{CodecError, Result};
use crate::format::FormatTag;
use apache_avro::types::Value as AvroValue;
use apache_avro::Schema;
use schema_resolver::{ParsedSchema, SchemaDescriptor};
use serde_json::Value;

#[derive(Debug, Default, Clone, Copy)]
pub struct AvroCodec;

fn avro_schema(descriptor: &SchemaDescriptor) -> Option<&Schema> {
    match &descriptor.parsed {
        ParsedSchema::Avro(schema) => Some(schema),
        _ => None,
    }
}

fn child(at: &str, key: &str) -> String {
    if at.is_empty() {
        key.to_string()
    } else {
        format!("{at}.{key}")
    }
}

/// Catches what resolution would let through: record fields the schema does
/// not declare are dropped, and integers bound to a 32-bit type are narrowed.
fn check_payload(json: &Value, schema: &Schema, at: &str) -> std::result::Result<(), String> {
    match (schema, json) {
        (Schema::Record(record), Value::Object(object)) => {
            for (key, value) in object {
                let field = record
                    .fields
                    .iter()
                    .find(|f| &f.name == key)
                    .ok_or_else(|| format!("unknown field '{}'", child(at, key)))?;
                check_payload(value, &field.schema, &child(at, key))?;
            }
            Ok(())
        }
        (Schema::Int | Schema::Date | Schema::TimeMillis, Value::Number(number)) => {
            let fits = number.as_i64().is_some_and(|n| i32::try_from(n).is_ok())
                || number.is_f64();
            if fits {
                Ok(())
            } else {
                Err(format!("'{at}' value {number} is out of range for int"))
            }
        }
        (
            Schema::Long
            | Schema::TimeMicros
            | Schema::TimestampMillis
            | Schema::TimestampMicros
            | Schema::TimestampNanos
            | Schema::LocalTimestampMillis
            | Schema::LocalTimestampMicros
            | Schema::LocalTimestampNanos,
            Value::Number(number),
        ) => {
            if number.is_i64() || number.is_f64() {
                Ok(())
            } else {
                Err(format!("'{at}' value {number} is out of range for long"))
            }
        }
        (Schema::Array(array), Value::Array(items)) => items
            .iter()
            .enumerate()
            .try_for_each(|(i, item)| check_payload(item, &array.items, &format!("{at}[{i}]"))),
        (Schema::Map(map), Value::Object(object)) => object
            .iter()
            .try_for_each(|(key, value)| check_payload(value, &map.types, &child(at, key))),
        (Schema::Union(union), _) => {
            let mut failure = None;
            for variant in union.variants().iter().filter(|v| admits(v, json)) {
                match check_payload(json, variant, at) {
                    Ok(()) => return Ok(()),
                    Err(reason) => {
                        failure.get_or_insert(reason);
                    }
                }
            }
            failure.map_or(Ok(()), Err)
        }
        _ => Ok(()),
    }
}

/// Whether a union branch could take this JSON value at all.
fn admits(schema: &Schema, json: &Value) -> bool {
    match json {
        Value::Null => matches!(schema, Schema::Null),
        Value::Bool(_) => matches!(schema, Schema::Boolean),
        Value::Number(_) => !matches!(
            schema,
            Schema::Null
                | Schema::Boolean
                | Schema::String
                | Schema::Bytes
                | Schema::Uuid
                | Schema::Enum(_)
                | Schema::Fixed(_)
                | Schema::Array(_)
                | Schema::Map(_)
                | Schema::Record(_)
        ),
        Value::String(_) => matches!(
            schema,
            Schema::String | Schema::Bytes | Schema::Uuid | Schema::Enum(_) | Schema::Fixed(_)
        ),
        Value::Array(_) => matches!(schema, Schema::Array(_)),
        Value::Object(_) => {
            matches!(schema, Schema::Record(_) | Schema::Map(_) | Schema::Ref { .. })
        }
    }
}

impl FormatCodec for AvroCodec {
    fn format(&self) -> FormatTag {
        FormatTag::Avro
    }

    fn encode(&self, text: &str, schema: Option<&SchemaDescriptor>) -> Result<Vec<u8>> {
        let descriptor = schema.ok_or_else(|| CodecError::InvalidPayloadForSchema {
            subject: String::new(),
            format: FormatTag::Avro,
            reason: "no Avro schema supplied".to_string(),
        })?;
        let invalid = |reason: String| CodecError::InvalidPayloadForSchema {
            subject: descriptor.subject.clone(),
            format: FormatTag::Avro,
            reason,
        };
        let avro = avro_schema(descriptor)
            .ok_or_else(|| invalid(format!("schema is {}, not AVRO", descriptor.format)))?;

        let json: Value =
            serde_json::from_str(text).map_err(|e| invalid(format!("invalid JSON: {e}")))?;
        check_payload(&json, avro, "").map_err(invalid)?;

        let value = AvroValue::from(json)
            .resolve(avro)
            .map_err(|e| invalid(e.to_string()))?;

        apache_avro::to_avro_datum(avro, value).map_err(|e| invalid(e.to_string()))
    }

    fn decode(&self, body: &[u8], schema: Option<&SchemaDescriptor>) -> Result<String> {
        let avro = schema
            .and_then(avro_schema)
            .ok_or_else(|| CodecError::decode(FormatTag::Avro, "no Avro schema supplied"))?;

        let mut reader = body;
        let value = apache_avro::from_avro_datum(avro, &mut reader, None)
            .map_err(|e| CodecError::decode(FormatTag::Avro, e.to_string()))?;
        if !reader.is_empty() {
            return Err(CodecError::decode(
                FormatTag::Avro,
                format!("{} trailing bytes after datum", reader.len()),
            ));
        }

        let json = Value::try_from(value)
            .map_err(|e| CodecError::decode(FormatTag::Avro, e.to_string()))?;
        serde_json::to_string(&json).map_err(|e| CodecError::decode(FormatTag::Avro, e.to_string()))
    }
}
