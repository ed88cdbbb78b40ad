//! Runtime protobuf decoder.
//!
//! Decodes proto3 binary into JSON using a parsed schema. Output follows the
//! proto3 JSON mapping with proto field names: scalars that were not set are
//! printed with their default value, unknown fields are skipped.

use super::encoder::wire_type;
use base64::Engine;
use protobuf::CodedInputStream;
use schema_resolver::{ProtoFieldDescriptor, ProtoMessageDescriptor, ProtoSchema, ProtoType};
use serde_json::{Map, Number, Value};
use std::cell::Cell;
use std::collections::HashMap;

/// Deepest message nesting accepted, matching protobuf's default recursion limit.
pub(crate) const MAX_NESTING_DEPTH: usize = 100;

type DecodeResult<T> = std::result::Result<T, String>;

fn read_error(e: protobuf::Error) -> String {
    format!("protobuf read failed: {e}")
}

pub(crate) struct ProtoDecoder<'a> {
    schema: &'a ProtoSchema,
    depth: Cell<usize>,
}

impl<'a> ProtoDecoder<'a> {
    pub(crate) fn new(schema: &'a ProtoSchema) -> Self {
        Self {
            schema,
            depth: Cell::new(0),
        }
    }

    pub(crate) fn decode_message(
        &self,
        descriptor: &ProtoMessageDescriptor,
        stream: &mut CodedInputStream,
    ) -> DecodeResult<Value> {
        let mut singles: HashMap<u32, Value> = HashMap::new();
        let mut repeated: HashMap<u32, Vec<Value>> = HashMap::new();
        let mut maps: HashMap<u32, Map<String, Value>> = HashMap::new();

        loop {
            if stream.eof().map_err(read_error)? {
                break;
            }

            let tag = stream.read_raw_varint32().map_err(read_error)?;
            let field_number = tag >> 3;
            let wire = tag & 0x7;
            if field_number == 0 {
                return Err(format!("invalid field number 0 in message {}", descriptor.name));
            }

            let Some(field) = descriptor.field_by_number(field_number) else {
                skip_field(stream, wire)?;
                continue;
            };

            let packed = field.is_repeated && field.field_type.is_packable() && wire == 2;
            if wire != wire_type(&field.field_type) && !packed {
                return Err(format!(
                    "field '{}' of {} has wire type {wire}, expected {}",
                    field.name,
                    descriptor.name,
                    wire_type(&field.field_type)
                ));
            }

            if !field.is_repeated {
                singles.insert(field_number, self.read_value(stream, &field.field_type)?);
            } else if let Some(entry) = self.map_entry(field) {
                let (key, value) = self.read_map_entry(stream, entry)?;
                maps.entry(field_number).or_default().insert(key, value);
            } else if packed {
                let values = repeated.entry(field_number).or_default();
                let len = stream.read_raw_varint32().map_err(read_error)?;
                let old_limit = stream.push_limit(len as u64).map_err(read_error)?;
                while !stream.eof().map_err(read_error)? {
                    values.push(self.read_value(stream, &field.field_type)?);
                }
                stream.pop_limit(old_limit);
            } else {
                let value = self.read_value(stream, &field.field_type)?;
                repeated.entry(field_number).or_default().push(value);
            }
        }

        let mut object = Map::new();
        for field in &descriptor.fields {
            let value = if field.is_repeated {
                if self.map_entry(field).is_some() {
                    Value::Object(maps.remove(&field.number).unwrap_or_default())
                } else {
                    Value::Array(repeated.remove(&field.number).unwrap_or_default())
                }
            } else {
                match singles.remove(&field.number) {
                    Some(value) => value,
                    None if field.has_presence => continue,
                    None => match self.default_value(&field.field_type) {
                        Some(value) => value,
                        None => continue,
                    },
                }
            };
            object.insert(field.name.clone(), value);
        }

        Ok(Value::Object(object))
    }

    fn map_entry(&self, field: &ProtoFieldDescriptor) -> Option<&'a ProtoMessageDescriptor> {
        match &field.field_type {
            ProtoType::Message(name) => self.schema.get_message(name).filter(|m| m.is_map_entry),
            _ => None,
        }
    }

    fn read_nested(
        &self,
        stream: &mut CodedInputStream,
        descriptor: &ProtoMessageDescriptor,
    ) -> DecodeResult<Value> {
        let depth = self.depth.get() + 1;
        if depth > MAX_NESTING_DEPTH {
            return Err(format!(
                "message {} is nested deeper than {MAX_NESTING_DEPTH} levels",
                descriptor.name
            ));
        }

        let len = stream.read_raw_varint32().map_err(read_error)?;
        let old_limit = stream.push_limit(len as u64).map_err(read_error)?;
        self.depth.set(depth);
        let value = self.decode_message(descriptor, stream);
        self.depth.set(depth - 1);
        stream.pop_limit(old_limit);
        value
    }

    fn read_map_entry(
        &self,
        stream: &mut CodedInputStream,
        entry: &ProtoMessageDescriptor,
    ) -> DecodeResult<(String, Value)> {
        let Value::Object(mut fields) = self.read_nested(stream, entry)? else {
            return Err(format!("map entry {} did not decode to an object", entry.name));
        };
        let key = match fields.remove("key") {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let value = fields
            .remove("value")
            .unwrap_or_else(|| Value::Object(Map::new()));
        Ok((key, value))
    }

    fn read_value(
        &self,
        stream: &mut CodedInputStream,
        field_type: &ProtoType,
    ) -> DecodeResult<Value> {
        Ok(match field_type {
            ProtoType::Double => float_value(stream.read_double().map_err(read_error)?),
            ProtoType::Float => float_value(stream.read_float().map_err(read_error)? as f64),
            ProtoType::Int32 => Value::from(stream.read_int32().map_err(read_error)?),
            ProtoType::Sint32 => Value::from(stream.read_sint32().map_err(read_error)?),
            ProtoType::Sfixed32 => Value::from(stream.read_sfixed32().map_err(read_error)?),
            ProtoType::Int64 => Value::from(stream.read_int64().map_err(read_error)?),
            ProtoType::Sint64 => Value::from(stream.read_sint64().map_err(read_error)?),
            ProtoType::Sfixed64 => Value::from(stream.read_sfixed64().map_err(read_error)?),
            ProtoType::Uint32 => Value::from(stream.read_uint32().map_err(read_error)?),
            ProtoType::Fixed32 => Value::from(stream.read_fixed32().map_err(read_error)?),
            ProtoType::Uint64 => Value::from(stream.read_uint64().map_err(read_error)?),
            ProtoType::Fixed64 => Value::from(stream.read_fixed64().map_err(read_error)?),
            ProtoType::Bool => Value::Bool(stream.read_bool().map_err(read_error)?),
            ProtoType::String => Value::String(stream.read_string().map_err(read_error)?),
            ProtoType::Bytes => {
                let bytes = stream.read_bytes().map_err(read_error)?;
                Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            ProtoType::Enum(name) => {
                let number = stream.read_int32().map_err(read_error)?;
                self.schema
                    .get_enum(name)
                    .and_then(|e| e.name_of(number))
                    .map(|n| Value::String(n.to_string()))
                    .unwrap_or_else(|| Value::from(number))
            }
            ProtoType::Message(name) => {
                let nested = self
                    .schema
                    .get_message(name)
                    .ok_or_else(|| format!("message type {name} not found"))?;
                self.read_nested(stream, nested)?
            }
        })
    }

    /// proto3 default for an unset singular field; `None` for messages.
    fn default_value(&self, field_type: &ProtoType) -> Option<Value> {
        Some(match field_type {
            ProtoType::Double | ProtoType::Float => Value::from(0.0),
            ProtoType::Bool => Value::Bool(false),
            ProtoType::String | ProtoType::Bytes => Value::String(String::new()),
            ProtoType::Enum(name) => self
                .schema
                .get_enum(name)
                .and_then(|e| e.default_name())
                .map(|n| Value::String(n.to_string()))
                .unwrap_or_else(|| Value::from(0)),
            ProtoType::Message(_) => return None,
            _ => Value::from(0),
        })
    }
}

fn float_value(value: f64) -> Value {
    match Number::from_f64(value) {
        Some(n) => Value::Number(n),
        None if value.is_nan() => Value::String("NaN".to_string()),
        None if value > 0.0 => Value::String("Infinity".to_string()),
        None => Value::String("-Infinity".to_string()),
    }
}

fn skip_field(stream: &mut CodedInputStream, wire: u32) -> DecodeResult<()> {
    match wire {
        0 => {
            stream.read_raw_varint64().map_err(read_error)?;
        }
        1 => {
            stream.read_raw_little_endian64().map_err(read_error)?;
        }
        2 => {
            let len = stream.read_raw_varint32().map_err(read_error)?;
            stream.read_raw_bytes(len).map_err(read_error)?;
        }
        5 => {
            stream.read_raw_little_endian32().map_err(read_error)?;
        }
        other => return Err(format!("unsupported wire type {other}")),
    }
    Ok(())
}
