//! JSON → proto3 binary, driven by a runtime [`ProtoSchema`].
//!
//! Follows the proto3 wire format:
//! - Each field is written as (tag, value) with tag = (field_number << 3) | wire_type
//! - Wire types: 0=varint, 1=64-bit, 2=length-delimited, 5=32-bit
//! - Repeated scalars are packed into one length-delimited field
//! - Fields holding their default value are omitted unless declared `optional`

use base64::Engine;
use protobuf::CodedOutputStream;
use schema_resolver::{ProtoFieldDescriptor, ProtoMessageDescriptor, ProtoSchema, ProtoType};
use serde_json::{Map, Value};

type EncodeResult<T> = std::result::Result<T, String>;

pub(crate) struct ProtoEncoder<'a> {
    schema: &'a ProtoSchema,
}

fn io_error(e: protobuf::Error) -> String {
    format!("protobuf write failed: {e}")
}

pub(crate) fn wire_type(field_type: &ProtoType) -> u32 {
    match field_type {
        ProtoType::Double | ProtoType::Fixed64 | ProtoType::Sfixed64 => 1,
        ProtoType::Float | ProtoType::Fixed32 | ProtoType::Sfixed32 => 5,
        ProtoType::String | ProtoType::Bytes | ProtoType::Message(_) => 2,
        _ => 0,
    }
}

impl<'a> ProtoEncoder<'a> {
    pub(crate) fn new(schema: &'a ProtoSchema) -> Self {
        Self { schema }
    }

    /// Encodes a JSON object as the given message.
    pub(crate) fn encode_message(
        &self,
        descriptor: &ProtoMessageDescriptor,
        value: &Value,
        path: &str,
    ) -> EncodeResult<Vec<u8>> {
        let object = value.as_object().ok_or_else(|| {
            format!(
                "{}: expected an object for message {}, got {}",
                display_path(path),
                descriptor.name,
                json_kind(value)
            )
        })?;

        if let Some(unknown) = object
            .keys()
            .find(|key| descriptor.get_json_field(key).is_none())
        {
            return Err(format!(
                "{}: unknown field '{unknown}' for message {}",
                display_path(path),
                descriptor.name
            ));
        }

        let mut buffer = Vec::new();
        {
            let mut stream = CodedOutputStream::vec(&mut buffer);
            for field in &descriptor.fields {
                let value = object
                    .get(&field.name)
                    .or_else(|| object.get(&field.json_name));
                match value {
                    None | Some(Value::Null) => {}
                    Some(value) => {
                        let field_path = join_path(path, &field.name);
                        self.write_field(&mut stream, field, value, &field_path)?
                    }
                }
            }
            stream.flush().map_err(io_error)?;
        }
        Ok(buffer)
    }

    fn write_field(
        &self,
        stream: &mut CodedOutputStream,
        field: &ProtoFieldDescriptor,
        value: &Value,
        path: &str,
    ) -> EncodeResult<()> {
        if !field.is_repeated {
            if !field.has_presence && self.is_default(&field.field_type, value) {
                return Ok(());
            }
            return self.write_tagged(stream, field.number, &field.field_type, value, path);
        }

        if let Some(entry) = self.map_entry(field) {
            return self.write_map(stream, field.number, entry, value, path);
        }

        let items = value
            .as_array()
            .ok_or_else(|| format!("{path}: expected an array, got {}", json_kind(value)))?;

        if field.field_type.is_packable() {
            if items.is_empty() {
                return Ok(());
            }
            let mut packed = Vec::new();
            {
                let mut packed_stream = CodedOutputStream::vec(&mut packed);
                for (i, item) in items.iter().enumerate() {
                    self.write_value(
                        &mut packed_stream,
                        &field.field_type,
                        item,
                        &format!("{path}[{i}]"),
                    )?;
                }
                packed_stream.flush().map_err(io_error)?;
            }
            stream
                .write_bytes(field.number, &packed)
                .map_err(io_error)?;
        } else {
            for (i, item) in items.iter().enumerate() {
                self.write_tagged(
                    stream,
                    field.number,
                    &field.field_type,
                    item,
                    &format!("{path}[{i}]"),
                )?;
            }
        }
        Ok(())
    }

    fn map_entry(&self, field: &ProtoFieldDescriptor) -> Option<&'a ProtoMessageDescriptor> {
        match &field.field_type {
            ProtoType::Message(name) => self.schema.get_message(name).filter(|m| m.is_map_entry),
            _ => None,
        }
    }

    fn write_map(
        &self,
        stream: &mut CodedOutputStream,
        number: u32,
        entry: &ProtoMessageDescriptor,
        value: &Value,
        path: &str,
    ) -> EncodeResult<()> {
        let object = value
            .as_object()
            .ok_or_else(|| format!("{path}: expected an object for map, got {}", json_kind(value)))?;
        let key_type = entry
            .field_by_number(1)
            .map(|f| f.field_type.clone())
            .ok_or_else(|| format!("{path}: map entry {} has no key field", entry.name))?;

        for (key, item) in object {
            let key_value = match key_type {
                ProtoType::Bool => match key.as_str() {
                    "true" => Value::Bool(true),
                    "false" => Value::Bool(false),
                    other => return Err(format!("{path}: invalid bool map key '{other}'")),
                },
                _ => Value::String(key.clone()),
            };
            let mut entry_json = Map::new();
            entry_json.insert("key".to_string(), key_value);
            entry_json.insert("value".to_string(), item.clone());

            let bytes =
                self.encode_message(entry, &Value::Object(entry_json), &format!("{path}.{key}"))?;
            stream.write_bytes(number, &bytes).map_err(io_error)?;
        }
        Ok(())
    }

    fn write_tagged(
        &self,
        stream: &mut CodedOutputStream,
        number: u32,
        field_type: &ProtoType,
        value: &Value,
        path: &str,
    ) -> EncodeResult<()> {
        stream
            .write_raw_varint32((number << 3) | wire_type(field_type))
            .map_err(io_error)?;
        self.write_value(stream, field_type, value, path)
    }

    fn write_value(
        &self,
        stream: &mut CodedOutputStream,
        field_type: &ProtoType,
        value: &Value,
        path: &str,
    ) -> EncodeResult<()> {
        let mismatch = || {
            format!(
                "{path}: expected {}, got {}",
                field_type.type_name(),
                json_kind(value)
            )
        };

        let written = match field_type {
            ProtoType::Double => stream.write_double_no_tag(as_f64(value).ok_or_else(mismatch)?),
            ProtoType::Float => {
                stream.write_float_no_tag(as_f64(value).ok_or_else(mismatch)? as f32)
            }
            ProtoType::Int32 => stream.write_int32_no_tag(as_i32(value).ok_or_else(mismatch)?),
            ProtoType::Sint32 => stream.write_sint32_no_tag(as_i32(value).ok_or_else(mismatch)?),
            ProtoType::Sfixed32 => {
                stream.write_sfixed32_no_tag(as_i32(value).ok_or_else(mismatch)?)
            }
            ProtoType::Int64 => stream.write_int64_no_tag(as_i64(value).ok_or_else(mismatch)?),
            ProtoType::Sint64 => stream.write_sint64_no_tag(as_i64(value).ok_or_else(mismatch)?),
            ProtoType::Sfixed64 => {
                stream.write_sfixed64_no_tag(as_i64(value).ok_or_else(mismatch)?)
            }
            ProtoType::Uint32 => stream.write_uint32_no_tag(as_u32(value).ok_or_else(mismatch)?),
            ProtoType::Fixed32 => {
                stream.write_fixed32_no_tag(as_u32(value).ok_or_else(mismatch)?)
            }
            ProtoType::Uint64 => stream.write_uint64_no_tag(as_u64(value).ok_or_else(mismatch)?),
            ProtoType::Fixed64 => {
                stream.write_fixed64_no_tag(as_u64(value).ok_or_else(mismatch)?)
            }
            ProtoType::Bool => stream.write_bool_no_tag(value.as_bool().ok_or_else(mismatch)?),
            ProtoType::String => stream.write_string_no_tag(value.as_str().ok_or_else(mismatch)?),
            ProtoType::Bytes => {
                let text = value.as_str().ok_or_else(mismatch)?;
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(text)
                    .map_err(|e| format!("{path}: invalid base64: {e}"))?;
                stream.write_bytes_no_tag(&bytes)
            }
            ProtoType::Enum(name) => {
                let number = self.enum_number(name, value).ok_or_else(|| {
                    format!("{path}: {value} is not a value of enum {name}")
                })?;
                stream.write_enum_no_tag(number)
            }
            ProtoType::Message(name) => {
                let nested = self
                    .schema
                    .get_message(name)
                    .ok_or_else(|| format!("{path}: message type {name} not found"))?;
                let bytes = self.encode_message(nested, value, path)?;
                stream.write_bytes_no_tag(&bytes)
            }
        };
        written.map_err(io_error)
    }

    fn enum_number(&self, name: &str, value: &Value) -> Option<i32> {
        let descriptor = self.schema.get_enum(name)?;
        match value {
            Value::String(s) => descriptor.number_of(s),
            Value::Number(_) => as_i32(value),
            _ => None,
        }
    }

    fn is_default(&self, field_type: &ProtoType, value: &Value) -> bool {
        match (field_type, value) {
            (ProtoType::Message(_), _) => false,
            (ProtoType::Enum(name), _) => self.enum_number(name, value) == Some(0),
            (ProtoType::Bool, Value::Bool(b)) => !b,
            (ProtoType::String | ProtoType::Bytes, Value::String(s)) => s.is_empty(),
            (ProtoType::Bool | ProtoType::String | ProtoType::Bytes, _) => false,
            (_, Value::Number(n)) => n.as_f64() == Some(0.0),
            _ => false,
        }
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn as_i32(value: &Value) -> Option<i32> {
    as_i64(value).and_then(|n| i32::try_from(n).ok())
}

fn as_u32(value: &Value) -> Option<u32> {
    as_u64(value).and_then(|n| u32::try_from(n).ok())
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => match s.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            other => other.parse().ok(),
        },
        _ => None,
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn join_path(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{path}.{field}")
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "<root>"
    } else {
        path
    }
}
