//! Protobuf codec over runtime-parsed `.proto` schemas.
//!
//! Encoding always targets the first top-level message of the schema, as the
//! Confluent serializer does by default; decoding follows the message-index
//! list carried in the body.

mod decoder;
mod encoder;

use crate::codec::FormatCodec;
use crate::error::{CodecError, Result};
use crate::format::FormatTag;
use crate::framing::{read_message_indexes, write_message_indexes};
use decoder::ProtoDecoder;
use encoder::ProtoEncoder;
use protobuf::CodedInputStream;
use schema_resolver::{ParsedSchema, ProtoSchema, SchemaDescriptor};
use serde_json::Value;

#[derive(Debug, Default, Clone, Copy)]
pub struct ProtobufCodec;

fn proto_schema(descriptor: &SchemaDescriptor) -> Option<&ProtoSchema> {
    match &descriptor.parsed {
        ParsedSchema::Protobuf(schema) => Some(schema),
        _ => None,
    }
}

impl FormatCodec for ProtobufCodec {
    fn format(&self) -> FormatTag {
        FormatTag::Protobuf
    }

    fn encode(&self, text: &str, schema: Option<&SchemaDescriptor>) -> Result<Vec<u8>> {
        let descriptor = schema.ok_or_else(|| CodecError::InvalidPayloadForSchema {
            subject: String::new(),
            format: FormatTag::Protobuf,
            reason: "no Protobuf schema supplied".to_string(),
        })?;
        let invalid = |reason: String| CodecError::InvalidPayloadForSchema {
            subject: descriptor.subject.clone(),
            format: FormatTag::Protobuf,
            reason,
        };
        let proto = proto_schema(descriptor)
            .ok_or_else(|| invalid(format!("schema is {}, not PROTOBUF", descriptor.format)))?;
        let root = proto
            .root_message()
            .ok_or_else(|| invalid("schema declares no message".to_string()))?;

        let json: Value =
            serde_json::from_str(text).map_err(|e| invalid(format!("invalid JSON: {e}")))?;
        let message = ProtoEncoder::new(proto)
            .encode_message(root, &json, "")
            .map_err(invalid)?;

        let mut body = Vec::with_capacity(message.len() + 1);
        write_message_indexes(&[0], &mut body).map_err(invalid)?;
        body.extend_from_slice(&message);
        Ok(body)
    }

    fn decode(&self, body: &[u8], schema: Option<&SchemaDescriptor>) -> Result<String> {
        let fail = |reason: String| CodecError::decode(FormatTag::Protobuf, reason);
        let proto = schema
            .and_then(proto_schema)
            .ok_or_else(|| fail("no Protobuf schema supplied".to_string()))?;

        let (indexes, message) = read_message_indexes(body).map_err(fail)?;
        let descriptor = proto
            .message_by_indexes(&indexes)
            .ok_or_else(|| fail(format!("no message at index path {indexes:?}")))?;

        let mut stream = CodedInputStream::from_bytes(message);
        let json = ProtoDecoder::new(proto)
            .decode_message(descriptor, &mut stream)
            .map_err(fail)?;
        serde_json::to_string(&json).map_err(|e| fail(e.to_string()))
    }
}
