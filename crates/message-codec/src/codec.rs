use crate::avro::AvroCodec;
use crate::error::Result;
use crate::format::FormatTag;
use crate::json_schema::JsonSchemaCodec;
use crate::proto::ProtobufCodec;
use crate::raw::RawCodec;
use schema_resolver::SchemaDescriptor;
use std::collections::HashMap;
use std::sync::Arc;

/// Converts between caller text and one wire format.
///
/// Codecs work on the body only; schema framing is added and stripped by
/// [`crate::RecordCodec`].
pub trait FormatCodec: Send + Sync {
    fn format(&self) -> FormatTag;

    fn encode(&self, text: &str, schema: Option<&SchemaDescriptor>) -> Result<Vec<u8>>;

    fn decode(&self, body: &[u8], schema: Option<&SchemaDescriptor>) -> Result<String>;
}

/// Codec lookup table keyed by [`FormatTag`].
#[derive(Clone)]
pub struct CodecTable {
    codecs: HashMap<FormatTag, Arc<dyn FormatCodec>>,
}

impl CodecTable {
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    pub fn register(&mut self, codec: Arc<dyn FormatCodec>) {
        self.codecs.insert(codec.format(), codec);
    }

    pub fn get(&self, format: FormatTag) -> Option<&Arc<dyn FormatCodec>> {
        self.codecs.get(&format)
    }
}

impl Default for CodecTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.register(Arc::new(RawCodec));
        table.register(Arc::new(AvroCodec));
        table.register(Arc::new(ProtobufCodec));
        table.register(Arc::new(JsonSchemaCodec));
        table
    }
}
