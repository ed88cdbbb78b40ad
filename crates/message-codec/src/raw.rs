use crate::codec::FormatCodec;
use crate::error::Result;
use crate::format::FormatTag;
use schema_resolver::SchemaDescriptor;

/// Identity codec for payloads without a registered schema.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawCodec;

impl FormatCodec for RawCodec {
    fn format(&self) -> FormatTag {
        FormatTag::Raw
    }

    fn encode(&self, text: &str, _schema: Option<&SchemaDescriptor>) -> Result<Vec<u8>> {
        Ok(text.as_bytes().to_vec())
    }

    fn decode(&self, body: &[u8], _schema: Option<&SchemaDescriptor>) -> Result<String> {
        Ok(String::from_utf8_lossy(body).into_owned())
    }
}
