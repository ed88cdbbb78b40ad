use crate::codec::CodecTable;
use crate::error::{CodecError, Result};
use crate::format::{DecodedField, FormatTag};
use crate::framing::{frame, unframe};
use schema_resolver::{SchemaDescriptor, SchemaResolver};
use std::sync::Arc;

/// Encodes and decodes record keys and values.
///
/// The format is chosen by the declared schema: a registered schema selects
/// its own format and the Confluent framing, no schema means RAW.
pub struct RecordCodec {
    codecs: CodecTable,
    resolver: Arc<SchemaResolver>,
}

impl RecordCodec {
    pub fn new(resolver: Arc<SchemaResolver>) -> Self {
        Self::with_table(resolver, CodecTable::default())
    }

    pub fn with_table(resolver: Arc<SchemaResolver>, codecs: CodecTable) -> Self {
        Self { codecs, resolver }
    }

    pub fn resolver(&self) -> &Arc<SchemaResolver> {
        &self.resolver
    }

    fn codec_for(&self, format: FormatTag) -> Result<&Arc<dyn crate::FormatCodec>> {
        self.codecs.get(format).ok_or_else(|| {
            CodecError::decode(format, format!("no codec registered for {format}"))
        })
    }

    /// Encodes caller text into wire bytes.
    pub fn encode(&self, text: &str, schema: Option<&SchemaDescriptor>) -> Result<Vec<u8>> {
        let Some(descriptor) = schema else {
            return self.codec_for(FormatTag::Raw)?.encode(text, None);
        };

        let format = FormatTag::from(descriptor.format);
        let body = self
            .codec_for(format)
            .map_err(|e| CodecError::InvalidPayloadForSchema {
                subject: descriptor.subject.clone(),
                format,
                reason: e.to_string(),
            })?
            .encode(text, Some(descriptor))?;
        tracing::trace!(
            subject = %descriptor.subject,
            schema_id = descriptor.id,
            %format,
            "Encoded payload"
        );
        Ok(frame(descriptor.id, &body))
    }

    /// Decodes wire bytes under the schema registered for the subject.
    ///
    /// When the payload names a schema id other than the declared one, that
    /// schema is fetched by id; it must have the same format.
    pub async fn decode(
        &self,
        bytes: &[u8],
        schema: Option<&Arc<SchemaDescriptor>>,
    ) -> Result<DecodedField> {
        let size = bytes.len() as i64;

        let Some(declared) = schema else {
            let value = self.codec_for(FormatTag::Raw)?.decode(bytes, None)?;
            return Ok(DecodedField {
                value,
                format: FormatTag::Raw,
                schema_id: None,
                size,
            });
        };

        let format = FormatTag::from(declared.format);
        let (schema_id, body) = unframe(bytes).map_err(|reason| CodecError::decode(format, reason))?;

        let writer = if schema_id == declared.id {
            declared.clone()
        } else {
            tracing::debug!(
                subject = %declared.subject,
                declared_id = declared.id,
                schema_id,
                "Payload written with another schema, fetching it by id"
            );
            let writer = self
                .resolver
                .resolve_by_id(schema_id)
                .await
                .map_err(|e| CodecError::decode(format, e.to_string()))?;
            if writer.format != declared.format {
                return Err(CodecError::decode(
                    format,
                    format!(
                        "schema id {schema_id} is {}, but subject '{}' is {}",
                        writer.format, declared.subject, declared.format
                    ),
                ));
            }
            writer
        };

        let value = self.codec_for(format)?.decode(body, Some(&writer))?;
        Ok(DecodedField {
            value,
            format,
            schema_id: Some(schema_id.to_string()),
            size,
        })
    }
}
