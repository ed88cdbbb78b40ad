use schema_resolver::SchemaFormat;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payload format of a record key or value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormatTag {
    Raw,
    Avro,
    Protobuf,
    JsonSchema,
}

impl FormatTag {
    pub const ALL: [FormatTag; 4] = [
        FormatTag::Raw,
        FormatTag::Avro,
        FormatTag::Protobuf,
        FormatTag::JsonSchema,
    ];
}

impl From<SchemaFormat> for FormatTag {
    fn from(format: SchemaFormat) -> Self {
        match format {
            SchemaFormat::Avro => FormatTag::Avro,
            SchemaFormat::Protobuf => FormatTag::Protobuf,
            SchemaFormat::JsonSchema => FormatTag::JsonSchema,
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatTag::Raw => write!(f, "RAW"),
            FormatTag::Avro => write!(f, "AVRO"),
            FormatTag::Protobuf => write!(f, "PROTOBUF"),
            FormatTag::JsonSchema => write!(f, "JSON_SCHEMA"),
        }
    }
}

/// A decoded key or value, as shown to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedField {
    /// Canonical text: the raw text for RAW, JSON for schema formats.
    pub value: String,
    pub format: FormatTag,
    pub schema_id: Option<String>,
    /// Length of the bytes on the wire, framing included.
    pub size: i64,
}
