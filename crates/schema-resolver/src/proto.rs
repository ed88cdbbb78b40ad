//! Runtime `.proto` parsing.
//!
//! Protobuf schemas arrive from the registry as `.proto` source text. They are
//! parsed with `protobuf-parse` into descriptors that the codec walks when
//! encoding JSON into proto3 binary and back, without any code generation.

use crate::error::ProtoError;
use protobuf::descriptor::field_descriptor_proto::{Label, Type};
use protobuf::descriptor::{DescriptorProto, EnumDescriptorProto, FieldDescriptorProto};
use protobuf_parse::Parser;
use std::collections::HashMap;
use std::path::Path;

/// Represents a parsed protobuf schema
#[derive(Debug, Clone)]
pub struct ProtoSchema {
    /// Message descriptors keyed by fully qualified name (without leading dot)
    messages: HashMap<String, ProtoMessageDescriptor>,
    /// Enum descriptors keyed by fully qualified name (without leading dot)
    enums: HashMap<String, ProtoEnumDescriptor>,
    /// Top-level message names in declaration order.
    ///
    /// The position in this list is the Confluent message index.
    top_level: Vec<String>,
}

/// Describes a protobuf message type
#[derive(Debug, Clone)]
pub struct ProtoMessageDescriptor {
    /// Fully qualified message name (e.g., "mypackage.MyMessage")
    pub name: String,
    /// Fields in declaration order
    pub fields: Vec<ProtoFieldDescriptor>,
    /// Nested message names in declaration order
    pub nested: Vec<String>,
    /// Synthetic `FooEntry` message generated for a `map<K, V>` field
    pub is_map_entry: bool,
}

/// Describes a single field in a message
#[derive(Debug, Clone)]
pub struct ProtoFieldDescriptor {
    /// Field name
    pub name: String,
    /// lowerCamelCase name used by the proto3 JSON mapping
    pub json_name: String,
    /// Field number (tag)
    pub number: u32,
    /// Field type
    pub field_type: ProtoType,
    /// Whether the field is repeated
    pub is_repeated: bool,
    /// Declared with `optional` in proto3, so absence is distinguishable from the default
    pub has_presence: bool,
}

/// Protobuf field types
#[derive(Debug, Clone, PartialEq)]
pub enum ProtoType {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
    Message(String), // Fully qualified nested message type name
    Enum(String),    // Fully qualified enum type name
}

/// Describes a protobuf enum
#[derive(Debug, Clone)]
pub struct ProtoEnumDescriptor {
    pub name: String,
    /// Values in declaration order; the first one is the proto3 default
    pub values: Vec<(String, i32)>,
}

impl std::fmt::Display for ProtoType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

impl ProtoType {
    pub fn type_name(&self) -> String {
        match self {
            ProtoType::Double => "double".to_string(),
            ProtoType::Float => "float".to_string(),
            ProtoType::Int32 => "int32".to_string(),
            ProtoType::Int64 => "int64".to_string(),
            ProtoType::Uint32 => "uint32".to_string(),
            ProtoType::Uint64 => "uint64".to_string(),
            ProtoType::Sint32 => "sint32".to_string(),
            ProtoType::Sint64 => "sint64".to_string(),
            ProtoType::Fixed32 => "fixed32".to_string(),
            ProtoType::Fixed64 => "fixed64".to_string(),
            ProtoType::Sfixed32 => "sfixed32".to_string(),
            ProtoType::Sfixed64 => "sfixed64".to_string(),
            ProtoType::Bool => "bool".to_string(),
            ProtoType::String => "string".to_string(),
            ProtoType::Bytes => "bytes".to_string(),
            ProtoType::Message(name) => format!("message:{name}"),
            ProtoType::Enum(name) => format!("enum:{name}"),
        }
    }

    /// Scalar numeric types are written packed when repeated (proto3 default).
    pub fn is_packable(&self) -> bool {
        !matches!(
            self,
            ProtoType::String | ProtoType::Bytes | ProtoType::Message(_)
        )
    }
}

impl ProtoSchema {
    /// Parse a .proto file and create a schema
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ProtoError> {
        let p = path.as_ref();

        let mut parser = Parser::new();
        parser.pure();
        parser.input(p);

        // Get parent directory of temp file for includes
        if let Some(parent) = p.parent() {
            parser.include(parent);
        }

        let parsed = parser
            .parse_and_typecheck()
            .map_err(|e| ProtoError::Parse(e.to_string()))?;

        let mut schema = ProtoSchema {
            messages: HashMap::new(),
            enums: HashMap::new(),
            top_level: Vec::new(),
        };

        for file_descriptor in &parsed.file_descriptors {
            let package = file_descriptor.package.clone().unwrap_or_default();

            for enum_type in &file_descriptor.enum_type {
                schema.collect_enum(&package, enum_type);
            }
            for message in &file_descriptor.message_type {
                let name = schema.collect_message(&package, message)?;
                schema.top_level.push(name);
            }
        }

        Ok(schema)
    }

    /// Parse a .proto file content from string
    pub fn from_string(content: &str) -> Result<Self, ProtoError> {
        use std::io::Write;

        let mut temp_file = tempfile::Builder::new()
            .suffix(".proto")
            .tempfile()
            .map_err(|e| ProtoError::Parse(format!("Failed to create temp file: {e}")))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| ProtoError::Parse(format!("Failed to write temp file: {e}")))?;

        Self::from_file(temp_file.path())
    }

    fn collect_message(
        &mut self,
        scope: &str,
        message: &DescriptorProto,
    ) -> Result<String, ProtoError> {
        let full_name = qualify(scope, message.name.as_deref().unwrap_or_default());

        for enum_type in &message.enum_type {
            self.collect_enum(&full_name, enum_type);
        }
        let mut nested = Vec::with_capacity(message.nested_type.len());
        for nested_type in &message.nested_type {
            nested.push(self.collect_message(&full_name, nested_type)?);
        }

        let mut fields = Vec::with_capacity(message.field.len());
        for field in &message.field {
            let field_name = field.name.clone().unwrap_or_default();
            if field_name.is_empty() {
                continue;
            }
            let json_name = field
                .json_name
                .clone()
                .unwrap_or_else(|| to_json_name(&field_name));

            fields.push(ProtoFieldDescriptor {
                field_type: Self::parse_field_type(field)?,
                number: field.number.unwrap_or(0) as u32,
                is_repeated: field.label == Some(Label::LABEL_REPEATED.into()),
                has_presence: field.proto3_optional.unwrap_or(false),
                name: field_name,
                json_name,
            });
        }

        let is_map_entry = message
            .options
            .as_ref()
            .and_then(|options| options.map_entry)
            .unwrap_or(false);

        self.messages.insert(
            full_name.clone(),
            ProtoMessageDescriptor {
                name: full_name.clone(),
                fields,
                nested,
                is_map_entry,
            },
        );

        Ok(full_name)
    }

    fn collect_enum(&mut self, scope: &str, enum_type: &EnumDescriptorProto) {
        let full_name = qualify(scope, enum_type.name.as_deref().unwrap_or_default());
        let values = enum_type
            .value
            .iter()
            .map(|v| (v.name.clone().unwrap_or_default(), v.number.unwrap_or(0)))
            .collect();
        self.enums.insert(
            full_name.clone(),
            ProtoEnumDescriptor {
                name: full_name,
                values,
            },
        );
    }

    fn parse_field_type(field: &FieldDescriptorProto) -> Result<ProtoType, ProtoError> {
        let field_type_enum_or_unknown = field
            .type_
            .ok_or_else(|| ProtoError::Parse("Field missing type".to_string()))?;

        // Convert EnumOrUnknown to the enum value
        let field_type_enum = field_type_enum_or_unknown.enum_value_or_default();
        let type_name = || {
            field
                .type_name
                .as_deref()
                .unwrap_or_default()
                .trim_start_matches('.')
                .to_string()
        };

        Ok(match field_type_enum {
            Type::TYPE_DOUBLE => ProtoType::Double,
            Type::TYPE_FLOAT => ProtoType::Float,
            Type::TYPE_INT64 => ProtoType::Int64,
            Type::TYPE_UINT64 => ProtoType::Uint64,
            Type::TYPE_INT32 => ProtoType::Int32,
            Type::TYPE_FIXED64 => ProtoType::Fixed64,
            Type::TYPE_FIXED32 => ProtoType::Fixed32,
            Type::TYPE_BOOL => ProtoType::Bool,
            Type::TYPE_STRING => ProtoType::String,
            Type::TYPE_MESSAGE => ProtoType::Message(type_name()),
            Type::TYPE_BYTES => ProtoType::Bytes,
            Type::TYPE_UINT32 => ProtoType::Uint32,
            Type::TYPE_ENUM => ProtoType::Enum(type_name()),
            Type::TYPE_SFIXED32 => ProtoType::Sfixed32,
            Type::TYPE_SFIXED64 => ProtoType::Sfixed64,
            Type::TYPE_SINT32 => ProtoType::Sint32,
            Type::TYPE_SINT64 => ProtoType::Sint64,
            Type::TYPE_GROUP => {
                return Err(ProtoError::Parse(
                    "TYPE_GROUP is Proto2 syntax only and deprecated hence not supported"
                        .to_string(),
                ))
            }
        })
    }

    /// Get a message descriptor by fully qualified name.
    ///
    /// A leading dot is accepted. Falls back to a unique simple-name match so
    /// callers can write `User` instead of `myapp.v1.User`.
    pub fn get_message(&self, name: &str) -> Option<&ProtoMessageDescriptor> {
        let name = name.trim_start_matches('.');
        self.messages.get(name).or_else(|| {
            let mut candidates = self
                .messages
                .values()
                .filter(|m| m.name.rsplit('.').next() == Some(name));
            match (candidates.next(), candidates.next()) {
                (Some(only), None) => Some(only),
                _ => None,
            }
        })
    }

    pub fn get_enum(&self, name: &str) -> Option<&ProtoEnumDescriptor> {
        self.enums.get(name.trim_start_matches('.'))
    }

    /// The message the Confluent serializers write by default: the first top-level one.
    pub fn root_message(&self) -> Option<&ProtoMessageDescriptor> {
        self.top_level
            .first()
            .and_then(|name| self.messages.get(name))
    }

    /// Top-level message at the given Confluent message index.
    pub fn message_at(&self, index: usize) -> Option<&ProtoMessageDescriptor> {
        self.top_level
            .get(index)
            .and_then(|name| self.messages.get(name))
    }

    /// Follows a Confluent message-index path: the first index picks a
    /// top-level message, each further index a nested one.
    pub fn message_by_indexes(&self, indexes: &[usize]) -> Option<&ProtoMessageDescriptor> {
        let (first, rest) = indexes.split_first()?;
        let mut message = self.message_at(*first)?;
        for index in rest {
            let name = message.nested.get(*index)?;
            message = self.messages.get(name)?;
        }
        Some(message)
    }

    /// List all top-level message types in declaration order
    pub fn list_messages(&self) -> &[String] {
        &self.top_level
    }
}

impl ProtoMessageDescriptor {
    /// Get a field descriptor by name
    pub fn get_field(&self, name: &str) -> Option<&ProtoFieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field lookup for JSON input: proto name or its lowerCamelCase JSON name.
    pub fn get_json_field(&self, key: &str) -> Option<&ProtoFieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.name == key || f.json_name == key)
    }

    pub fn field_by_number(&self, number: u32) -> Option<&ProtoFieldDescriptor> {
        self.fields.iter().find(|f| f.number == number)
    }

    /// List all field names in order
    pub fn list_fields(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

impl ProtoEnumDescriptor {
    pub fn name_of(&self, number: i32) -> Option<&str> {
        self.values
            .iter()
            .find(|(_, n)| *n == number)
            .map(|(name, _)| name.as_str())
    }

    pub fn number_of(&self, name: &str) -> Option<i32> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, number)| *number)
    }

    pub fn default_name(&self) -> Option<&str> {
        self.values.first().map(|(name, _)| name.as_str())
    }
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}

fn to_json_name(field_name: &str) -> String {
    let mut out = String::with_capacity(field_name.len());
    let mut upper_next = false;
    for c in field_name.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}
