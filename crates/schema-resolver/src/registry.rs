use crate::descriptor::SchemaFormat;
use crate::error::RegistryError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which version of a subject to look up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectVersion {
    Latest,
    Number(i32),
}

impl fmt::Display for SubjectVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectVersion::Latest => write!(f, "latest"),
            SubjectVersion::Number(n) => write!(f, "{n}"),
        }
    }
}

/// A schema as the registry stores it, before parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredSchema {
    pub subject: Option<String>,
    pub version: Option<i32>,
    pub id: i32,
    pub schema_type: SchemaFormat,
    pub schema: String,
}

/// Schema Registry collaborator.
///
/// Lookups return `Ok(None)` when the registry answered that the subject,
/// version or id does not exist. `Err` is reserved for failures to get an
/// answer at all.
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    async fn schema(
        &self,
        subject: &str,
        version: SubjectVersion,
    ) -> Result<Option<RegisteredSchema>, RegistryError>;

    async fn schema_by_id(&self, id: i32) -> Result<Option<RegisteredSchema>, RegistryError>;

    /// Registers a schema under a subject and returns its global id.
    async fn register(
        &self,
        subject: &str,
        format: SchemaFormat,
        schema: &str,
    ) -> Result<i32, RegistryError>;
}

/// Registry used when none is configured: every subject is absent.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSchemaRegistry;

#[async_trait]
impl SchemaRegistry for NoSchemaRegistry {
    async fn schema(
        &self,
        _subject: &str,
        _version: SubjectVersion,
    ) -> Result<Option<RegisteredSchema>, RegistryError> {
        Ok(None)
    }

    async fn schema_by_id(&self, _id: i32) -> Result<Option<RegisteredSchema>, RegistryError> {
        Ok(None)
    }

    async fn register(
        &self,
        _subject: &str,
        _format: SchemaFormat,
        _schema: &str,
    ) -> Result<i32, RegistryError> {
        Err(RegistryError::NotConfigured)
    }
}
