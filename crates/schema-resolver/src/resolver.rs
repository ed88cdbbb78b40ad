//! Subject-keyed schema cache in front of a [`SchemaRegistry`].

use crate::descriptor::SchemaDescriptor;
use crate::error::SchemaError;
use crate::registry::{SchemaRegistry, SubjectVersion};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OnceCell;

/// `None` records a definite "subject not registered" answer.
type SubjectSlot = Arc<OnceCell<Option<Arc<SchemaDescriptor>>>>;
type IdSlot = Arc<OnceCell<Option<Arc<SchemaDescriptor>>>>;

pub fn key_subject(topic: &str) -> String {
    format!("{topic}-key")
}

pub fn value_subject(topic: &str) -> String {
    format!("{topic}-value")
}

/// The key and value schemas of a topic; `None` means RAW.
#[derive(Debug, Clone, Default)]
pub struct TopicSchemas {
    pub key: Option<Arc<SchemaDescriptor>>,
    pub value: Option<Arc<SchemaDescriptor>>,
}

/// Resolves subjects to parsed schemas.
///
/// Results are cached per subject and per id until explicitly invalidated.
/// Concurrent lookups of the same key share a single registry call.
pub struct SchemaResolver {
    registry: Arc<dyn SchemaRegistry>,
    pinned_versions: HashMap<String, i32>,
    subjects: Mutex<HashMap<String, SubjectSlot>>,
    ids: Mutex<HashMap<i32, IdSlot>>,
}

impl SchemaResolver {
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        Self {
            registry,
            pinned_versions: HashMap::new(),
            subjects: Mutex::new(HashMap::new()),
            ids: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve these subjects to a fixed version instead of the latest one.
    pub fn with_pinned_versions(mut self, pinned_versions: HashMap<String, i32>) -> Self {
        self.pinned_versions = pinned_versions;
        self
    }

    pub fn registry(&self) -> &Arc<dyn SchemaRegistry> {
        &self.registry
    }

    pub async fn resolve(&self, subject: &str) -> Result<Arc<SchemaDescriptor>, SchemaError> {
        let slot = lock(&self.subjects)
            .entry(subject.to_string())
            .or_default()
            .clone();

        let cached = slot.get_or_try_init(|| self.fetch_subject(subject)).await?;

        cached.clone().ok_or_else(|| SchemaError::NotFound {
            subject: subject.to_string(),
            reason: "subject is not registered".to_string(),
        })
    }

    pub async fn resolve_by_id(&self, id: i32) -> Result<Arc<SchemaDescriptor>, SchemaError> {
        let slot = lock(&self.ids).entry(id).or_default().clone();

        let cached = slot.get_or_try_init(|| self.fetch_id(id)).await?;

        cached.clone().ok_or_else(|| SchemaError::IdNotFound {
            id,
            reason: "schema id is not registered".to_string(),
        })
    }

    /// Resolves `{topic}-key` and `{topic}-value`.
    ///
    /// Not-found subjects become `None`; an unparsable schema is an error.
    pub async fn resolve_topic(&self, topic: &str) -> Result<TopicSchemas, SchemaError> {
        let key_subject = key_subject(topic);
        let value_subject = value_subject(topic);
        let (key, value) = tokio::join!(self.resolve(&key_subject), self.resolve(&value_subject));

        Ok(TopicSchemas {
            key: found_or_raw(key)?,
            value: found_or_raw(value)?,
        })
    }

    pub fn invalidate(&self, subject: &str) {
        tracing::debug!(subject, "Invalidating cached schema");
        lock(&self.subjects).remove(subject);
    }

    pub fn invalidate_topic(&self, topic: &str) {
        self.invalidate(&key_subject(topic));
        self.invalidate(&value_subject(topic));
    }

    pub fn invalidate_all(&self) {
        lock(&self.subjects).clear();
        lock(&self.ids).clear();
    }

    async fn fetch_subject(
        &self,
        subject: &str,
    ) -> Result<Option<Arc<SchemaDescriptor>>, SchemaError> {
        let version = self
            .pinned_versions
            .get(subject)
            .map(|v| SubjectVersion::Number(*v))
            .unwrap_or(SubjectVersion::Latest);

        let registered = match self.registry.schema(subject, version).await {
            Ok(Some(registered)) => registered,
            Ok(None) => {
                tracing::debug!(subject, %version, "No schema registered");
                return Ok(None);
            }
            Err(e) => {
                tracing::warn!(subject, "Schema registry lookup failed: {e}");
                return Err(SchemaError::NotFound {
                    subject: subject.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let descriptor = Arc::new(SchemaDescriptor::from_registered(subject, registered)?);
        tracing::debug!(
            subject,
            id = descriptor.id,
            version = descriptor.version,
            "Resolved {} schema",
            descriptor.format
        );

        // Seed the id cache so framed payloads written with this schema need no extra lookup.
        let id_slot = lock(&self.ids).entry(descriptor.id).or_default().clone();
        let _ = id_slot.set(Some(descriptor.clone()));

        Ok(Some(descriptor))
    }

    async fn fetch_id(&self, id: i32) -> Result<Option<Arc<SchemaDescriptor>>, SchemaError> {
        let registered = match self.registry.schema_by_id(id).await {
            Ok(Some(registered)) => registered,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::warn!(id, "Schema registry lookup by id failed: {e}");
                return Err(SchemaError::IdNotFound {
                    id,
                    reason: e.to_string(),
                });
            }
        };

        let subject = registered
            .subject
            .clone()
            .unwrap_or_else(|| format!("schema-id-{id}"));
        Ok(Some(Arc::new(SchemaDescriptor::from_registered(
            &subject, registered,
        )?)))
    }
}

fn found_or_raw(
    result: Result<Arc<SchemaDescriptor>, SchemaError>,
) -> Result<Option<Arc<SchemaDescriptor>>, SchemaError> {
    match result {
        Ok(descriptor) => Ok(Some(descriptor)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
