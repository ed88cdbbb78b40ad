use crate::descriptor::{ParsedSchema, SchemaFormat};
use crate::error::RegistryError;
use crate::registry::{RegisteredSchema, SchemaRegistry, SubjectVersion};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// In-process schema registry.
///
/// Ids are assigned from 1 in registration order. Registering the same text
/// twice under a subject returns the existing id, as the Confluent registry does.
#[derive(Debug, Default)]
pub struct InMemorySchemaRegistry {
    state: Mutex<State>,
    lookups: AtomicUsize,
    unavailable: AtomicBool,
}

#[derive(Debug, Default)]
struct State {
    subjects: HashMap<String, Vec<RegisteredSchema>>,
    by_id: HashMap<i32, RegisteredSchema>,
}

impl InMemorySchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `schema` and `schema_by_id` calls served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Simulates an outage: lookups fail with a transport error while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> Result<(), RegistryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RegistryError::Transport {
                url: "memory://".to_string(),
                message: "registry unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SchemaRegistry for InMemorySchemaRegistry {
    async fn schema(
        &self,
        subject: &str,
        version: SubjectVersion,
    ) -> Result<Option<RegisteredSchema>, RegistryError> {
        self.check_available()?;
        let state = self.state();
        let Some(versions) = state.subjects.get(subject) else {
            return Ok(None);
        };
        Ok(match version {
            SubjectVersion::Latest => versions.last().cloned(),
            SubjectVersion::Number(n) => versions.iter().find(|s| s.version == Some(n)).cloned(),
        })
    }

    async fn schema_by_id(&self, id: i32) -> Result<Option<RegisteredSchema>, RegistryError> {
        self.check_available()?;
        Ok(self.state().by_id.get(&id).cloned())
    }

    async fn register(
        &self,
        subject: &str,
        format: SchemaFormat,
        schema: &str,
    ) -> Result<i32, RegistryError> {
        ParsedSchema::parse(format, schema).map_err(RegistryError::Rejected)?;

        let mut state = self.state();
        if let Some(existing) = state
            .subjects
            .get(subject)
            .and_then(|versions| versions.iter().find(|s| s.schema == schema))
        {
            return Ok(existing.id);
        }

        // The same schema under another subject keeps its global id.
        let shared = state
            .by_id
            .values()
            .find(|s| s.schema_type == format && s.schema == schema)
            .map(|s| s.id);
        let id = shared.unwrap_or(state.by_id.len() as i32 + 1);

        let versions = state.subjects.entry(subject.to_string()).or_default();
        let registered = RegisteredSchema {
            subject: Some(subject.to_string()),
            version: Some(versions.len() as i32 + 1),
            id,
            schema_type: format,
            schema: schema.to_string(),
        };
        versions.push(registered.clone());
        state.by_id.entry(id).or_insert(registered);

        tracing::debug!(subject, id, "Registered {format} schema in memory");
        Ok(id)
    }
}
