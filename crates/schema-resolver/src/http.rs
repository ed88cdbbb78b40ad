//! Confluent Schema Registry REST client.

use crate::descriptor::SchemaFormat;
use crate::error::RegistryError;
use crate::registry::{RegisteredSchema, SchemaRegistry, SubjectVersion};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings for [`HttpSchemaRegistry`].
#[derive(Debug, Clone)]
pub struct HttpRegistryConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

impl HttpRegistryConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            timeout: Duration::from_secs(10),
        }
    }
}

pub struct HttpSchemaRegistry {
    client: Client,
    base_url: Url,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchemaResponse {
    subject: Option<String>,
    version: Option<i32>,
    id: Option<i32>,
    schema: String,
    schema_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest<'a> {
    schema: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema_type: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    id: i32,
}

impl HttpSchemaRegistry {
    pub fn new(config: HttpRegistryConfig) -> Result<Self, RegistryError> {
        let base_url = Url::parse(&config.url).map_err(|e| RegistryError::Transport {
            url: config.url.clone(),
            message: format!("invalid registry URL: {e}"),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(RegistryError::Transport {
                url: config.url,
                message: "registry URL cannot be used as a base URL".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RegistryError::Transport {
                url: config.url.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url,
            username: config.username,
            password: config.password,
        })
    }

    /// Appends percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(segments);
        }
        url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.username {
            Some(username) => request.basic_auth(username, self.password.as_deref()),
            None => request,
        }
    }

    /// Sends a request and reads the body. `Ok(None)` on HTTP 404.
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        url: &Url,
    ) -> Result<Option<String>, RegistryError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| RegistryError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| RegistryError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(RegistryError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(Some(body))
    }

    async fn fetch_schema(
        &self,
        url: Url,
        fallback_id: Option<i32>,
    ) -> Result<Option<RegisteredSchema>, RegistryError> {
        tracing::debug!("Fetching schema from {url}");

        let Some(body) = self.execute(self.client.get(url.clone()), &url).await? else {
            return Ok(None);
        };

        let response: SchemaResponse =
            serde_json::from_str(&body).map_err(|e| RegistryError::InvalidResponse {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let id = response
            .id
            .or(fallback_id)
            .ok_or_else(|| RegistryError::InvalidResponse {
                url: url.to_string(),
                message: "response has no schema id".to_string(),
            })?;

        Ok(Some(RegisteredSchema {
            subject: response.subject,
            version: response.version,
            id,
            schema_type: SchemaFormat::from_registry_name(response.schema_type.as_deref())?,
            schema: response.schema,
        }))
    }
}

#[async_trait]
impl SchemaRegistry for HttpSchemaRegistry {
    async fn schema(
        &self,
        subject: &str,
        version: SubjectVersion,
    ) -> Result<Option<RegisteredSchema>, RegistryError> {
        let version = version.to_string();
        let url = self.endpoint(&["subjects", subject, "versions", &version]);
        self.fetch_schema(url, None).await
    }

    async fn schema_by_id(&self, id: i32) -> Result<Option<RegisteredSchema>, RegistryError> {
        let id_segment = id.to_string();
        let url = self.endpoint(&["schemas", "ids", &id_segment]);
        self.fetch_schema(url, Some(id)).await
    }

    async fn register(
        &self,
        subject: &str,
        format: SchemaFormat,
        schema: &str,
    ) -> Result<i32, RegistryError> {
        let url = self.endpoint(&["subjects", subject, "versions"]);
        let request = RegisterRequest {
            schema,
            schema_type: match format {
                SchemaFormat::Avro => None,
                other => Some(other.registry_name()),
            },
        };

        tracing::info!(subject, "Registering {format} schema");

        let body = self
            .execute(self.client.post(url.clone()).json(&request), &url)
            .await?
            .ok_or_else(|| RegistryError::Rejected(format!("subject '{subject}' not found")))?;

        let response: RegisterResponse =
            serde_json::from_str(&body).map_err(|e| RegistryError::InvalidResponse {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(response.id)
    }
}
