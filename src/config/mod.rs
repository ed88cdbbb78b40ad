//! Runtime configuration, from the command line, the environment or a TOML file.

mod duration;

pub use duration::parse_duration;

use anyhow::Context;
use clap::Parser;
use kafka_messages::{PollerSettings, RdkafkaBrokerConfig};
use message_filter::FilterLimits;
use schema_resolver::HttpRegistryConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Parser, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Kafka brokers (comma-separated or multiple --brokers)
    #[clap(long, env = "KAFKA_BROKERS", value_delimiter = ',', default_value = "localhost:9092")]
    pub brokers: Vec<String>,

    /// Schema Registry base URL. Without it every topic is RAW.
    #[clap(long, env = "SCHEMA_REGISTRY_URL")]
    pub schema_registry_url: Option<String>,
    #[clap(long, env = "SCHEMA_REGISTRY_USERNAME")]
    pub schema_registry_username: Option<String>,
    #[clap(long, env = "SCHEMA_REGISTRY_PASSWORD")]
    pub schema_registry_password: Option<String>,
    #[clap(long, default_value_t = 10_000)]
    pub schema_registry_timeout_ms: u64,

    /// Resolve these subjects to a fixed version, as `subject=version`
    #[clap(long, value_delimiter = ',')]
    pub pinned_versions: Vec<String>,

    /// Records requested per fetch
    #[clap(long, default_value_t = 100)]
    pub fetch_batch_size: usize,
    #[clap(long, default_value_t = 5_000)]
    pub fetch_timeout_ms: u64,
    #[clap(long, default_value_t = 5_000)]
    pub produce_timeout_ms: u64,

    /// Upper bound on any poll session, e.g. "30s" or "5m"
    #[clap(long)]
    pub max_poll_duration: Option<String>,

    #[clap(long, default_value_t = 2_000)]
    pub filter_timeout_ms: u64,
    #[clap(long, default_value_t = 1_000_000)]
    pub filter_loop_iteration_limit: u64,
    #[clap(long, default_value_t = 256)]
    pub filter_recursion_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        let limits = FilterLimits::default();
        Self {
            brokers: vec!["localhost:9092".to_string()],
            schema_registry_url: None,
            schema_registry_username: None,
            schema_registry_password: None,
            schema_registry_timeout_ms: 10_000,
            pinned_versions: Vec::new(),
            fetch_batch_size: PollerSettings::default().fetch_batch_size,
            fetch_timeout_ms: 5_000,
            produce_timeout_ms: 5_000,
            max_poll_duration: None,
            filter_timeout_ms: limits.timeout.as_millis() as u64,
            filter_loop_iteration_limit: limits.loop_iteration_limit,
            filter_recursion_limit: limits.recursion_limit,
        }
    }
}

impl Config {
    pub fn from_toml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn broker_config(&self) -> RdkafkaBrokerConfig {
        RdkafkaBrokerConfig {
            brokers: self.brokers.join(","),
            fetch_timeout: Duration::from_millis(self.fetch_timeout_ms),
            produce_timeout: Duration::from_millis(self.produce_timeout_ms),
            ..RdkafkaBrokerConfig::default()
        }
    }

    /// `None` when no registry URL is configured.
    pub fn registry_config(&self) -> Option<HttpRegistryConfig> {
        let url = self.schema_registry_url.as_deref()?.trim();
        if url.is_empty() {
            return None;
        }
        Some(HttpRegistryConfig {
            username: self.schema_registry_username.clone(),
            password: self.schema_registry_password.clone(),
            timeout: Duration::from_millis(self.schema_registry_timeout_ms),
            ..HttpRegistryConfig::new(url)
        })
    }

    pub fn pinned_versions(&self) -> anyhow::Result<HashMap<String, i32>> {
        self.pinned_versions
            .iter()
            .map(|pair| {
                let (subject, version) = pair
                    .split_once('=')
                    .with_context(|| format!("Expected subject=version, got '{pair}'"))?;
                let version: i32 = version
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid version for subject '{subject}'"))?;
                Ok((subject.trim().to_string(), version))
            })
            .collect()
    }

    pub fn filter_limits(&self) -> FilterLimits {
        FilterLimits {
            loop_iteration_limit: self.filter_loop_iteration_limit,
            recursion_limit: self.filter_recursion_limit,
            timeout: Duration::from_millis(self.filter_timeout_ms),
        }
    }

    pub fn poller_settings(&self) -> anyhow::Result<PollerSettings> {
        let max_poll_duration = self
            .max_poll_duration
            .as_deref()
            .map(parse_duration)
            .transpose()
            .context("Invalid max_poll_duration")?;
        Ok(PollerSettings {
            fetch_batch_size: self.fetch_batch_size.max(1),
            max_poll_duration,
            filter_limits: self.filter_limits(),
            ..PollerSettings::default()
        })
    }
}
