//! Bridge configuration, read from the process environment.
//!
//! Each field maps to the upper-cased env var of the same name
//! (`kafka_brokers` ← `KAFKA_BROKERS`). List values are comma-separated.

use crate::error::BridgeError;
use crate::events::collection_for;
use crate::sync::BatchSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct BridgeConfig {
    /// Bootstrap servers, comma-separated
    #[validate(length(min = 1))]
    #[serde(default = "default_brokers")]
    pub kafka_brokers: String,

    #[validate(length(min = 1, max = 255))]
    #[serde(default = "default_group_id")]
    pub kafka_group_id: String,

    /// Change-event topics to consume
    #[validate(length(min = 1))]
    #[serde(default = "default_topics")]
    pub kafka_topics: Vec<String>,

    /// Where to start when the group has no committed offset
    #[serde(default)]
    pub kafka_auto_offset_reset: OffsetReset,

    #[serde(default = "default_session_timeout_ms")]
    pub kafka_session_timeout_ms: u64,

    #[validate(range(min = 1, max = 10000))]
    #[serde(default = "default_batch_max_messages")]
    pub batch_max_messages: usize,

    #[validate(range(min = 10, max = 60000))]
    #[serde(default = "default_batch_poll_timeout_ms")]
    pub batch_poll_timeout_ms: u64,

    #[validate(range(max = 60000))]
    #[serde(default = "default_failed_batch_pause_ms")]
    pub failed_batch_pause_ms: u64,

    #[validate(url)]
    #[serde(default = "default_elasticsearch_url")]
    pub elasticsearch_url: String,

    /// Refresh the index after every write so changes are searchable at once
    #[serde(default = "default_refresh")]
    pub elasticsearch_refresh: bool,

    /// JSON file mapping collection name → index creation body
    #[serde(default)]
    pub elasticsearch_mappings_path: Option<PathBuf>,

    /// Statistics log interval; 0 disables the reporter
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetReset {
    #[default]
    Earliest,
    Latest,
}

impl OffsetReset {
    pub fn as_str(&self) -> &'static str {
        match self {
            OffsetReset::Earliest => "earliest",
            OffsetReset::Latest => "latest",
        }
    }
}

fn default_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_group_id() -> String {
    "elasticsearch-indexer".to_string()
}

fn default_topics() -> Vec<String> {
    vec![
        "cdc.public.users".to_string(),
        "cdc.public.orders".to_string(),
    ]
}

fn default_session_timeout_ms() -> u64 {
    30000
}

fn default_batch_max_messages() -> usize {
    100
}

fn default_batch_poll_timeout_ms() -> u64 {
    1000
}

fn default_failed_batch_pause_ms() -> u64 {
    1000
}

fn default_elasticsearch_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_refresh() -> bool {
    true
}

fn default_stats_interval_secs() -> u64 {
    10
}

impl BridgeConfig {
    /// Load from the environment and validate.
    pub fn from_env() -> Result<Self, BridgeError> {
        let config: Self = envy::from_env().map_err(|e| BridgeError::Config(e.to_string()))?;
        config.checked()
    }

    /// Load from explicit `(KEY, value)` pairs instead of the process environment.
    pub fn from_vars<I>(vars: I) -> Result<Self, BridgeError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Self =
            envy::from_iter(vars).map_err(|e| BridgeError::Config(e.to_string()))?;
        config.checked()
    }

    fn checked(mut self) -> Result<Self, BridgeError> {
        self.kafka_topics = self
            .kafka_topics
            .into_iter()
            .map(|topic| topic.trim().to_string())
            .filter(|topic| !topic.is_empty())
            .collect();

        self.validate()
            .map_err(|e| BridgeError::Config(e.to_string()))?;
        Ok(self)
    }

    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            max_messages: self.batch_max_messages,
            poll_timeout: Duration::from_millis(self.batch_poll_timeout_ms),
            failed_batch_pause: Duration::from_millis(self.failed_batch_pause_ms),
        }
    }

    /// Destination collections for the configured topics, deduplicated.
    pub fn collections(&self) -> Vec<String> {
        self.kafka_topics
            .iter()
            .map(|topic| collection_for(topic))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.kafka_session_timeout_ms)
    }

    /// `None` when the reporter is disabled.
    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_secs > 0).then(|| Duration::from_secs(self.stats_interval_secs))
    }
}
