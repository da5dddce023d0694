use std::path::PathBuf;
use std::time::Duration;

use tracing::trace;

use crate::Application;
use crate::orchestrator::{AggregationSettings, MONTHLY_DEADLINE};
use crate::sanitize::RETENTION_LIMIT_DAYS;

/// Storage backend configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory store (no persistence)
    #[serde(rename = "none")]
    None,

    /// SQLite database (default)
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./player-count.db")
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    String::from("http://127.0.0.1:8080")
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct AggregationConfig {
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            deadline_secs: default_deadline_secs(),
        }
    }
}

fn default_retention_days() -> u32 {
    RETENTION_LIMIT_DAYS as u32
}

fn default_deadline_secs() -> u64 {
    MONTHLY_DEADLINE.as_secs()
}

impl From<&AggregationConfig> for AggregationSettings {
    fn from(config: &AggregationConfig) -> Self {
        Self {
            retention_days: i64::from(config.retention_days),
            deadline: Duration::from_secs(config.deadline_secs),
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Config {
    /// Storage configuration (optional - defaults to SQLite)
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Applications registered with the store before each run
    #[serde(default)]
    pub applications: Vec<Application>,
}

impl Config {
    /// Apply `PLAYER_COUNT_DB` and `PLAYER_COUNT_PROVIDER_URL` overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(path) = crate::util::get_db_path() {
            trace!("overriding database path from environment");
            self.storage = StorageConfig::Sqlite { path };
        }
        if let Some(url) = crate::util::get_provider_url() {
            trace!("overriding provider url from environment");
            self.provider.base_url = url;
        }
        self
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    parse_config(&file_content)
}

pub fn parse_config(content: &str) -> anyhow::Result<Config> {
    serde_json::from_str(content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
