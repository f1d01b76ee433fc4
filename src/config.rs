use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;

use crate::error::LogStoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub engine: EngineConfig,
    #[serde(default)]
    pub limits: StoreLimits,
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
}

impl EngineConfig {
    pub fn url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3322,
            username: "immudb".to_string(),
            password: "immudb".to_string(),
            session_ttl_secs: default_session_ttl_secs(),
        }
    }
}

/// Bounds enforced on requests and on the size of each engine transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreLimits {
    pub max_content_len: usize,
    pub max_tag_len: usize,
    pub max_tags: usize,
    pub max_batch_entries: usize,
    pub max_rows_per_transaction: usize,
    pub page_size: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_content_len: 4096,
            max_tag_len: 64,
            max_tags: 16,
            max_batch_entries: 10240,
            max_rows_per_transaction: 1024,
            page_size: 256,
        }
    }
}

impl StoreLimits {
    /// Entries per transaction when each entry writes one log row plus one
    /// row per tag.
    pub fn entries_per_transaction(&self, tag_count: usize) -> Result<usize, LogStoreError> {
        let chunk = self.max_rows_per_transaction / (tag_count + 1);
        if chunk == 0 {
            return Err(LogStoreError::ValidationError(format!(
                "{} tags do not fit in a transaction of {} rows",
                tag_count, self.max_rows_per_transaction
            )));
        }
        Ok(chunk)
    }
}

fn default_snapshot_path() -> String {
    "immulog.json".to_string()
}

fn default_session_ttl_secs() -> u64 {
    30 * 60
}

fn env_or<T>(name: &str, default: T) -> Result<T, LogStoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|e| {
            LogStoreError::ConfigError(format!("Invalid value for {}: {} ({})", name, raw, e))
        }),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, LogStoreError> {
        let defaults = EngineConfig::default();
        let limits = StoreLimits::default();

        let engine = EngineConfig {
            host: env_or("IMMUDB_HOST", defaults.host)?,
            port: env_or("IMMUDB_PORT", defaults.port)?,
            username: env_or("IMMUDB_LOGIN", defaults.username)?,
            password: env_or("IMMUDB_PASSWORD", defaults.password)?,
            session_ttl_secs: env_or("IMMULOG_SESSION_TTL_SECS", defaults.session_ttl_secs)?,
        };

        let limits = StoreLimits {
            max_rows_per_transaction: env_or(
                "IMMULOG_MAX_ROWS_PER_TX",
                limits.max_rows_per_transaction,
            )?,
            page_size: env_or("IMMULOG_PAGE_SIZE", limits.page_size)?,
            ..limits
        };

        let config = AppConfig {
            engine,
            limits,
            snapshot_path: env_or("IMMULOG_SNAPSHOT_PATH", default_snapshot_path())?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, LogStoreError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            LogStoreError::ConfigError(format!("Failed to read {:?}: {}", path, e))
        })?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LogStoreError> {
        let limits = &self.limits;
        let checks = [
            ("max_content_len", limits.max_content_len),
            ("max_tag_len", limits.max_tag_len),
            ("max_batch_entries", limits.max_batch_entries),
            ("max_rows_per_transaction", limits.max_rows_per_transaction),
            ("page_size", limits.page_size),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(LogStoreError::ConfigError(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }
        if self.engine.session_ttl_secs == 0 {
            return Err(LogStoreError::ConfigError(
                "session_ttl_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
