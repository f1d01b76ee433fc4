use thiserror::Error;

use crate::engine::EngineError;
use crate::query::QueryError;

impl From<toml::de::Error> for LogStoreError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigError(format!("TOML parse error: {}", err))
    }
}

#[derive(Error, Debug)]
pub enum LogStoreError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Query build error: {0}")]
    QueryBuildError(#[from] QueryError),

    #[error("Engine error: {0}")]
    EngineError(#[from] EngineError),

    #[error("Malformed row: {0}")]
    MalformedRow(String),
}

impl LogStoreError {
    pub fn content_length(length: usize, max: usize) -> Self {
        Self::ValidationError(format!(
            "Log content length {} outside allowed range 1..={}",
            length, max
        ))
    }

    pub fn tag_length(tag: &str, max: usize) -> Self {
        Self::ValidationError(format!(
            "Tag '{}' length {} outside allowed range 1..={}",
            tag,
            tag.chars().count(),
            max
        ))
    }

    pub fn too_many_tags(count: usize, max: usize) -> Self {
        Self::ValidationError(format!("Too many tags: {} (maximum {})", count, max))
    }

    /// Builder misuse and empty transactions are programming defects rather
    /// than data problems.
    pub fn is_defect(&self) -> bool {
        matches!(self, Self::QueryBuildError(_))
    }
}
