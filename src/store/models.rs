use serde::{Deserialize, Serialize};

use crate::config::StoreLimits;
use crate::error::LogStoreError;

/// One entry of a batch request: either bare text or `{"logContent": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogEntry {
    Text(String),
    Body {
        #[serde(rename = "logContent")]
        log_content: String,
    },
}

impl LogEntry {
    pub fn content(&self) -> &str {
        match self {
            LogEntry::Text(content) => content,
            LogEntry::Body { log_content } => log_content,
        }
    }
}

impl From<&str> for LogEntry {
    fn from(content: &str) -> Self {
        LogEntry::Text(content.to_string())
    }
}

fn default_wait() -> bool {
    true
}

/// `waitForIdentifier` is carried for wire compatibility; the store always
/// completes the write before returning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLogRequest {
    pub log_content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_wait")]
    pub wait_for_identifier: bool,
}

impl AddLogRequest {
    pub fn new(content: impl Into<String>, tags: &[&str]) -> Self {
        Self {
            log_content: content.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            wait_for_identifier: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLogsRequest {
    pub logs: Vec<LogEntry>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_wait")]
    pub wait_for_identifier: bool,
}

impl AddLogsRequest {
    pub fn new<S: AsRef<str>>(logs: &[S], tags: &[&str]) -> Self {
        Self {
            logs: logs.iter().map(|l| LogEntry::from(l.as_ref())).collect(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            wait_for_identifier: true,
        }
    }

    /// Checks every entry and tag. Nothing is written unless the whole
    /// request passes.
    pub fn validate(&self, limits: &StoreLimits) -> Result<(), LogStoreError> {
        if self.logs.is_empty() || self.logs.len() > limits.max_batch_entries {
            return Err(LogStoreError::ValidationError(format!(
                "Batch size {} outside allowed range 1..={}",
                self.logs.len(),
                limits.max_batch_entries
            )));
        }
        for entry in &self.logs {
            validate_content(entry.content(), limits)?;
        }
        validate_tags(&self.tags, limits)
    }
}

impl From<AddLogRequest> for AddLogsRequest {
    fn from(request: AddLogRequest) -> Self {
        Self {
            logs: vec![LogEntry::Text(request.log_content)],
            tags: request.tags,
            wait_for_identifier: request.wait_for_identifier,
        }
    }
}

pub fn validate_content(content: &str, limits: &StoreLimits) -> Result<(), LogStoreError> {
    let length = content.chars().count();
    if length == 0 || length > limits.max_content_len {
        return Err(LogStoreError::content_length(length, limits.max_content_len));
    }
    Ok(())
}

pub fn validate_tags(tags: &[String], limits: &StoreLimits) -> Result<(), LogStoreError> {
    if tags.len() > limits.max_tags {
        return Err(LogStoreError::too_many_tags(tags.len(), limits.max_tags));
    }
    for tag in tags {
        let length = tag.chars().count();
        if length == 0 || length > limits.max_tag_len {
            return Err(LogStoreError::tag_length(tag, limits.max_tag_len));
        }
    }
    Ok(())
}

/// A stored log as returned by reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub log: String,
    pub uniqueidentifier: String,
    pub createdate: i64,
    pub tags: Vec<String>,
    pub verified: bool,
}
