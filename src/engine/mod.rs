//! Verified Storage Engine
//!
//! The narrow capability set the log store consumes from the remote verified
//! key/value and SQL engine. Proof construction and persistence live behind
//! this trait; the store only builds statements and compares digests.

pub mod memory;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use memory::MemoryEngine;

/// A single SQL value as bound into, or returned from, the engine.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Text(String),
    Bytes(Vec<u8>),
}

impl SqlValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Integer(v) => write!(f, "{}", v),
            SqlValue::Text(v) => write!(f, "'{}'", v),
            SqlValue::Bytes(v) => write!(f, "x'{}'", hex::encode(v)),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

/// One result row, ordered as the SELECT projection.
pub type Row = Vec<SqlValue>;

/// Named statement parameters, keyed without the leading `@`.
pub type Params = BTreeMap<String, SqlValue>;

/// Receipt of a verified write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    pub tx_id: u64,
    pub state_root: String,
}

/// A value read back together with the engine's integrity attestation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedValue {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub tx_id: u64,
    pub verified: bool,
}

/// Errors reported by a verified storage engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A data operation was attempted without an active session.
    #[error("not logged in")]
    NotLoggedIn,

    /// The supplied credentials were rejected.
    #[error("authentication failed for user {0}")]
    AuthenticationFailed(String),

    /// No value has ever been written under the key.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The statement text could not be parsed.
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// A placeholder in the statement has no bound parameter.
    #[error("missing parameter: @{0}")]
    MissingParameter(String),

    /// Uniqueness, NOT NULL or length bound violated.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    /// The transaction writes more rows than the engine accepts at once.
    #[error("transaction too large: {rows} rows, maximum is {max}")]
    TransactionTooLarge {
        /// Rows the transaction tried to write.
        rows: usize,
        /// Per-transaction row limit.
        max: usize,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Capability interface of the verified storage engine.
///
/// Implementations must be `Send + Sync`; the log store shares one handle
/// across concurrent requests.
#[async_trait::async_trait]
pub trait VerifiedEngine: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<(), EngineError>;

    async fn logout(&self) -> Result<(), EngineError>;

    /// Execute one or more `;`-terminated statements atomically.
    async fn execute(&self, statement: &str, params: &Params) -> Result<(), EngineError>;

    /// Run a single SELECT and return its rows.
    async fn query(&self, statement: &str, params: &Params) -> Result<Vec<Row>, EngineError>;

    async fn verified_set(&self, key: &[u8], value: &[u8]) -> Result<Attestation, EngineError>;

    /// Write several key/value pairs in one verified transaction.
    async fn set_all(&self, entries: &BTreeMap<Vec<u8>, Vec<u8>>)
        -> Result<Attestation, EngineError>;

    async fn verified_get(&self, key: &[u8]) -> Result<VerifiedValue, EngineError>;
}
