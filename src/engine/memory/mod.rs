//! In-memory verified engine.
//!
//! Implements [`VerifiedEngine`] over an in-process catalog and hash-chained
//! ledger. Used by the test suite and by the CLI, which persists the state as
//! a JSON snapshot between invocations.

mod ledger;
mod sql;
mod table;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::engine::{Attestation, EngineError, Params, Row, VerifiedEngine, VerifiedValue};
use ledger::Ledger;
use sql::{parse_script, Statement};
use table::Catalog;

pub use ledger::GENESIS_HASH;

pub const DEFAULT_MAX_ROWS_PER_TRANSACTION: usize = 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Snapshot {
    catalog: Catalog,
    ledger: Ledger,
}

#[derive(Debug, Default)]
struct EngineState {
    data: Snapshot,
    logged_in: bool,
    login_count: u64,
    executed: Vec<String>,
}

pub struct MemoryEngine {
    state: Mutex<EngineState>,
    username: String,
    password: String,
    max_rows_per_transaction: usize,
}

impl MemoryEngine {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            state: Mutex::new(EngineState::default()),
            username: username.to_string(),
            password: password.to_string(),
            max_rows_per_transaction: DEFAULT_MAX_ROWS_PER_TRANSACTION,
        }
    }

    pub fn with_max_rows_per_transaction(mut self, max_rows: usize) -> Self {
        self.max_rows_per_transaction = max_rows;
        self
    }

    pub fn max_rows_per_transaction(&self) -> usize {
        self.max_rows_per_transaction
    }

    /// Restore state from a snapshot file, or start empty if it does not exist.
    pub async fn load_snapshot(
        path: &Path,
        username: &str,
        password: &str,
    ) -> Result<Self, EngineError> {
        let engine = Self::new(username, password);
        if path.exists() {
            let contents = tokio::fs::read_to_string(path).await?;
            let data: Snapshot = serde_json::from_str(&contents)?;
            info!(
                "Loaded engine snapshot from {:?} ({} ledger entries)",
                path,
                data.ledger.len()
            );
            engine.state.lock().await.data = data;
        }
        Ok(engine)
    }

    pub async fn save_snapshot(&self, path: &Path) -> Result<(), EngineError> {
        let json = {
            let state = self.state.lock().await;
            serde_json::to_string_pretty(&state.data)?
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, json).await?;
        debug!("Saved engine snapshot to {:?}", path);
        Ok(())
    }

    /// Number of successful logins so far.
    pub async fn login_count(&self) -> u64 {
        self.state.lock().await.login_count
    }

    /// Statement scripts passed to successful `execute` calls, in order.
    pub async fn executed_statements(&self) -> Vec<String> {
        self.state.lock().await.executed.clone()
    }

    /// Rewrite the stored value for `key` without updating the hash chain,
    /// the way an out-of-band modification would. Returns whether the key
    /// existed.
    pub async fn tamper_value(&self, key: &[u8], value: &[u8]) -> bool {
        self.state.lock().await.data.ledger.tamper(key, value.to_vec())
    }

    fn ensure_logged_in(state: &EngineState) -> Result<(), EngineError> {
        if state.logged_in {
            Ok(())
        } else {
            Err(EngineError::NotLoggedIn)
        }
    }

    fn apply(
        &self,
        catalog: &mut Catalog,
        statements: &[Statement],
        params: &Params,
    ) -> Result<usize, EngineError> {
        let opened = matches!(statements.first(), Some(Statement::Begin));
        let closed = matches!(statements.last(), Some(Statement::Commit));
        if opened != closed || (opened && statements.len() < 2) {
            return Err(EngineError::Syntax(
                "unterminated transaction: BEGIN and COMMIT must frame the script".to_string(),
            ));
        }

        let mut rows_written = 0;
        for (position, statement) in statements.iter().enumerate() {
            match statement {
                Statement::Begin if position == 0 => {}
                Statement::Commit if position == statements.len() - 1 => {}
                Statement::Begin | Statement::Commit => {
                    return Err(EngineError::Syntax(
                        "nested transaction markers are not supported".to_string(),
                    ))
                }
                Statement::CreateTable(create) => catalog.create_table(create)?,
                Statement::CreateIndex(create) => catalog.create_index(create)?,
                Statement::Insert(insert) => {
                    rows_written += catalog.insert(insert, params)?;
                    if rows_written > self.max_rows_per_transaction {
                        return Err(EngineError::TransactionTooLarge {
                            rows: rows_written,
                            max: self.max_rows_per_transaction,
                        });
                    }
                }
                Statement::Select(_) => {
                    return Err(EngineError::Syntax(
                        "SELECT is not allowed in execute, use query".to_string(),
                    ))
                }
            }
        }
        Ok(rows_written)
    }
}

#[async_trait::async_trait]
impl VerifiedEngine for MemoryEngine {
    async fn login(&self, username: &str, password: &str) -> Result<(), EngineError> {
        if username != self.username || password != self.password {
            return Err(EngineError::AuthenticationFailed(username.to_string()));
        }
        let mut state = self.state.lock().await;
        state.logged_in = true;
        state.login_count += 1;
        debug!("User {} logged in", username);
        Ok(())
    }

    async fn logout(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        Self::ensure_logged_in(&state)?;
        state.logged_in = false;
        Ok(())
    }

    async fn execute(&self, statement: &str, params: &Params) -> Result<(), EngineError> {
        let statements = parse_script(statement)?;
        let mut state = self.state.lock().await;
        Self::ensure_logged_in(&state)?;

        // Work on a copy so a failing statement leaves no partial writes.
        let mut catalog = state.data.catalog.clone();
        let rows = self.apply(&mut catalog, &statements, params)?;
        state.data.catalog = catalog;
        state.executed.push(statement.to_string());

        debug!(statements = statements.len(), rows, "executed script");
        Ok(())
    }

    async fn query(&self, statement: &str, params: &Params) -> Result<Vec<Row>, EngineError> {
        let statements = parse_script(statement)?;
        let select = match statements.as_slice() {
            [Statement::Select(select)] => select,
            _ => {
                return Err(EngineError::Syntax(
                    "query expects exactly one SELECT statement".to_string(),
                ))
            }
        };
        let state = self.state.lock().await;
        Self::ensure_logged_in(&state)?;
        state.data.catalog.select(select, params)
    }

    async fn verified_set(&self, key: &[u8], value: &[u8]) -> Result<Attestation, EngineError> {
        let mut state = self.state.lock().await;
        Self::ensure_logged_in(&state)?;
        state
            .data
            .ledger
            .append(std::iter::once((key.to_vec(), value.to_vec())))
    }

    async fn set_all(
        &self,
        entries: &BTreeMap<Vec<u8>, Vec<u8>>,
    ) -> Result<Attestation, EngineError> {
        let mut state = self.state.lock().await;
        Self::ensure_logged_in(&state)?;
        state
            .data
            .ledger
            .append(entries.iter().map(|(k, v)| (k.clone(), v.clone())))
    }

    async fn verified_get(&self, key: &[u8]) -> Result<VerifiedValue, EngineError> {
        let state = self.state.lock().await;
        Self::ensure_logged_in(&state)?;
        state.data.ledger.get(key)
    }
}
