//! Log store
//!
//! Writes logs and their tags as SQL rows plus one verified digest per log,
//! and reads them back newest first with optional tag filtering and digest
//! verification.

pub mod identifier;
pub mod models;
pub mod schema;
pub mod session;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, StoreLimits};
use crate::engine::{Params, Row, SqlValue, VerifiedEngine, VerifiedValue};
use crate::error::LogStoreError;
use crate::query::{
    param_name, placeholder, BatchTransaction, ComparisonOperator, Condition, ConditionBuilder,
    InsertQueryBuilder, ReadQueryBuilder, SortDirection,
};
use identifier::{generate_identifier, sha256_digest};
use models::{AddLogRequest, AddLogsRequest, LogEntry, LogRecord};
use schema::*;
use session::{Clock, Session, SystemClock};

pub use identifier::sha256_hex;
pub use session::ManualClock;

const LOG_PROJECTION: &[&str] = &[
    "LOGS.id",
    "LOGS.log",
    "LOGS.uniqueidentifier",
    "LOGS.createdate",
];
const LOGS_ID: &str = "LOGS.id";
const TAGS_TAG: &str = "TAGS.tag";
const LAST_ID_PARAM: &str = "lastid";
const IDENTIFIER_PARAM: &str = "identifier";

/// One LOGS row as projected by [`LOG_PROJECTION`].
#[derive(Debug)]
struct StoredLog {
    id: i64,
    log: String,
    identifier: String,
    created: i64,
}

impl StoredLog {
    fn from_row(row: Row) -> Result<Self, LogStoreError> {
        let malformed = || LogStoreError::MalformedRow(format!("unexpected log row {:?}", row));
        match row.as_slice() {
            [SqlValue::Integer(id), SqlValue::Text(log), SqlValue::Text(identifier), SqlValue::Integer(created)] => {
                Ok(Self {
                    id: *id,
                    log: log.clone(),
                    identifier: identifier.clone(),
                    created: *created,
                })
            }
            _ => Err(malformed()),
        }
    }
}

pub struct LogStore<E: VerifiedEngine> {
    engine: Arc<E>,
    session: Session,
    clock: Arc<dyn Clock>,
    limits: StoreLimits,
}

impl<E: VerifiedEngine> LogStore<E> {
    pub fn new(engine: Arc<E>, config: &EngineConfig, limits: StoreLimits) -> Self {
        let ttl_secs = i64::try_from(config.session_ttl_secs).unwrap_or(i64::MAX);
        let ttl = Duration::try_seconds(ttl_secs).unwrap_or(Duration::MAX);
        Self {
            engine,
            session: Session::new(&config.username, &config.password, ttl),
            clock: Arc::new(SystemClock),
            limits,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub fn limits(&self) -> &StoreLimits {
        &self.limits
    }

    async fn connect(&self) -> Result<(), LogStoreError> {
        Ok(self.session.acquire(&*self.engine, &*self.clock).await?)
    }

    /// Log out of the engine. The next operation logs in again.
    pub async fn release(&self) -> Result<(), LogStoreError> {
        Ok(self.session.release(&*self.engine).await?)
    }

    /// Create both tables and their indexes. Safe to call repeatedly.
    pub async fn create_tables(&self) -> Result<(), LogStoreError> {
        self.connect().await?;
        let params = Params::new();
        for (table, indexes) in [
            (CREATE_LOGS_TABLE, LOGS_INDEXES),
            (CREATE_TAGS_TABLE, TAGS_INDEXES),
        ] {
            self.engine.execute(table, &params).await?;
            for index in indexes {
                if let Err(e) = self.engine.execute(index, &params).await {
                    debug!("Skipping index {}: {}", index, e);
                }
            }
        }
        info!("Log tables ready");
        Ok(())
    }

    pub async fn process_log_request(&self, request: &AddLogRequest) -> Result<String, LogStoreError> {
        let batch = AddLogsRequest::from(request.clone());
        let mut identifiers = self.process_logs_request(&batch).await?;
        identifiers
            .pop()
            .ok_or_else(|| LogStoreError::MalformedRow("no identifier returned for log".to_string()))
    }

    /// Store every log with the request's tags. Returns identifiers in input
    /// order. Logs are split into transactions so no transaction exceeds the
    /// engine's row limit; each committed chunk is followed by one verified
    /// write of its digests.
    pub async fn process_logs_request(
        &self,
        request: &AddLogsRequest,
    ) -> Result<Vec<String>, LogStoreError> {
        request.validate(&self.limits)?;
        let tags: Vec<String> = request
            .tags
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let chunk_size = self.limits.entries_per_transaction(tags.len())?;

        self.connect().await?;
        let created = self.clock.now().timestamp_millis();
        let contents: Vec<&str> = request.logs.iter().map(LogEntry::content).collect();

        let mut identifiers = Vec::with_capacity(contents.len());
        for (chunk_index, chunk) in contents.chunks(chunk_size).enumerate() {
            let written = self.write_chunk(chunk, &tags, created).await?;
            debug!(
                chunk = chunk_index,
                logs = chunk.len(),
                rows = chunk.len() * (tags.len() + 1),
                "committed log chunk"
            );
            identifiers.extend(written);
        }

        info!(
            "Stored {} logs with {} tags in {} transactions",
            identifiers.len(),
            tags.len(),
            contents.len().div_ceil(chunk_size)
        );
        Ok(identifiers)
    }

    async fn write_chunk(
        &self,
        contents: &[&str],
        tags: &[String],
        created: i64,
    ) -> Result<Vec<String>, LogStoreError> {
        let mut params = Params::new();
        let mut logs_insert = InsertQueryBuilder::new();
        logs_insert.insert_into(LOGS_TABLE, LOG_FIELDS)?;
        let mut tags_insert = InsertQueryBuilder::new();
        tags_insert.insert_into(TAGS_TABLE, TAG_FIELDS)?;

        for (t, tag) in tags.iter().enumerate() {
            params.insert(param_name(TAG_COLUMN, t), SqlValue::from(tag.as_str()));
        }

        let mut identifiers = Vec::with_capacity(contents.len());
        let mut digests = BTreeMap::new();
        for (i, content) in contents.iter().enumerate() {
            let identifier = generate_identifier(content);
            params.insert(param_name(LOG_COLUMN, i), SqlValue::from(*content));
            params.insert(param_name(IDENTIFIER_COLUMN, i), SqlValue::from(identifier.as_str()));
            params.insert(param_name(CREATED_COLUMN, i), SqlValue::from(created));
            logs_insert.values(i, LOG_FIELDS)?;
            for t in 0..tags.len() {
                tags_insert.values_at_indexes(&[(IDENTIFIER_COLUMN, i), (TAG_COLUMN, t)])?;
            }
            digests.insert(
                identifier.as_bytes().to_vec(),
                sha256_digest(content.as_bytes()).to_vec(),
            );
            identifiers.push(identifier);
        }

        let mut batch = BatchTransaction::new();
        batch.add_query(logs_insert.build()?);
        if tags_insert.row_count() > 0 {
            batch.add_query(tags_insert.build()?);
        }
        self.engine.execute(&batch.build()?, &params).await?;
        self.engine.set_all(&digests).await?;
        Ok(identifiers)
    }

    /// Newest logs first.
    ///
    /// With `limit >= 1` at most `limit` rows are returned and a row matches
    /// when it carries ANY of `tags_filter`. With `limit < 1` the whole table
    /// is paged through and a row matches only when it carries ALL of them.
    pub async fn get_last_logs(
        &self,
        limit: i64,
        verify: bool,
        tags_filter: &[String],
    ) -> Result<Vec<LogRecord>, LogStoreError> {
        self.connect().await?;
        let mut seen = HashSet::new();
        let mut records = Vec::new();

        if limit >= 1 {
            let limit = usize::try_from(limit).unwrap_or(usize::MAX);
            for stored in self.fetch_page(tags_filter, None, limit).await? {
                if let Some(record) = self.build_record(stored, verify, &mut seen).await? {
                    records.push(record);
                }
            }
            return Ok(records);
        }

        let required: BTreeSet<&str> = tags_filter.iter().map(String::as_str).collect();
        let mut last_id = 0;
        let mut pages = 0;
        loop {
            let cursor = (last_id > 0).then_some(last_id);
            let page = self
                .fetch_page(tags_filter, cursor, self.limits.page_size)
                .await?;
            let Some(smallest) = page.iter().map(|row| row.id).min() else {
                break;
            };
            pages += 1;
            debug!(page = pages, rows = page.len(), last_id = smallest, "fetched log page");

            for stored in page {
                if let Some(record) = self.build_record(stored, verify, &mut seen).await? {
                    if required.iter().all(|tag| record.tags.iter().any(|t| t == tag)) {
                        records.push(record);
                    }
                }
            }

            // ids are positive and shrink from page to page
            if smallest <= 0 || (last_id > 0 && smallest >= last_id) {
                break;
            }
            last_id = smallest;
        }
        Ok(records)
    }

    async fn fetch_page(
        &self,
        tags_filter: &[String],
        before_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<StoredLog>, LogStoreError> {
        let mut params = Params::new();
        let mut conditions = ConditionBuilder::new();
        for (i, tag) in tags_filter.iter().enumerate() {
            params.insert(param_name(TAG_COLUMN, i), SqlValue::from(tag.as_str()));
            conditions.add_or(Condition::leaf(
                TAGS_TAG,
                ComparisonOperator::Eq,
                placeholder(TAG_COLUMN, i),
            ));
        }
        if let Some(last_id) = before_id {
            params.insert(LAST_ID_PARAM.to_string(), SqlValue::from(last_id));
            conditions.add_and_on_left(Condition::leaf(
                LOGS_ID,
                ComparisonOperator::Lt,
                format!("@{}", LAST_ID_PARAM),
            ));
        }

        let mut builder = ReadQueryBuilder::new();
        builder.select(LOG_PROJECTION)?.from(&[LOGS_TABLE])?;
        if !tags_filter.is_empty() {
            builder.join(TAGS_TABLE, "LOGS.uniqueidentifier", "TAGS.uniqueidentifier")?;
        }
        let condition = conditions.build();
        if !condition.is_empty() {
            builder.where_condition(&condition)?;
        }
        let query = builder
            .order_by(LOGS_ID, SortDirection::Desc)?
            .limit(limit)?
            .build()?;

        self.engine
            .query(&query, &params)
            .await?
            .into_iter()
            .map(StoredLog::from_row)
            .collect()
    }

    /// Attach tags and verification to a row not seen yet in this call.
    async fn build_record(
        &self,
        stored: StoredLog,
        verify: bool,
        seen: &mut HashSet<String>,
    ) -> Result<Option<LogRecord>, LogStoreError> {
        if !seen.insert(stored.identifier.clone()) {
            return Ok(None);
        }
        let tags = self.fetch_tags(&stored.identifier).await?;
        let verified = verify
            && self
                .matches_digest(&stored.identifier, &sha256_digest(stored.log.as_bytes()))
                .await;
        Ok(Some(LogRecord {
            log: stored.log,
            uniqueidentifier: stored.identifier,
            createdate: stored.created,
            tags,
            verified,
        }))
    }

    async fn fetch_tags(&self, identifier: &str) -> Result<Vec<String>, LogStoreError> {
        let query = ReadQueryBuilder::new()
            .select(&[TAG_COLUMN])?
            .from(&[TAGS_TABLE])?
            .where_field(
                IDENTIFIER_COLUMN,
                format!("@{}", IDENTIFIER_PARAM),
                ComparisonOperator::Eq,
            )?
            .build()?;
        let mut params = Params::new();
        params.insert(IDENTIFIER_PARAM.to_string(), SqlValue::from(identifier));

        self.engine
            .query(&query, &params)
            .await?
            .into_iter()
            .map(|row| match row.as_slice() {
                [SqlValue::Text(tag)] => Ok(tag.clone()),
                _ => Err(LogStoreError::MalformedRow(format!("unexpected tag row {:?}", row))),
            })
            .collect()
    }

    /// Number of stored logs, or -1 when the engine returns no count row.
    pub async fn get_log_count(&self) -> Result<i64, LogStoreError> {
        self.connect().await?;
        let query = ReadQueryBuilder::new()
            .select(&["COUNT()"])?
            .from(&[LOGS_TABLE])?
            .build()?;
        let rows = self.engine.query(&query, &Params::new()).await?;
        match rows.first().and_then(|row| row.first()) {
            Some(value) => value
                .as_integer()
                .ok_or_else(|| LogStoreError::MalformedRow(format!("unexpected count {}", value))),
            None => Ok(-1),
        }
    }

    /// Stored digest for `identifier` together with the engine attestation.
    pub async fn get_verified(&self, identifier: &str) -> Result<VerifiedValue, LogStoreError> {
        self.connect().await?;
        Ok(self.engine.verified_get(identifier.as_bytes()).await?)
    }

    pub async fn verify_log_content(&self, content: &str, identifier: &str) -> bool {
        if let Err(e) = self.connect().await {
            warn!("Cannot verify log {}: {}", identifier, e);
            return false;
        }
        self.matches_digest(identifier, &sha256_digest(content.as_bytes()))
            .await
    }

    /// Compare a hex SHA-256 against the stored digest, ignoring case.
    pub async fn verify_log_by_sha(&self, sha_hex: &str, identifier: &str) -> bool {
        if let Err(e) = self.connect().await {
            warn!("Cannot verify log {}: {}", identifier, e);
            return false;
        }
        match hex::decode(sha_hex.trim()) {
            Ok(expected) => self.matches_digest(identifier, &expected).await,
            Err(e) => {
                warn!("Invalid digest {:?} for log {}: {}", sha_hex, identifier, e);
                false
            }
        }
    }

    async fn matches_digest(&self, identifier: &str, expected: &[u8]) -> bool {
        match self.engine.verified_get(identifier.as_bytes()).await {
            Ok(stored) if !stored.verified => {
                warn!("Engine could not attest digest of log {}", identifier);
                false
            }
            Ok(stored) if stored.value != expected => {
                warn!("Digest mismatch for log {}", identifier);
                false
            }
            Ok(_) => true,
            Err(e) => {
                warn!("Cannot verify log {}: {}", identifier, e);
                false
            }
        }
    }
}
