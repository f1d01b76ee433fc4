#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use immulog::store::ManualClock;
use immulog::{EngineConfig, LogStore, MemoryEngine, StoreLimits};

pub const USERNAME: &str = "immudb";
pub const PASSWORD: &str = "immudb";

/// Fixed starting instant for every test clock.
pub fn test_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
}

pub fn test_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(test_epoch()))
}

/// Store over a fresh in-memory engine with tables created.
pub async fn setup_test_store() -> LogStore<MemoryEngine> {
    setup_test_store_with(StoreLimits::default(), test_clock()).await
}

/// Store whose engine accepts at most `max_rows` rows per transaction.
pub async fn setup_small_tx_store(max_rows: usize) -> LogStore<MemoryEngine> {
    let limits = StoreLimits {
        max_rows_per_transaction: max_rows,
        ..StoreLimits::default()
    };
    setup_test_store_with(limits, test_clock()).await
}

pub async fn setup_test_store_with(
    limits: StoreLimits,
    clock: Arc<ManualClock>,
) -> LogStore<MemoryEngine> {
    let engine = MemoryEngine::new(USERNAME, PASSWORD)
        .with_max_rows_per_transaction(limits.max_rows_per_transaction);
    let store = LogStore::new(Arc::new(engine), &EngineConfig::default(), limits)
        .with_clock(clock);
    store
        .create_tables()
        .await
        .expect("Failed to create test tables");
    store
}

pub fn tags(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Scripts executed by the engine that wrote log rows.
pub async fn log_transactions(store: &LogStore<MemoryEngine>) -> Vec<String> {
    store
        .engine()
        .executed_statements()
        .await
        .into_iter()
        .filter(|s| s.contains("INSERT INTO LOGS"))
        .collect()
}
