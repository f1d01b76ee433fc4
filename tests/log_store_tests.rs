use std::sync::Arc;

use chrono::Duration;
use immulog::engine::{EngineError, Params, SqlValue, VerifiedEngine};
use immulog::store::identifier::sha256_digest;
use immulog::store::sha256_hex;
use immulog::{
    AddLogRequest, AddLogsRequest, EngineConfig, LogStore, LogStoreError, MemoryEngine,
    StoreLimits,
};

mod common;
use common::*;

async fn count_rows(store: &LogStore<MemoryEngine>, table: &str) -> i64 {
    let rows = store
        .engine()
        .query(&format!("SELECT COUNT() FROM {}", table), &Params::new())
        .await
        .unwrap();
    rows[0][0].as_integer().unwrap()
}

#[tokio::test]
async fn test_single_untagged_log_roundtrip() {
    let store = setup_test_store().await;
    let id = store
        .process_log_request(&AddLogRequest::new("test", &[]))
        .await
        .unwrap();
    assert_eq!(id.len(), 46);

    let logs = store.get_last_logs(1, false, &[]).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].log, "test");
    assert_eq!(logs[0].uniqueidentifier, id);
    assert!(logs[0].tags.is_empty());
    assert!(!logs[0].verified);

    let verified = store.get_last_logs(1, true, &[]).await.unwrap();
    assert!(verified[0].verified);

    let filtered = store.get_last_logs(1, false, &tags(&["x"])).await.unwrap();
    assert!(filtered.is_empty());
}

#[tokio::test]
async fn test_content_verification_is_exact() {
    let store = setup_test_store().await;
    let id = store
        .process_log_request(&AddLogRequest::new("hello", &[]))
        .await
        .unwrap();

    assert!(store.verify_log_content("hello", &id).await);
    assert!(!store.verify_log_content("hello\n", &id).await);
    assert!(!store.verify_log_content("hello", "no-such-identifier").await);
}

#[tokio::test]
async fn test_verify_by_sha() {
    let store = setup_test_store().await;
    let id = store
        .process_log_request(&AddLogRequest::new("hello", &[]))
        .await
        .unwrap();

    assert!(store.verify_log_by_sha(&sha256_hex(b"hello"), &id).await);
    assert!(!store.verify_log_by_sha(&sha256_hex(b"hello\n"), &id).await);
}

#[tokio::test]
async fn test_get_verified_returns_raw_digest() {
    let store = setup_test_store().await;
    let id = store
        .process_log_request(&AddLogRequest::new("audited", &[]))
        .await
        .unwrap();

    let value = store.get_verified(&id).await.unwrap();
    assert_eq!(value.key, id.as_bytes().to_vec());
    assert_eq!(value.value, sha256_digest(b"audited").to_vec());
    assert!(value.verified);

    let err = store.get_verified("missing").await.unwrap_err();
    assert!(matches!(
        err,
        LogStoreError::EngineError(EngineError::KeyNotFound(_))
    ));
}

#[tokio::test]
async fn test_batch_writes_one_tag_row_per_log_and_tag() {
    let store = setup_test_store().await;
    let contents: Vec<String> = (0..7).map(|i| format!("entry {}", i)).collect();
    let ids = store
        .process_logs_request(&AddLogsRequest::new(&contents, &["a", "b", "c"]))
        .await
        .unwrap();

    assert_eq!(ids.len(), 7);
    assert_eq!(count_rows(&store, "LOGS").await, 7);
    assert_eq!(count_rows(&store, "TAGS").await, 21);
    assert_eq!(store.get_log_count().await.unwrap(), 7);
}

#[tokio::test]
async fn test_chunking_respects_transaction_limit_and_order() {
    // 2 tags -> 3 rows per log -> 3 logs per transaction of 10 rows
    let store = setup_small_tx_store(10).await;
    let contents: Vec<String> = (0..10).map(|i| format!("log {}", i)).collect();
    let ids = store
        .process_logs_request(&AddLogsRequest::new(&contents, &["x", "y"]))
        .await
        .unwrap();

    assert_eq!(log_transactions(&store).await.len(), 4);
    assert_eq!(ids.len(), 10);

    let mut logs = store.get_last_logs(0, false, &[]).await.unwrap();
    logs.reverse();
    let stored: Vec<&str> = logs.iter().map(|l| l.log.as_str()).collect();
    let expected: Vec<&str> = contents.iter().map(String::as_str).collect();
    assert_eq!(stored, expected);
    let stored_ids: Vec<&str> = logs.iter().map(|l| l.uniqueidentifier.as_str()).collect();
    let expected_ids: Vec<&str> = ids.iter().map(String::as_str).collect();
    assert_eq!(stored_ids, expected_ids);
}

#[tokio::test]
async fn test_untagged_chunking_uses_full_transaction() {
    let store = setup_small_tx_store(4).await;
    let contents: Vec<String> = (0..9).map(|i| i.to_string()).collect();
    store
        .process_logs_request(&AddLogsRequest::new(&contents, &[]))
        .await
        .unwrap();
    assert_eq!(log_transactions(&store).await.len(), 3);
    assert_eq!(store.get_log_count().await.unwrap(), 9);
}

#[tokio::test]
async fn test_invalid_batch_writes_nothing() {
    let store = setup_test_store().await;
    let long = "x".repeat(4097);
    for request in [
        AddLogsRequest::new(&["fine", ""], &[]),
        AddLogsRequest::new(&["fine", long.as_str()], &[]),
        AddLogsRequest::new(&["fine"], &[""]),
    ] {
        let err = store.process_logs_request(&request).await.unwrap_err();
        assert!(matches!(err, LogStoreError::ValidationError(_)));
    }

    assert!(log_transactions(&store).await.is_empty());
    assert_eq!(store.get_log_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_bounded_read_matches_any_tag() {
    let store = setup_test_store().await;
    for (content, log_tags) in [("a", vec!["x"]), ("b", vec!["y"]), ("c", vec!["x", "y"])] {
        store
            .process_log_request(&AddLogRequest::new(content, &log_tags))
            .await
            .unwrap();
    }
    store
        .process_log_request(&AddLogRequest::new("d", &["z"]))
        .await
        .unwrap();

    let logs = store.get_last_logs(10, false, &tags(&["x", "y"])).await.unwrap();
    let contents: Vec<&str> = logs.iter().map(|l| l.log.as_str()).collect();
    assert_eq!(contents, vec!["c", "b", "a"]);
    assert_eq!(logs[0].tags, tags(&["x", "y"]));
}

#[tokio::test]
async fn test_unbounded_read_requires_all_tags() {
    let store = setup_test_store().await;
    for (content, log_tags) in [("a", vec!["x"]), ("b", vec!["y"]), ("c", vec!["x", "y"])] {
        store
            .process_log_request(&AddLogRequest::new(content, &log_tags))
            .await
            .unwrap();
    }

    let both = store.get_last_logs(0, false, &tags(&["x", "y"])).await.unwrap();
    let contents: Vec<&str> = both.iter().map(|l| l.log.as_str()).collect();
    assert_eq!(contents, vec!["c"]);

    let only_x = store.get_last_logs(-1, false, &tags(&["x"])).await.unwrap();
    let contents: Vec<&str> = only_x.iter().map(|l| l.log.as_str()).collect();
    assert_eq!(contents, vec!["c", "a"]);
}

#[tokio::test]
async fn test_unbounded_read_pages_through_everything() {
    let limits = StoreLimits {
        page_size: 2,
        ..StoreLimits::default()
    };
    let store = setup_test_store_with(limits, test_clock()).await;
    let contents: Vec<String> = (0..5).map(|i| format!("p{}", i)).collect();
    store
        .process_logs_request(&AddLogsRequest::new(&contents, &["t"]))
        .await
        .unwrap();

    let all = store.get_last_logs(0, true, &[]).await.unwrap();
    let got: Vec<&str> = all.iter().map(|l| l.log.as_str()).collect();
    assert_eq!(got, vec!["p4", "p3", "p2", "p1", "p0"]);
    assert!(all.iter().all(|l| l.verified));

    let tagged = store.get_last_logs(0, false, &tags(&["t"])).await.unwrap();
    assert_eq!(tagged.len(), 5);

    let newest = store.get_last_logs(2, false, &[]).await.unwrap();
    let got: Vec<&str> = newest.iter().map(|l| l.log.as_str()).collect();
    assert_eq!(got, vec!["p4", "p3"]);
}

#[tokio::test]
async fn test_tampered_digest_fails_verification() {
    let store = setup_test_store().await;
    let id = store
        .process_log_request(&AddLogRequest::new("original", &[]))
        .await
        .unwrap();

    let forged = sha256_digest(b"forged");
    assert!(store.engine().tamper_value(id.as_bytes(), &forged).await);

    assert!(!store.verify_log_content("original", &id).await);
    assert!(!store.verify_log_content("forged", &id).await);
    let logs = store.get_last_logs(1, true, &[]).await.unwrap();
    assert!(!logs[0].verified);
}

#[tokio::test]
async fn test_session_relogin_after_staleness() {
    let clock = test_clock();
    let store = setup_test_store_with(StoreLimits::default(), clock.clone()).await;
    assert_eq!(store.engine().login_count().await, 1);

    clock.advance(Duration::minutes(10));
    store.get_log_count().await.unwrap();
    assert_eq!(store.engine().login_count().await, 1);

    clock.advance(Duration::minutes(31));
    store.get_log_count().await.unwrap();
    assert_eq!(store.engine().login_count().await, 2);

    store.release().await.unwrap();
    store.get_log_count().await.unwrap();
    assert_eq!(store.engine().login_count().await, 3);
}

#[tokio::test]
async fn test_rejected_credentials_surface_engine_error() {
    let engine = Arc::new(MemoryEngine::new(USERNAME, PASSWORD));
    let config = EngineConfig {
        password: "wrong".to_string(),
        ..EngineConfig::default()
    };
    let store = LogStore::new(engine, &config, StoreLimits::default());

    let err = store.create_tables().await.unwrap_err();
    assert!(matches!(
        err,
        LogStoreError::EngineError(EngineError::AuthenticationFailed(_))
    ));
    assert!(!store.verify_log_content("x", "y").await);
}

#[tokio::test]
async fn test_reads_deduplicate_by_identifier() {
    let store = setup_test_store().await;
    store
        .process_log_request(&AddLogRequest::new("multi", &["a", "b", "c"]))
        .await
        .unwrap();

    let logs = store.get_last_logs(5, false, &tags(&["a", "b", "c"])).await.unwrap();
    assert_eq!(logs.len(), 1);
    let logs = store.get_last_logs(0, false, &tags(&["a", "b", "c"])).await.unwrap();
    assert_eq!(logs.len(), 1);
}

#[tokio::test]
async fn test_concurrent_writers_share_one_store() {
    let store = Arc::new(setup_test_store().await);
    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .process_log_request(&AddLogRequest::new(format!("worker {}", i), &["w"]))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.get_log_count().await.unwrap(), 8);
    assert_eq!(store.engine().login_count().await, 1);
}

#[tokio::test]
async fn test_state_survives_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("immulog.json");

    let store = setup_test_store().await;
    let id = store
        .process_log_request(&AddLogRequest::new("persisted", &["kept"]))
        .await
        .unwrap();
    store.engine().save_snapshot(&path).await.unwrap();

    let engine = MemoryEngine::load_snapshot(&path, USERNAME, PASSWORD)
        .await
        .unwrap();
    let restored = LogStore::new(Arc::new(engine), &EngineConfig::default(), StoreLimits::default());
    restored.create_tables().await.unwrap();

    let logs = restored.get_last_logs(1, true, &tags(&["kept"])).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].uniqueidentifier, id);
    assert!(logs[0].verified);
    assert!(restored.verify_log_content("persisted", &id).await);
}

#[tokio::test]
async fn test_log_ids_bind_as_integers() {
    let store = setup_test_store().await;
    store
        .process_log_request(&AddLogRequest::new("one", &[]))
        .await
        .unwrap();
    let rows = store
        .engine()
        .query("SELECT id FROM LOGS", &Params::new())
        .await
        .unwrap();
    assert!(matches!(rows[0][0], SqlValue::Integer(id) if id > 0));
}
