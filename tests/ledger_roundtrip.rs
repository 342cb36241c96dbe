// tests/ledger_roundtrip.rs
mod common;

use chrono::{Duration, Utc};
use common::MemStore;
use feedreel::ledger::Ledger;
use feedreel::storage::{ObjectStore, LEDGER_KEY};

#[tokio::test]
async fn mark_save_load_round_trip() {
    let store = MemStore::default();
    let mut ledger = Ledger::default();
    ledger.mark_processed("guid:abc", None);
    ledger.save(&store).await.unwrap();

    let reloaded = Ledger::load(&store).await.unwrap();
    assert!(reloaded.is_processed("guid:abc"));
    assert!(!reloaded.is_processed("guid:other"));
    assert_eq!(reloaded, ledger);
}

#[tokio::test]
async fn missing_document_loads_empty_ledger() {
    let store = MemStore::default();
    let ledger = Ledger::load(&store).await.unwrap();
    assert!(ledger.processed.is_empty());
    assert_eq!(ledger.version, 1);
}

#[tokio::test]
async fn persisted_document_has_expected_shape() {
    let store = MemStore::default();
    let mut ledger = Ledger::default();
    ledger.mark_processed("guid:abc", Some(Utc::now()));
    ledger.save(&store).await.unwrap();

    let doc = store.get_json(LEDGER_KEY).await.unwrap().unwrap();
    assert_eq!(doc["version"], 1);
    assert!(doc["processed"]["guid:abc"].is_string());
}

#[test]
fn prune_respects_retention_window() {
    let now = Utc::now();
    let mut ledger = Ledger::default();
    ledger.mark_processed("stale", Some(now - Duration::days(31)));
    ledger.mark_processed("fresh", Some(now - Duration::days(5)));

    let removed = ledger.prune_expired(30, now);
    assert_eq!(removed, 1);
    assert!(!ledger.is_processed("stale"));
    assert!(ledger.is_processed("fresh"));
}
