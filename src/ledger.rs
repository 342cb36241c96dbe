// src/ledger.rs
// Durable record of which item identities have already produced output.
// One JSON document, loaded once at run start, mutated in place, persisted
// once at run end. Absence of a key means "not yet produced".

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::storage::{ObjectStore, LEDGER_KEY};
use crate::timeparse::{iso_utc, parse_iso_utc};

pub const LEDGER_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ledger {
    pub version: u32,
    /// item id -> ISO-8601 UTC timestamp of when it was produced.
    #[serde(default)]
    pub processed: BTreeMap<String, String>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            version: LEDGER_SCHEMA_VERSION,
            processed: BTreeMap::new(),
        }
    }
}

impl Ledger {
    pub fn is_processed(&self, item_id: &str) -> bool {
        self.processed.contains_key(item_id)
    }

    /// Idempotent upsert. `timestamp` defaults to now (UTC).
    pub fn mark_processed(&mut self, item_id: &str, timestamp: Option<DateTime<Utc>>) {
        let ts = timestamp.unwrap_or_else(Utc::now);
        self.processed.insert(item_id.to_string(), iso_utc(ts));
    }

    /// Remove entries older than the retention window, and entries whose
    /// timestamp no longer parses (corrupt entries are treated as expired
    /// rather than retained forever). Returns the number removed.
    pub fn prune_expired(&mut self, retention_days: i64, now: DateTime<Utc>) -> usize {
        if retention_days <= 0 {
            return 0;
        }
        let cutoff = now - Duration::days(retention_days);
        let before = self.processed.len();
        self.processed.retain(|_, ts| match parse_iso_utc(ts) {
            Some(parsed) => parsed >= cutoff,
            None => false,
        });
        before - self.processed.len()
    }

    /// Load from the durable document, defaulting to an empty ledger when
    /// the document does not exist yet.
    pub async fn load(store: &dyn ObjectStore) -> Result<Self> {
        match store.get_json(LEDGER_KEY).await.context("loading ledger")? {
            Some(value) => {
                let ledger: Ledger =
                    serde_json::from_value(value).context("decoding ledger document")?;
                Ok(ledger)
            }
            None => Ok(Ledger::default()),
        }
    }

    pub async fn save(&self, store: &dyn ObjectStore) -> Result<()> {
        let value = serde_json::to_value(self).context("encoding ledger document")?;
        store.put_json(LEDGER_KEY, &value).await.context("saving ledger")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_and_membership() {
        let mut ledger = Ledger::default();
        assert!(!ledger.is_processed("guid:a"));
        ledger.mark_processed("guid:a", None);
        assert!(ledger.is_processed("guid:a"));
        // Upsert is idempotent.
        ledger.mark_processed("guid:a", None);
        assert_eq!(ledger.processed.len(), 1);
    }

    #[test]
    fn prune_removes_stale_and_corrupt_keeps_fresh() {
        let now = Utc::now();
        let mut ledger = Ledger::default();
        ledger.mark_processed("old", Some(now - Duration::days(31)));
        ledger.mark_processed("fresh", Some(now - Duration::days(5)));
        ledger
            .processed
            .insert("corrupt".into(), "not-a-timestamp".into());

        let removed = ledger.prune_expired(30, now);
        assert_eq!(removed, 2);
        assert!(ledger.is_processed("fresh"));
        assert!(!ledger.is_processed("old"));
        assert!(!ledger.is_processed("corrupt"));
    }

    #[test]
    fn prune_disabled_when_retention_nonpositive() {
        let now = Utc::now();
        let mut ledger = Ledger::default();
        ledger.mark_processed("ancient", Some(now - Duration::days(365)));
        assert_eq!(ledger.prune_expired(0, now), 0);
        assert_eq!(ledger.prune_expired(-1, now), 0);
        assert!(ledger.is_processed("ancient"));
    }
}
