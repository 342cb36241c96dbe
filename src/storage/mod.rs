// src/storage/mod.rs
pub mod s3;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::path::Path;

pub use s3::S3CompatStore;

/// Well-known key of the durable processing-ledger document.
pub const LEDGER_KEY: &str = "state/processed.json";

/// Prefix under which rendered videos are stored.
pub const VIDEO_PREFIX: &str = "videos/";

#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

/// Abstract contract the orchestrator consumes: artifact storage plus the
/// single-document ledger. Each run assumes exclusive ownership of the
/// ledger document for its duration.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool>;
    async fn put_file(&self, local: &Path, key: &str, content_type: &str) -> Result<()>;
    async fn put_json(&self, key: &str, value: &serde_json::Value) -> Result<()>;
    /// `Ok(None)` when the document does not exist.
    async fn get_json(&self, key: &str) -> Result<Option<serde_json::Value>>;
    async fn presign_get(&self, key: &str, expires_secs: u64) -> Result<String>;
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<ObjectInfo>>;
    /// Returns the number of objects actually deleted.
    async fn delete(&self, keys: &[String]) -> Result<usize>;
}

/// Delete objects under `prefix` older than the retention window.
/// No-op when retention is disabled (`retention_days <= 0`).
pub async fn delete_older_than(
    store: &dyn ObjectStore,
    prefix: &str,
    retention_days: i64,
    now: DateTime<Utc>,
) -> Result<usize> {
    if retention_days <= 0 {
        return Ok(0);
    }
    let cutoff = now - Duration::days(retention_days);
    let old_keys: Vec<String> = store
        .list_prefix(prefix)
        .await?
        .into_iter()
        .filter(|obj| obj.last_modified < cutoff)
        .map(|obj| obj.key)
        .collect();
    if old_keys.is_empty() {
        return Ok(0);
    }
    let deleted = store.delete(&old_keys).await?;
    tracing::info!(deleted, retention_days, prefix, "retention delete");
    Ok(deleted)
}
