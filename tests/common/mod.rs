// tests/common/mod.rs
// Shared stub collaborators for integration tests.
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use feedreel::storage::{ObjectInfo, ObjectStore};

/// In-memory object store: a map of key -> (bytes, last-modified).
/// Cloning shares the underlying map, so tests can keep a handle for
/// inspection after moving a clone into the collaborators.
#[derive(Default, Clone)]
pub struct MemStore {
    objects: Arc<Mutex<BTreeMap<String, (Vec<u8>, DateTime<Utc>)>>>,
}

impl MemStore {
    pub fn insert(&self, key: &str, bytes: Vec<u8>, last_modified: DateTime<Utc>) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes, last_modified));
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    async fn put_file(&self, local: &Path, key: &str, _content_type: &str) -> Result<()> {
        let bytes = std::fs::read(local)?;
        self.insert(key, bytes, Utc::now());
        Ok(())
    }

    async fn put_json(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        self.insert(key, serde_json::to_vec(value)?, Utc::now());
        Ok(())
    }

    async fn get_json(&self, key: &str) -> Result<Option<serde_json::Value>> {
        match self.objects.lock().unwrap().get(key) {
            Some((bytes, _)) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }

    async fn presign_get(&self, key: &str, _expires_secs: u64) -> Result<String> {
        Ok(format!("https://store.test/{key}?signed"))
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, (_, lm))| ObjectInfo {
                key: k.clone(),
                last_modified: *lm,
            })
            .collect())
    }

    async fn delete(&self, keys: &[String]) -> Result<usize> {
        let mut objects = self.objects.lock().unwrap();
        let mut deleted = 0;
        for key in keys {
            if objects.remove(key).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}
