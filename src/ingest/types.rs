// src/ingest/types.rs
use anyhow::Result;

/// One configured feed source.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
}

/// One piece of source content, as observed this run. Created by a provider,
/// read-only afterward; only its id and outcome are ever persisted.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CandidateItem {
    pub source_name: String,
    pub source_url: String,
    /// Stable identity across runs; see `ingest::compute_item_id`.
    pub item_id: String,
    pub title: String,
    pub summary: String,
    pub link: String,
    /// Original publish string, parsed lazily and defensively.
    pub published: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

#[async_trait::async_trait]
pub trait FeedProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<CandidateItem>>;
    fn name(&self) -> &str;
}
