// src/media.rs
// Best-effort image download: each URL either yields a local path or is
// dropped with a warning. One bad URL never fails the collection step.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Download up to `max_images` of `urls` into `output_dir`. Returns the
    /// paths that succeeded, in input order.
    async fn download(
        &self,
        urls: &[String],
        output_dir: &Path,
        max_images: usize,
    ) -> Result<Vec<PathBuf>>;
}

const EXT_BY_CONTENT_TYPE: &[(&str, &str)] = &[
    ("image/jpeg", ".jpg"),
    ("image/jpg", ".jpg"),
    ("image/png", ".png"),
    ("image/webp", ".webp"),
    ("image/gif", ".gif"),
];

fn suffix_from_content_type(content_type: &str) -> Option<&'static str> {
    let normalized = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    EXT_BY_CONTENT_TYPE
        .iter()
        .find(|(ct, _)| *ct == normalized)
        .map(|(_, ext)| *ext)
}

fn suffix_from_url(url: &str) -> &'static str {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_default();
    for (suffix, canonical) in [
        (".jpg", ".jpg"),
        (".jpeg", ".jpg"),
        (".png", ".png"),
        (".webp", ".webp"),
        (".gif", ".gif"),
    ] {
        if path.ends_with(suffix) {
            return canonical;
        }
    }
    ".jpg"
}

pub struct HttpImageFetcher {
    http: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(user_agent: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()
            .context("building image http client")?;
        Ok(Self { http })
    }

    async fn fetch_one(&self, url: &str, dest_base: &Path) -> Result<PathBuf> {
        let resp = self.http.get(url).send().await?.error_for_status()?;
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let suffix =
            suffix_from_content_type(&content_type).unwrap_or_else(|| suffix_from_url(url));
        let bytes = resp.bytes().await?;
        let path = dest_base.with_extension(suffix.trim_start_matches('.'));
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("writing image to {}", path.display()))?;
        Ok(path)
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn download(
        &self,
        urls: &[String],
        output_dir: &Path,
        max_images: usize,
    ) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .with_context(|| format!("creating image dir {}", output_dir.display()))?;

        let mut downloaded = Vec::new();
        for (index, url) in urls.iter().enumerate() {
            if downloaded.len() >= max_images {
                break;
            }
            let dest_base = output_dir.join(format!("image_{index:02}"));
            match self.fetch_one(url, &dest_base).await {
                Ok(path) => downloaded.push(path),
                Err(err) => {
                    tracing::warn!(url = %url, error = %err, "failed to download image");
                }
            }
        }
        Ok(downloaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_wins_over_url() {
        assert_eq!(suffix_from_content_type("image/png; charset=binary"), Some(".png"));
        assert_eq!(suffix_from_content_type("text/html"), None);
    }

    #[test]
    fn url_suffix_fallback_normalizes_jpeg() {
        assert_eq!(suffix_from_url("https://x.test/pic.JPEG"), ".jpg");
        assert_eq!(suffix_from_url("https://x.test/pic.webp?w=1"), ".webp");
        assert_eq!(suffix_from_url("https://x.test/none"), ".jpg");
    }
}
