// src/ingest/rss.rs
// Generic RSS 2.0 provider. Image URLs are harvested from enclosures,
// media-RSS tags and inline <img> markup, in that order of precedence.

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use quick_xml::de::from_str;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

use crate::ingest::types::{CandidateItem, FeedConfig, FeedProvider};
use crate::ingest::{accepted_image_extension, clean_summary, compute_item_id};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize, Default)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Guid>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    #[serde(default)]
    enclosure: Vec<MediaRef>,
    // quick-xml's serde deserializer strips XML namespace prefixes, so these
    // media-RSS elements are matched by their local name, not the `media:` prefix.
    #[serde(rename = "content", default)]
    media_content: Vec<MediaRef>,
    #[serde(rename = "thumbnail", default)]
    media_thumbnail: Vec<MediaRef>,
}

#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "$text")]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaRef {
    #[serde(rename = "@url")]
    url: Option<String>,
    #[serde(rename = "@type")]
    kind: Option<String>,
}

pub struct RssFeedProvider {
    cfg: FeedConfig,
    client: reqwest::Client,
}

impl RssFeedProvider {
    pub fn new(cfg: FeedConfig, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()
            .context("building feed http client")?;
        Ok(Self { cfg, client })
    }
}

#[async_trait]
impl FeedProvider for RssFeedProvider {
    async fn fetch_latest(&self) -> Result<Vec<CandidateItem>> {
        let body = self
            .client
            .get(&self.cfg.url)
            .send()
            .await
            .with_context(|| format!("fetching feed {}", self.cfg.url))?
            .error_for_status()
            .with_context(|| format!("feed {} returned error status", self.cfg.url))?
            .text()
            .await
            .context("reading feed body")?;
        let items = parse_feed(&body, &self.cfg)?;
        tracing::info!(source = %self.cfg.name, entries = items.len(), "parsed feed");
        Ok(items)
    }

    fn name(&self) -> &str {
        &self.cfg.name
    }
}

/// Parse a raw RSS document into candidate items.
pub fn parse_feed(xml: &str, cfg: &FeedConfig) -> Result<Vec<CandidateItem>> {
    let xml_clean = scrub_html_entities_for_xml(xml);
    let rss: Rss =
        from_str(&xml_clean).with_context(|| format!("parsing rss xml for {}", cfg.name))?;

    let mut out = Vec::with_capacity(rss.channel.items.len());
    for it in rss.channel.items {
        let title = it
            .title
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("Untitled")
            .to_string();
        let published = it.pub_date.clone().unwrap_or_default();
        let guid = it.guid.as_ref().and_then(|g| g.value.as_deref());
        let link = it.link.as_deref().map(str::trim).unwrap_or_default();
        let item_id = compute_item_id(guid, Some(link), &title, &published);
        let image_urls = extract_image_urls(&it, &cfg.url);

        out.push(CandidateItem {
            source_name: cfg.name.clone(),
            source_url: cfg.url.clone(),
            item_id,
            title,
            summary: clean_summary(it.description.as_deref().unwrap_or_default()),
            link: link.to_string(),
            published,
            image_urls,
        });
    }
    Ok(out)
}

fn extract_image_urls(item: &Item, base_url: &str) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<String> = Vec::new();

    let mut add = |raw: &str| {
        let Some(normalized) = normalize_image_url(raw, base_url) else {
            return;
        };
        if !accepted_image_extension(&normalized) {
            return;
        }
        if seen.insert(normalized.clone()) {
            out.push(normalized);
        }
    };

    for enc in &item.enclosure {
        if let Some(url) = enc.url.as_deref() {
            let is_image = enc
                .kind
                .as_deref()
                .is_some_and(|t| t.to_ascii_lowercase().starts_with("image/"));
            if is_image {
                add(url);
            }
        }
    }
    for media in &item.media_content {
        if let Some(url) = media.url.as_deref() {
            let is_image = media
                .kind
                .as_deref()
                .is_some_and(|t| t.to_ascii_lowercase().starts_with("image/"))
                || accepted_image_extension(url);
            if is_image {
                add(url);
            }
        }
    }
    for thumb in &item.media_thumbnail {
        if let Some(url) = thumb.url.as_deref() {
            add(url);
        }
    }
    if let Some(html) = item.description.as_deref() {
        for src in inline_img_sources(html) {
            add(&src);
        }
    }

    out
}

fn inline_img_sources(html: &str) -> Vec<String> {
    static RE_IMG: OnceCell<Regex> = OnceCell::new();
    let re = RE_IMG
        .get_or_init(|| Regex::new(r#"(?is)<img[^>]+src\s*=\s*["']([^"']+)["']"#).unwrap());
    re.captures_iter(html)
        .map(|c| c[1].trim().to_string())
        .collect()
}

fn normalize_image_url(raw: &str, base_url: &str) -> Option<String> {
    let decoded = html_escape::decode_html_entities(raw.trim()).to_string();
    if decoded.is_empty() {
        return None;
    }
    match url::Url::parse(&decoded) {
        Ok(u) => Some(u.to_string()),
        // Relative path: resolve against the feed URL.
        Err(_) => url::Url::parse(base_url)
            .ok()?
            .join(&decoded)
            .ok()
            .map(|u| u.to_string()),
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
