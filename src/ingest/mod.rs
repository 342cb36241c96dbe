// src/ingest/mod.rs
pub mod rss;
pub mod types;

use once_cell::sync::OnceCell;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Strip markup and collapse whitespace so summaries read as plain text.
pub fn clean_summary(raw: &str) -> String {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());

    let stripped = re_tags.replace_all(raw, " ");
    let decoded = html_escape::decode_html_entities(stripped.as_ref()).to_string();
    re_ws.replace_all(&decoded, " ").trim().to_string()
}

/// Only still-image formats make it into a slideshow.
pub fn accepted_image_extension(url: &str) -> bool {
    let path = match url::Url::parse(url) {
        Ok(u) => u.path().to_ascii_lowercase(),
        Err(_) => url.to_ascii_lowercase(),
    };
    [".jpg", ".jpeg", ".png", ".webp", ".gif"]
        .iter()
        .any(|ext| path.ends_with(ext))
}

/// Stable item identity: identity guid if present, else link, else a hash of
/// title + publish date. The same real item yields the same id across runs
/// regardless of transient field noise.
pub fn compute_item_id(
    guid: Option<&str>,
    link: Option<&str>,
    title: &str,
    published: &str,
) -> String {
    if let Some(guid) = guid.map(str::trim).filter(|s| !s.is_empty()) {
        return format!("guid:{guid}");
    }
    if let Some(link) = link.map(str::trim).filter(|s| !s.is_empty()) {
        return format!("link:{link}");
    }
    let digest = Sha256::digest(format!("{}|{}", title.trim(), published.trim()).as_bytes());
    format!("hash:{}", hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_summary_strips_tags_and_entities() {
        let s = "  <p>Hello&nbsp;&amp; <b>world</b></p>  ";
        assert_eq!(clean_summary(s), "Hello & world");
    }

    #[test]
    fn image_extension_filter() {
        assert!(accepted_image_extension("https://x.test/a/B.JPG"));
        assert!(accepted_image_extension("https://x.test/a.webp?w=300"));
        assert!(!accepted_image_extension("https://x.test/clip.mp4"));
        assert!(!accepted_image_extension("https://x.test/page.html"));
    }

    #[test]
    fn item_id_precedence_guid_link_hash() {
        assert_eq!(
            compute_item_id(Some("g-1"), Some("https://x/l"), "T", "d"),
            "guid:g-1"
        );
        assert_eq!(
            compute_item_id(None, Some("https://x/l"), "T", "d"),
            "link:https://x/l"
        );
        let hashed = compute_item_id(Some("  "), None, "T", "d");
        assert!(hashed.starts_with("hash:"));
        assert_eq!(hashed, compute_item_id(None, Some(""), "T", "d"));
    }
}
