// src/keys.rs
// Deterministic, content-addressed storage keys. The key doubles as the
// idempotency check against the bucket, so every piece must be stable:
// same title + item id + publish date always yields the same key.

use sha2::{Digest, Sha256};

use crate::timeparse::published_or_epoch;

pub const SLUG_MAX_LEN: usize = 70;

pub fn sha256_hex(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Filesystem-safe slug: lower-cased, ASCII-folded (non-ASCII dropped),
/// non-alphanumeric runs collapsed to single hyphens, trimmed, length-capped.
pub fn slugify(text: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    let mut cleaned: String = out.trim_matches('-').to_string();
    if cleaned.len() > max_len {
        cleaned.truncate(max_len);
        cleaned = cleaned.trim_end_matches('-').to_string();
    }
    if cleaned.is_empty() {
        cleaned = "clip".to_string();
    }
    cleaned
}

/// `videos/{yyyy}/{mm}/{dd}/{slug}-{first 10 hex of sha256(item_id)}.mp4`
pub fn build_video_key(title: &str, item_id: &str, published: &str) -> String {
    let date = published_or_epoch(published);
    let slug = slugify(title, SLUG_MAX_LEN);
    let suffix = &sha256_hex(item_id)[..10];
    format!("videos/{}/{}-{}.mp4", date.format("%Y/%m/%d"), slug, suffix)
}
