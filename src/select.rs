// src/select.rs
// Candidate selection: per-source recency cap, then global story dedup.
//
// Dedup walks oldest-first so the earliest report of a story becomes the
// canonical keeper; the final worklist is re-sorted newest-first so fresher
// stories win when a run budget truncates processing.

use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::BTreeMap;

use crate::ingest::types::CandidateItem;
use crate::timeparse::published_or_epoch;

/// Two items at or above this similarity describe the same story.
/// Empirically tuned against the content domain; do not retune casually.
pub const SIMILARITY_THRESHOLD: f64 = 0.84;

/// Upper bound on the per-source recency cap, whatever the configuration
/// says. Dedup is O(k²) in the surviving candidates.
pub const HARD_RECENT_CAP: usize = 25;

fn normalize_story_text(text: &str) -> String {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    static RE_NON_ALNUM: OnceCell<Regex> = OnceCell::new();
    let re_non_alnum = RE_NON_ALNUM.get_or_init(|| Regex::new(r"[^a-z0-9\s]").unwrap());
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());

    let lowered = text.to_lowercase();
    let no_tags = re_tags.replace_all(&lowered, " ");
    let alnum = re_non_alnum.replace_all(&no_tags, " ");
    re_ws.replace_all(&alnum, " ").trim().to_string()
}

fn story_text(item: &CandidateItem) -> String {
    normalize_story_text(&format!("{} {}", item.title, item.summary))
}

fn token_jaccard(a: &str, b: &str) -> f64 {
    let a_tokens: std::collections::HashSet<&str> = a.split_whitespace().collect();
    let b_tokens: std::collections::HashSet<&str> = b.split_whitespace().collect();
    if a_tokens.is_empty() || b_tokens.is_empty() {
        return 0.0;
    }
    let intersection = a_tokens.intersection(&b_tokens).count() as f64;
    let union = a_tokens.union(&b_tokens).count() as f64;
    intersection / union
}

/// Symmetric similarity in [0, 1]. Max of a character-level edit ratio and
/// word-set Jaccard: either signal alone is treated as sufficient evidence
/// that two items report the same story.
pub fn story_similarity(a: &CandidateItem, b: &CandidateItem) -> f64 {
    let a_text = story_text(a);
    let b_text = story_text(b);
    if a_text.is_empty() || b_text.is_empty() {
        return 0.0;
    }
    let char_ratio = strsim::normalized_levenshtein(&a_text, &b_text);
    char_ratio.max(token_jaccard(&a_text, &b_text))
}

pub fn sort_newest_first(mut items: Vec<CandidateItem>) -> Vec<CandidateItem> {
    items.sort_by_key(|item| std::cmp::Reverse(published_or_epoch(&item.published)));
    items
}

pub fn sort_oldest_first(mut items: Vec<CandidateItem>) -> Vec<CandidateItem> {
    items.sort_by_key(|item| published_or_epoch(&item.published));
    items
}

/// Keep at most `cap` most-recently-published items (descending). A zero or
/// negative cap keeps everything; the hard cap applies regardless.
pub fn select_recent(items: Vec<CandidateItem>, cap: i32) -> Vec<CandidateItem> {
    if cap <= 0 {
        return items;
    }
    let limit = (cap as usize).min(HARD_RECENT_CAP);
    let mut sorted = sort_newest_first(items);
    sorted.truncate(limit);
    sorted
}

/// Outcome of the global story dedup for one run.
#[derive(Debug, Default)]
pub struct DedupDecision {
    /// Each kept item is the first chronological report of its story.
    pub kept: Vec<CandidateItem>,
    /// skipped item id -> id of the story's chosen representative.
    pub skipped_to_keeper: BTreeMap<String, String>,
}

/// Walk items oldest-first; an item similar (>= threshold) to any already
/// kept item is recorded as skipped, pointing at its keeper. O(k²), bounded
/// by the per-source recency cap.
pub fn dedup_stories(items: Vec<CandidateItem>, threshold: f64) -> DedupDecision {
    let mut decision = DedupDecision::default();
    for item in sort_oldest_first(items) {
        let keeper = decision
            .kept
            .iter()
            .find(|kept| story_similarity(&item, kept) >= threshold)
            .map(|kept| kept.item_id.clone());
        match keeper {
            Some(keeper_id) => {
                decision.skipped_to_keeper.insert(item.item_id.clone(), keeper_id);
            }
            None => decision.kept.push(item),
        }
    }
    decision
}
