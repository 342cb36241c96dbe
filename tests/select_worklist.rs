// tests/select_worklist.rs
use feedreel::ingest::types::CandidateItem;
use feedreel::select::{
    dedup_stories, select_recent, sort_newest_first, SIMILARITY_THRESHOLD,
};

fn item(id: &str, published: &str) -> CandidateItem {
    CandidateItem {
        source_name: "Feed".into(),
        source_url: "https://example.test/rss".into(),
        item_id: id.into(),
        title: format!("Title {id}"),
        summary: "summary".into(),
        link: "https://example.test/item".into(),
        published: published.into(),
        image_urls: vec!["https://example.test/a.jpg".into()],
    }
}

#[test]
fn select_recent_limits_to_five_newest_first() {
    let items = vec![
        item("1", "Mon, 01 Jan 2024 10:00:00 GMT"),
        item("2", "Tue, 02 Jan 2024 10:00:00 GMT"),
        item("3", "Wed, 03 Jan 2024 10:00:00 GMT"),
        item("4", "Thu, 04 Jan 2024 10:00:00 GMT"),
        item("5", "Fri, 05 Jan 2024 10:00:00 GMT"),
        item("6", "Sat, 06 Jan 2024 10:00:00 GMT"),
    ];
    let selected = select_recent(items, 5);
    let ids: Vec<&str> = selected.iter().map(|i| i.item_id.as_str()).collect();
    assert_eq!(ids, vec!["6", "5", "4", "3", "2"]);
}

#[test]
fn select_recent_zero_cap_keeps_everything() {
    let items = vec![
        item("1", "Mon, 01 Jan 2024 10:00:00 GMT"),
        item("2", "Tue, 02 Jan 2024 10:00:00 GMT"),
    ];
    assert_eq!(select_recent(items.clone(), 0).len(), 2);
    assert_eq!(select_recent(items, -3).len(), 2);
}

#[test]
fn unparseable_dates_sort_as_oldest() {
    let items = vec![
        item("bad-date", "not a date at all"),
        item("good", "Tue, 02 Jan 2024 10:00:00 GMT"),
    ];
    let selected = select_recent(items, 1);
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].item_id, "good");
}

#[test]
fn worklist_sorts_newest_first_across_sources() {
    let items = vec![
        item("feed1-old", "Mon, 01 Jan 2024 10:00:00 GMT"),
        item("feed2-new", "Fri, 05 Jan 2024 10:00:00 GMT"),
        item("feed3-mid", "Wed, 03 Jan 2024 10:00:00 GMT"),
    ];
    let sorted = sort_newest_first(items);
    let ids: Vec<&str> = sorted.iter().map(|i| i.item_id.as_str()).collect();
    assert_eq!(ids, vec!["feed2-new", "feed3-mid", "feed1-old"]);
}

fn story(id: &str, title: &str, summary: &str, published: &str) -> CandidateItem {
    CandidateItem {
        source_name: "Feed".into(),
        source_url: "https://example.test/rss".into(),
        item_id: id.into(),
        title: title.into(),
        summary: summary.into(),
        link: "https://example.test/item".into(),
        published: published.into(),
        image_urls: vec![],
    }
}

fn older() -> CandidateItem {
    story(
        "older",
        "Big upset in state final",
        "Team Alpha beat Team Beta by one point to win the state championship.",
        "Mon, 01 Jan 2024 10:00:00 GMT",
    )
}

fn newer_similar() -> CandidateItem {
    story(
        "newer",
        "Big upset in state final as Team Alpha beats Team Beta",
        "Team Alpha beat Team Beta by one point to win the state championship game.",
        "Tue, 02 Jan 2024 10:00:00 GMT",
    )
}

fn distinct() -> CandidateItem {
    story(
        "distinct",
        "Coach signs long-term extension",
        "The head coach signs a multi-year extension through 2029.",
        "Wed, 03 Jan 2024 10:00:00 GMT",
    )
}

#[test]
fn dedup_keeps_first_chronological_report() {
    let decision = dedup_stories(
        vec![newer_similar(), older(), distinct()],
        SIMILARITY_THRESHOLD,
    );
    let kept: Vec<&str> = decision.kept.iter().map(|i| i.item_id.as_str()).collect();
    assert_eq!(kept, vec!["older", "distinct"]);
    assert_eq!(decision.skipped_to_keeper.get("newer").unwrap(), "older");
}

#[test]
fn dedup_is_idempotent_under_reordering() {
    let orderings = [
        vec![newer_similar(), older(), distinct()],
        vec![older(), newer_similar(), distinct()],
        vec![distinct(), newer_similar(), older()],
    ];
    for items in orderings {
        let decision = dedup_stories(items, SIMILARITY_THRESHOLD);
        let kept: Vec<&str> = decision.kept.iter().map(|i| i.item_id.as_str()).collect();
        assert_eq!(kept, vec!["older", "distinct"]);
        assert_eq!(decision.skipped_to_keeper.len(), 1);
        assert_eq!(decision.skipped_to_keeper.get("newer").unwrap(), "older");
    }
}

#[test]
fn distinct_stories_all_survive() {
    let decision = dedup_stories(vec![older(), distinct()], SIMILARITY_THRESHOLD);
    assert_eq!(decision.kept.len(), 2);
    assert!(decision.skipped_to_keeper.is_empty());
}
