// tests/rss_parse.rs
use feedreel::ingest::rss::parse_feed;
use feedreel::ingest::types::FeedConfig;

const FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Example Sports</title>
    <item>
      <title>Big upset in state final</title>
      <link>https://example.test/news/upset</link>
      <guid isPermaLink="false">upset-123</guid>
      <pubDate>Tue, 09 Jan 2024 22:00:00 GMT</pubDate>
      <description>&lt;p&gt;Team Alpha &amp;amp; Team Beta went down to the wire.&lt;/p&gt;&lt;img src="https://cdn.example.test/inline.jpg"/&gt;</description>
      <enclosure url="https://cdn.example.test/hero.jpg" type="image/jpeg" length="1024"/>
      <media:thumbnail url="https://cdn.example.test/thumb.png"/>
    </item>
    <item>
      <title>Coach press conference</title>
      <link>https://example.test/news/presser</link>
      <pubDate>Wed, 10 Jan 2024 09:30:00 GMT</pubDate>
      <description>No pictures in this one.</description>
    </item>
  </channel>
</rss>
"#;

fn cfg() -> FeedConfig {
    FeedConfig {
        name: "Example".into(),
        url: "https://example.test/rss".into(),
    }
}

#[test]
fn parses_items_with_ids_and_images() {
    let items = parse_feed(FIXTURE, &cfg()).unwrap();
    assert_eq!(items.len(), 2);

    let first = &items[0];
    assert_eq!(first.item_id, "guid:upset-123");
    assert_eq!(first.title, "Big upset in state final");
    assert_eq!(first.summary, "Team Alpha & Team Beta went down to the wire.");
    assert_eq!(first.published, "Tue, 09 Jan 2024 22:00:00 GMT");
    // Enclosure first, then media thumbnail, then inline <img>; deduped.
    assert_eq!(
        first.image_urls,
        vec![
            "https://cdn.example.test/hero.jpg".to_string(),
            "https://cdn.example.test/thumb.png".to_string(),
            "https://cdn.example.test/inline.jpg".to_string(),
        ]
    );

    let second = &items[1];
    // No guid: the link becomes the identity.
    assert_eq!(second.item_id, "link:https://example.test/news/presser");
    assert!(second.image_urls.is_empty());
}

#[test]
fn missing_fields_fall_back_to_hash_identity() {
    let minimal = r#"<rss version="2.0"><channel><item>
        <title>Untracked story</title>
        <pubDate>Tue, 09 Jan 2024 22:00:00 GMT</pubDate>
    </item></channel></rss>"#;
    let items = parse_feed(minimal, &cfg()).unwrap();
    assert_eq!(items.len(), 1);
    assert!(items[0].item_id.starts_with("hash:"));

    // Same title + date, same identity on a later run.
    let again = parse_feed(minimal, &cfg()).unwrap();
    assert_eq!(items[0].item_id, again[0].item_id);
}

#[test]
fn malformed_xml_is_an_error() {
    assert!(parse_feed("this is not xml", &cfg()).is_err());
}
