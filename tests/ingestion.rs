//! Integration tests for parsing and ingesting feeds into SQLite.
//!
//! Each test creates its own in-memory database. These exercise the parser,
//! the ingestion pipeline and the post store together.

use gator::feed::{parse_feed, Entry, FeedDocument};
use gator::ingest::ingest;
use gator::storage::Database;
use pretty_assertions::assert_eq;

async fn db_with_source(url: &str) -> (Database, i64) {
    let db = Database::open(":memory:").await.unwrap();
    let account = db.create_account("reader").await.unwrap();
    let source = db.create_source("Feed", url, account.id).await.unwrap();
    (db, source.id)
}

fn document_with(n: usize) -> FeedDocument {
    FeedDocument {
        title: "Generated".to_string(),
        link: Some("https://gen.example.com/".to_string()),
        description: String::new(),
        entries: (0..n)
            .map(|i| Entry {
                title: Some(format!("Post {i}")),
                link: Some(format!("https://gen.example.com/posts/{i}")),
                description: Some(format!("Body {i}")),
                published: Some(1_700_000_000 + i as i64),
            })
            .collect(),
    }
}

// ============================================================================
// Deduplication
// ============================================================================

#[tokio::test]
async fn test_reingest_is_idempotent_for_various_sizes() {
    for n in [0usize, 1, 2, 7, 60] {
        let (db, source_id) = db_with_source("https://gen.example.com/rss").await;
        let doc = document_with(n);

        let first = ingest(&db, source_id, &doc).await;
        assert_eq!(first.created, n, "first pass, n = {n}");
        assert_eq!(first.duplicates, 0);

        let second = ingest(&db, source_id, &doc).await;
        assert_eq!(second.created, 0, "second pass, n = {n}");
        assert_eq!(second.duplicates, n);
        assert!(second.failures.is_empty());

        assert_eq!(db.count_posts().await.unwrap(), n as i64);
    }
}

#[tokio::test]
async fn test_only_new_entries_created_on_republish() {
    let (db, source_id) = db_with_source("https://gen.example.com/rss").await;

    ingest(&db, source_id, &document_with(3)).await;
    let report = ingest(&db, source_id, &document_with(5)).await;

    assert_eq!(report.created, 2);
    assert_eq!(report.duplicates, 3);
    assert_eq!(db.count_posts().await.unwrap(), 5);
}

#[tokio::test]
async fn test_same_url_from_two_sources_stored_once() {
    let db = Database::open(":memory:").await.unwrap();
    let account = db.create_account("reader").await.unwrap();
    let a = db
        .create_source("A", "https://a.example.com/rss", account.id)
        .await
        .unwrap();
    let b = db
        .create_source("B", "https://b.example.com/rss", account.id)
        .await
        .unwrap();

    let doc = document_with(2);
    assert_eq!(ingest(&db, a.id, &doc).await.created, 2);
    assert_eq!(ingest(&db, b.id, &doc).await.duplicates, 2);
    assert!(db.get_posts_for_source(b.id).await.unwrap().is_empty());
}

// ============================================================================
// Partial failure
// ============================================================================

#[tokio::test]
async fn test_malformed_date_does_not_drop_entry() {
    let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Mixed dates</title>
    <link>https://mixed.example.com/</link>
    <description>Some good, some bad</description>
    <item>
        <title>Valid one</title>
        <link>https://mixed.example.com/1</link>
        <pubDate>Tue, 02 Jan 2024 08:30:00 +0000</pubDate>
    </item>
    <item>
        <title>Broken date</title>
        <link>https://mixed.example.com/2</link>
        <pubDate>32nd of Smarch</pubDate>
    </item>
    <item>
        <title>Valid two</title>
        <link>https://mixed.example.com/3</link>
        <pubDate>Wed, 03 Jan 2024 08:30:00 +0000</pubDate>
    </item>
</channel></rss>"#;

    let (db, source_id) = db_with_source("https://mixed.example.com/rss").await;
    let doc = parse_feed(rss.as_bytes()).unwrap();
    let report = ingest(&db, source_id, &doc).await;

    assert_eq!(report.created, 3);
    assert!(report.failures.is_empty());

    let posts = db.get_posts_for_source(source_id).await.unwrap();
    let broken = posts
        .iter()
        .find(|p| p.url == "https://mixed.example.com/2")
        .unwrap();
    assert_eq!(broken.published_at, None);
    assert_eq!(broken.title, "Broken date");

    let valid = posts
        .iter()
        .find(|p| p.url == "https://mixed.example.com/1")
        .unwrap();
    assert_eq!(valid.published_at, Some(1_704_184_200));
}

#[tokio::test]
async fn test_entity_encoded_titles_stored_decoded() {
    let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Encoded</title>
    <link>https://enc.example.com/</link>
    <description>d</description>
    <item>
        <title>Caf&amp;eacute; &amp;amp; Bar</title>
        <link>https://enc.example.com/1</link>
        <description>&amp;lt;p&amp;gt;Hello&amp;lt;/p&amp;gt;</description>
    </item>
</channel></rss>"#;

    let (db, source_id) = db_with_source("https://enc.example.com/rss").await;
    let doc = parse_feed(rss.as_bytes()).unwrap();
    ingest(&db, source_id, &doc).await;

    let posts = db.get_posts_for_source(source_id).await.unwrap();
    assert_eq!(posts[0].title, "Café & Bar");
    assert_eq!(posts[0].description.as_deref(), Some("<p>Hello</p>"));
}

#[tokio::test]
async fn test_post_for_deleted_source_is_failure_not_abort() {
    let (db, source_id) = db_with_source("https://gen.example.com/rss").await;
    db.delete_all_accounts().await.unwrap();

    let report = ingest(&db, source_id, &document_with(2)).await;
    assert_eq!(report.created, 0);
    assert_eq!(report.failed(), 2, "each entry attempted and failed");
}
