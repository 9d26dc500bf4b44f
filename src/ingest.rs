//! Converts a parsed feed into persisted posts.
//!
//! Deduplication rests entirely on the store's unique constraint on post URL:
//! there is no in-memory set of seen URLs, so re-ingesting an unchanged feed
//! creates nothing and reports every entry as a duplicate.

use serde::Serialize;

use crate::feed::{Entry, FeedDocument};
use crate::storage::{CreatePost, NewPost, PostStore};

/// Title stored for entries that arrive without one
const UNTITLED: &str = "Untitled";

/// Outcome of one ingestion pass over a [`FeedDocument`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestionReport {
    pub created: usize,
    pub duplicates: usize,
    pub failures: Vec<IngestFailure>,
}

/// An entry that could not be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestFailure {
    /// The entry's link, if it had one
    pub url: Option<String>,
    pub error: String,
}

impl IngestionReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Number of entries examined
    pub fn total(&self) -> usize {
        self.created + self.duplicates + self.failed()
    }
}

/// Stores every entry of `doc` as a post owned by `source_id`.
///
/// Entries are processed in document order. A duplicate URL is counted and
/// skipped; any other store error is recorded in the report and processing
/// moves on to the next entry. This function never fails as a whole.
pub async fn ingest<S>(store: &S, source_id: i64, doc: &FeedDocument) -> IngestionReport
where
    S: PostStore + ?Sized,
{
    let mut report = IngestionReport::default();

    for entry in &doc.entries {
        let now = chrono::Utc::now().timestamp();
        let Some(post) = candidate_post(source_id, entry, now) else {
            tracing::warn!(
                source_id = source_id,
                title = entry.title.as_deref().unwrap_or(UNTITLED),
                "Skipping entry without a link"
            );
            report.failures.push(IngestFailure {
                url: None,
                error: "entry has no link".to_string(),
            });
            continue;
        };

        match store.create_post(&post).await {
            Ok(CreatePost::Created(created)) => {
                tracing::debug!(source_id = source_id, post_id = created.id, url = %created.url, "Created post");
                report.created += 1;
            }
            Ok(CreatePost::DuplicateUrl) => {
                tracing::debug!(source_id = source_id, url = %post.url, "Post already stored");
                report.duplicates += 1;
            }
            Err(e) => {
                tracing::warn!(source_id = source_id, url = %post.url, error = %e, "Couldn't create post");
                report.failures.push(IngestFailure {
                    url: Some(post.url),
                    error: e.to_string(),
                });
            }
        }
    }

    report
}

/// Builds the post to insert for `entry`, or `None` when it has no link.
fn candidate_post(source_id: i64, entry: &Entry, now: i64) -> Option<NewPost> {
    let url = entry.link.clone()?;
    Some(NewPost {
        source_id,
        title: entry.title.clone().unwrap_or_else(|| UNTITLED.to_string()),
        url,
        description: entry.description.clone().filter(|d| !d.trim().is_empty()),
        published_at: entry.published,
        created_at: now,
        updated_at: now,
    })
}
