//! Store contracts consumed by the scheduler and the ingestion pipeline.
//!
//! [`Database`](super::Database) implements both traits against SQLite. Tests
//! substitute in-memory fakes to inject failures.

use std::future::Future;

use super::types::{CreatePost, DatabaseError, NewPost, Source};

/// Read and timestamp access to subscribed sources.
pub trait SourceStore: Send + Sync {
    /// The source that has gone longest without an attempt.
    ///
    /// Never-fetched sources (`last_fetched_at IS NULL`) come first; ties are
    /// broken by ascending id. `Ok(None)` means there are no sources at all.
    fn next_source_to_fetch(
        &self,
    ) -> impl Future<Output = Result<Option<Source>, DatabaseError>> + Send;

    /// Record an attempt on `source_id` at `fetched_at` (Unix seconds).
    ///
    /// After this call the source must sort after every other source, even
    /// when several attempts share the same second.
    fn mark_source_fetched(
        &self,
        source_id: i64,
        fetched_at: i64,
    ) -> impl Future<Output = Result<(), DatabaseError>> + Send;

    fn source_by_url(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Option<Source>, DatabaseError>> + Send;
}

/// Insert-only access to posts.
pub trait PostStore: Send + Sync {
    /// Persist `post`. A URL collision is reported as
    /// [`CreatePost::DuplicateUrl`], never as an error.
    fn create_post(
        &self,
        post: &NewPost,
    ) -> impl Future<Output = Result<CreatePost, DatabaseError>> + Send;
}
