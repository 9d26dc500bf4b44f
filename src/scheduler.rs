//! Fixed-interval poll loop.
//!
//! Each tick selects the single source that has gone longest without an
//! attempt, fetches it, ingests whatever parsed, and stamps the source's
//! `last_fetched_at` whether or not any of that worked. A source that always
//! fails therefore moves to the back of the queue like any other and cannot
//! starve the rest.
//!
//! Ticks are strictly sequential. There is no retry beyond waiting for the
//! source's next natural turn.

use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::config::ConfigError;
use crate::feed::{wait_for_shutdown, FetchError, Fetcher};
use crate::ingest::{ingest, IngestionReport};
use crate::storage::{DatabaseError, PostStore, Source, SourceStore};
use crate::util::{validate_url, UrlValidationError};

/// Errors from the one-shot [`Scheduler::ingest_url`] path.
#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    InvalidUrl(#[from] UrlValidationError),
    #[error("No source is registered for {0}")]
    UnknownSource(String),
    #[error(transparent)]
    Store(#[from] DatabaseError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// What a single tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// The store holds no sources
    Idle,
    /// The store could not be asked for a source
    SelectionFailed(DatabaseError),
    /// One source was attempted
    Polled {
        source: Source,
        result: Result<IngestionReport, FetchError>,
    },
}

/// Drives fetch → parse → ingest for one source per tick.
///
/// Owns its store handle and HTTP client for the life of the process.
pub struct Scheduler<S> {
    store: S,
    fetcher: Fetcher,
}

impl<S> Scheduler<S>
where
    S: SourceStore + PostStore,
{
    pub fn new(store: S, fetcher: Fetcher) -> Self {
        Self { store, fetcher }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Polls one source every `interval` until `shutdown` becomes `true` (or
    /// its sender is dropped).
    ///
    /// The first tick fires immediately. If a tick overruns the interval the
    /// next one is delayed rather than bunched up. Per-source failures are
    /// logged and never end the loop.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidPollInterval`] for a zero interval; the loop is not
    /// started.
    pub async fn run(
        &self,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::InvalidPollInterval);
        }

        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_secs = interval.as_secs_f64(), "Collecting feeds");

        loop {
            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                _ = timer.tick() => {}
            }

            self.tick(&mut shutdown).await;

            if *shutdown.borrow() {
                break;
            }
        }

        tracing::info!("Feed collection stopped");
        Ok(())
    }

    /// Runs exactly one selection and poll.
    pub async fn tick(&self, shutdown: &mut watch::Receiver<bool>) -> TickOutcome {
        let source = match self.store.next_source_to_fetch().await {
            Ok(Some(source)) => source,
            Ok(None) => {
                tracing::debug!("No sources to fetch");
                return TickOutcome::Idle;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Couldn't select next source");
                return TickOutcome::SelectionFailed(e);
            }
        };

        let result = self.poll_source(&source, shutdown).await;
        TickOutcome::Polled { source, result }
    }

    /// One fetch-and-ingest cycle for the registered source at `url`, outside
    /// the tick schedule. The source's `last_fetched_at` is stamped as for a
    /// scheduled poll.
    ///
    /// `url` is normalized the same way as at registration, so
    /// `https://Blog.example.com` finds the source stored as
    /// `https://blog.example.com/`.
    pub async fn ingest_url(
        &self,
        url: &str,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<IngestionReport, PollError> {
        let url = validate_url(url)?;
        let source = self
            .store
            .source_by_url(url.as_str())
            .await?
            .ok_or_else(|| PollError::UnknownSource(url.to_string()))?;

        Ok(self.poll_source(&source, shutdown).await?)
    }

    async fn poll_source(
        &self,
        source: &Source,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<IngestionReport, FetchError> {
        let fetched = self.fetcher.fetch(&source.url, shutdown).await;

        let result = match fetched {
            Ok(doc) => {
                let report = ingest(&self.store, source.id, &doc).await;
                tracing::info!(
                    source_id = source.id,
                    name = %source.name,
                    entries = doc.entries.len(),
                    created = report.created,
                    duplicates = report.duplicates,
                    failed = report.failed(),
                    "Polled source"
                );
                Ok(report)
            }
            Err(e) => {
                tracing::warn!(source_id = source.id, url = %source.url, error = %e, "Couldn't fetch feed");
                Err(e)
            }
        };

        // Stamped on every attempt so a broken source waits its turn
        let now = chrono::Utc::now().timestamp();
        if let Err(e) = self.store.mark_source_fetched(source.id, now).await {
            tracing::warn!(source_id = source.id, error = %e, "Couldn't mark source fetched");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{CreatePost, NewPost};
    use std::sync::Mutex;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Single-source store that can refuse selection or stamping.
    struct FlakyStore {
        source: Source,
        fail_select: bool,
        fail_mark: bool,
        marks: Mutex<Vec<i64>>,
    }

    impl FlakyStore {
        fn new(url: &str) -> Self {
            Self {
                source: Source {
                    id: 1,
                    name: "Flaky".to_string(),
                    url: url.to_string(),
                    account_id: 1,
                    created_at: 0,
                    updated_at: 0,
                    last_fetched_at: None,
                },
                fail_select: false,
                fail_mark: false,
                marks: Mutex::new(Vec::new()),
            }
        }
    }

    impl SourceStore for FlakyStore {
        async fn next_source_to_fetch(&self) -> Result<Option<Source>, DatabaseError> {
            if self.fail_select {
                return Err(DatabaseError::InstanceLocked);
            }
            Ok(Some(self.source.clone()))
        }

        async fn mark_source_fetched(&self, source_id: i64, _fetched_at: i64) -> Result<(), DatabaseError> {
            self.marks.lock().unwrap().push(source_id);
            if self.fail_mark {
                return Err(DatabaseError::NotFound(format!("source {}", source_id)));
            }
            Ok(())
        }

        async fn source_by_url(&self, url: &str) -> Result<Option<Source>, DatabaseError> {
            Ok((url == self.source.url).then(|| self.source.clone()))
        }
    }

    impl PostStore for FlakyStore {
        async fn create_post(&self, _post: &NewPost) -> Result<CreatePost, DatabaseError> {
            Ok(CreatePost::DuplicateUrl)
        }
    }

    const ONE_ITEM: &str = r#"<rss version="2.0"><channel><title>t</title>
        <item><title>x</title><link>https://flaky.example.com/1</link></item>
        </channel></rss>"#;

    async fn feed_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ONE_ITEM))
            .mount(&server)
            .await;
        server
    }

    fn fetcher() -> Fetcher {
        Fetcher::new("gator-test", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_selection_failure_skips_tick() {
        let mut store = FlakyStore::new("http://127.0.0.1:9/unused");
        store.fail_select = true;
        let scheduler = Scheduler::new(store, fetcher());
        let (_tx, mut shutdown) = watch::channel(false);

        let outcome = scheduler.tick(&mut shutdown).await;
        assert!(matches!(
            outcome,
            TickOutcome::SelectionFailed(DatabaseError::InstanceLocked)
        ));
        assert!(scheduler.store().marks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_failure_keeps_poll_result() {
        let server = feed_server().await;
        let mut store = FlakyStore::new(&format!("{}/rss", server.uri()));
        store.fail_mark = true;
        let scheduler = Scheduler::new(store, fetcher());
        let (_tx, mut shutdown) = watch::channel(false);

        match scheduler.tick(&mut shutdown).await {
            TickOutcome::Polled { result, .. } => {
                let report = result.unwrap();
                assert_eq!(report.duplicates, 1);
            }
            other => panic!("expected a poll, got {other:?}"),
        }
        assert_eq!(*scheduler.store().marks.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_cancelled_fetch_still_marks_source() {
        let store = FlakyStore::new("http://127.0.0.1:9/unused");
        let scheduler = Scheduler::new(store, fetcher());
        let (_tx, mut shutdown) = watch::channel(true);

        match scheduler.tick(&mut shutdown).await {
            TickOutcome::Polled { result, .. } => {
                assert!(matches!(result, Err(FetchError::Cancelled)));
            }
            other => panic!("expected a poll, got {other:?}"),
        }
        assert_eq!(scheduler.store().marks.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_after_shutdown_during_tick() {
        let server = feed_server().await;
        let store = FlakyStore::new(&format!("{}/rss", server.uri()));
        let scheduler = Scheduler::new(store, fetcher());
        let (tx, shutdown) = watch::channel(false);
        tx.send(true).unwrap();

        scheduler
            .run(Duration::from_millis(10), shutdown)
            .await
            .unwrap();
        assert!(scheduler.store().marks.lock().unwrap().is_empty());
    }
}
