use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

use super::parser::{parse_feed, DecodeError, FeedDocument};

/// Default response body cap
pub const DEFAULT_MAX_FEED_BYTES: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while retrieving and decoding a feed.
///
/// None of these are fatal to the scheduler; they are logged and the source
/// waits for its next turn.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, body read)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Shutdown was requested while the request was in flight
    #[error("Fetch cancelled by shutdown")]
    Cancelled,
    /// Response body exceeded the size limit
    #[error("Response too large (limit {0} bytes)")]
    ResponseTooLarge(usize),
    /// Response was shorter than its Content-Length
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Body was retrieved but is not feed markup
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Retrieves feeds over HTTP with a bounded wait.
///
/// Holds one `reqwest::Client` for connection reuse. There is no retry here:
/// a failed source simply waits for its next turn in the scheduler.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
}

impl Fetcher {
    /// Builds a fetcher that identifies itself as `user_agent` and gives up on
    /// any single fetch after `timeout`.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self::with_client(client, timeout))
    }

    /// Wraps an existing client. Redirect policy is whatever the client carries.
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            max_bytes: DEFAULT_MAX_FEED_BYTES,
        }
    }

    pub fn max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetches `url` and parses the body into a [`FeedDocument`].
    ///
    /// The whole exchange (connect, headers, body) must finish within the
    /// configured timeout. If `shutdown` flips to `true` (or its sender is
    /// dropped) the request is abandoned immediately with
    /// [`FetchError::Cancelled`].
    ///
    /// # Errors
    ///
    /// - [`FetchError::Timeout`] - no complete response within the bound
    /// - [`FetchError::Cancelled`] - shutdown requested mid-fetch
    /// - [`FetchError::Network`] - connection or body-read failure
    /// - [`FetchError::HttpStatus`] - non-2xx response
    /// - [`FetchError::ResponseTooLarge`] - body over the size cap
    /// - [`FetchError::Decode`] - body is not RSS/Atom
    pub async fn fetch(
        &self,
        url: &str,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<FeedDocument, FetchError> {
        if *shutdown.borrow() {
            return Err(FetchError::Cancelled);
        }

        let bytes = tokio::select! {
            result = tokio::time::timeout(self.timeout, self.fetch_bytes(url)) => {
                result.map_err(|_| FetchError::Timeout(self.timeout))??
            }
            _ = wait_for_shutdown(shutdown) => {
                tracing::debug!(url = %url, "Fetch abandoned on shutdown");
                return Err(FetchError::Cancelled);
            }
        };

        Ok(parse_feed(&bytes)?)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, self.max_bytes).await
    }
}

/// Resolves once shutdown is requested or the sender side is gone.
pub(crate) async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
