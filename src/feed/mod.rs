//! Feed retrieval and parsing.
//!
//! - [`parser`] - decodes RSS/Atom bytes into a [`FeedDocument`] using `feed-rs`,
//!   with HTML-entity decoding of titles and descriptions
//! - [`fetcher`] - bounded-time HTTP retrieval that hands the body to the parser
//!
//! # Example
//!
//! ```ignore
//! use gator::feed::Fetcher;
//!
//! let fetcher = Fetcher::new("gator/0.1", Duration::from_secs(30))?;
//! let (_tx, mut shutdown) = tokio::sync::watch::channel(false);
//! let doc = fetcher.fetch("https://example.com/index.xml", &mut shutdown).await?;
//! ```

mod fetcher;
mod parser;

pub(crate) use fetcher::wait_for_shutdown;
pub use fetcher::{FetchError, Fetcher, DEFAULT_MAX_FEED_BYTES};
pub use parser::{parse_feed, DecodeError, Entry, FeedDocument};
