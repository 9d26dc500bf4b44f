//! Periodic RSS/Atom aggregation into SQLite.
//!
//! The [`scheduler::Scheduler`] picks the stalest [`storage::Source`] each
//! tick, retrieves it with a [`feed::Fetcher`], and hands the parsed
//! [`feed::FeedDocument`] to [`ingest::ingest`], which stores one
//! [`storage::Post`] per previously unseen URL.

pub mod config;
pub mod feed;
pub mod ingest;
pub mod scheduler;
pub mod storage;
pub mod util;
