use feed_rs::model::Text;
use feed_rs::parser;
use thiserror::Error;

use crate::util::decode_entities;

/// The payload was not recognisable RSS, Atom or JSON Feed markup.
#[derive(Debug, Error)]
#[error("Feed could not be parsed: {0}")]
pub struct DecodeError(#[from] parser::ParseFeedError);

/// Channel metadata plus entries in document order.
///
/// Transient: built per fetch, consumed by one ingestion pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedDocument {
    pub title: String,
    pub link: Option<String>,
    pub description: String,
    pub entries: Vec<Entry>,
}

/// One feed item before persistence.
///
/// `title` and `link` may be absent; the ingestion pipeline decides whether
/// the entry is usable. `published` is Unix seconds, `None` when missing or
/// unparseable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub published: Option<i64>,
}

/// Parses raw feed bytes into a [`FeedDocument`].
///
/// Only structurally invalid markup fails. Field-level problems degrade: an
/// entry with a date `feed-rs` cannot read keeps its other fields and gets
/// `published: None`.
///
/// Titles and descriptions, both channel and entry level, are HTML-entity
/// decoded.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedDocument, DecodeError> {
    let feed = parser::parse(bytes)?;

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry
                .links
                .into_iter()
                .map(|l| l.href.trim().to_string())
                .find(|href| !href.is_empty());
            let published = entry.published.or(entry.updated).map(|dt| dt.timestamp());
            let description = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .map(|d| decode_entities(&d).into_owned());

            Entry {
                title: non_empty_text(entry.title),
                link,
                description,
                published,
            }
        })
        .collect();

    Ok(FeedDocument {
        title: non_empty_text(feed.title).unwrap_or_default(),
        link: feed.links.into_iter().map(|l| l.href).next(),
        description: non_empty_text(feed.description).unwrap_or_default(),
        entries,
    })
}

fn non_empty_text(text: Option<Text>) -> Option<String> {
    text.map(|t| decode_entities(t.content.trim()).into_owned())
        .filter(|s| !s.is_empty())
}
