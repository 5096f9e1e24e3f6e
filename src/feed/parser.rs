//! Feed document parsing.
//!
//! RSS, Atom and JSON Feed documents are normalized into [`ParsedFeed`].
//! Bodies are returned raw; sanitization happens when a [`NewPost`] is built.
//!
//! [`NewPost`]: super::types::NewPost

use feed_rs::model::Entry;
use feed_rs::parser;

use super::types::{ParsedFeed, ParsedItem};
use crate::{Result, RssGridError};

/// Parse feed bytes into a [`ParsedFeed`].
///
/// Entries without an id keep an empty GUID so callers can fall back to the
/// link.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed> {
    let parser = parser::Builder::new()
        .id_generator(|_links, _title, _uri| String::new())
        .build();

    let feed = parser
        .parse(bytes)
        .map_err(|e| RssGridError::Parse(e.to_string()))?;

    let title = feed
        .title
        .map(|t| t.content.trim().to_string())
        .unwrap_or_default();

    let items = feed.entries.into_iter().map(parse_entry).collect();

    Ok(ParsedFeed { title, items })
}

fn parse_entry(entry: Entry) -> ParsedItem {
    let title = entry
        .title
        .map(|t| t.content.trim().to_string())
        .unwrap_or_default();
    let link = entry
        .links
        .into_iter()
        .next()
        .map(|l| l.href)
        .unwrap_or_default();

    // Prefer the full body, fall back to the summary/description
    let body = entry
        .content
        .and_then(|c| c.body)
        .filter(|b| !b.trim().is_empty());
    let content = body
        .or_else(|| entry.summary.map(|s| s.content))
        .unwrap_or_default();

    ParsedItem {
        guid: entry.id.trim().to_string(),
        title,
        link,
        published_at: entry.published.or(entry.updated),
        content,
    }
}
