//! Feed and post types for RSSGrid.

use chrono::{DateTime, Utc};

use super::sanitize::{sanitize, SanitizedHtml};

/// A subscribed feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Feed {
    /// Feed ID.
    pub id: i64,
    /// Feed URL (unique).
    pub url: String,
    /// Feed title; empty until the first successful fetch.
    pub title: String,
    /// Validator from the last ETag header.
    pub etag: Option<String>,
    /// Token from the last Last-Modified header.
    pub last_modified: Option<String>,
    /// Fetches may be skipped until this time.
    pub cache_until: Option<DateTime<Utc>>,
    /// Last fetch attempt that reached the server.
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// When the feed was created.
    pub created_at: DateTime<Utc>,
}

/// Freshness metadata extracted from a successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheMetadata {
    /// ETag header, verbatim.
    pub etag: Option<String>,
    /// Last-Modified header, verbatim.
    pub last_modified: Option<String>,
    /// Fetches may be skipped until this time.
    pub cache_until: DateTime<Utc>,
}

/// A stored post.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    /// Post ID.
    pub id: i64,
    /// Feed this post belongs to.
    pub feed_id: i64,
    /// Feed-supplied GUID, or the link when the feed has none.
    pub guid: String,
    /// Post title.
    pub title: String,
    /// Link to the original article.
    pub link: String,
    /// Publication time.
    pub published_at: DateTime<Utc>,
    /// Sanitized HTML body.
    pub content: String,
}

/// A post together with a user's read state.
#[derive(Debug, Clone, PartialEq)]
pub struct UserPost {
    /// The post.
    pub post: Post,
    /// Whether the user has seen it.
    pub seen: bool,
}

/// A feed as it appears on a user's grid.
#[derive(Debug, Clone, PartialEq)]
pub struct UserFeed {
    /// The feed.
    pub feed: Feed,
    /// Position on the grid, starting at 0.
    pub grid_position: i64,
}

/// A post ready to be stored.
///
/// The body can only be a [`SanitizedHtml`], so unsanitized markup never
/// reaches the database.
#[derive(Debug, Clone)]
pub struct NewPost {
    /// Feed ID.
    pub feed_id: i64,
    /// Identity within the feed.
    pub guid: String,
    /// Post title.
    pub title: String,
    /// Link to the original article.
    pub link: String,
    /// Publication time.
    pub published_at: DateTime<Utc>,
    /// Sanitized body.
    pub content: SanitizedHtml,
}

impl NewPost {
    /// Build a post from a parsed item, sanitizing its body.
    ///
    /// Returns `None` when the item has neither a GUID nor a link.
    /// Items without any timestamp are dated `now`.
    pub fn from_parsed(feed_id: i64, item: &ParsedItem, now: DateTime<Utc>) -> Option<Self> {
        let guid = item.identity()?.to_string();
        Some(Self {
            feed_id,
            guid,
            title: item.title.clone(),
            link: item.link.clone(),
            published_at: item.published_at.unwrap_or(now),
            content: sanitize(&item.content),
        })
    }
}

/// Parsed feed document.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    /// Feed title, possibly empty.
    pub title: String,
    /// Parsed items in document order.
    pub items: Vec<ParsedItem>,
}

/// Parsed feed item.
#[derive(Debug, Clone, Default)]
pub struct ParsedItem {
    /// Feed-supplied identifier; empty when absent.
    pub guid: String,
    /// Item title.
    pub title: String,
    /// Link to the original article; empty when absent.
    pub link: String,
    /// Explicit published time, else explicit updated time.
    pub published_at: Option<DateTime<Utc>>,
    /// Raw, untrusted body markup.
    pub content: String,
}

impl ParsedItem {
    /// Identity of this item within its feed: the GUID, else the link.
    pub fn identity(&self) -> Option<&str> {
        [self.guid.trim(), self.link.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
    }
}
