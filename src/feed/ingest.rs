//! Writing parsed feeds to storage.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::store::FeedStore;
use super::types::{Feed, NewPost, ParsedFeed};
use crate::Result;

/// Store a parsed document for `feed`.
///
/// Updates the title when the parsed one is non-empty and different, then
/// inserts every item not yet stored. Returns the number of new posts.
/// Items with neither a GUID nor a link are skipped.
pub async fn ingest<S: FeedStore + ?Sized>(
    store: &S,
    feed: &Feed,
    parsed: &ParsedFeed,
    now: DateTime<Utc>,
) -> Result<usize> {
    if !parsed.title.is_empty() && parsed.title != feed.title {
        store.update_feed_title(feed.id, &parsed.title).await?;
    }

    let mut inserted = 0;
    for item in &parsed.items {
        let Some(post) = NewPost::from_parsed(feed.id, item, now) else {
            debug!(feed = %feed.url, title = %item.title, "Skipping item without guid or link");
            continue;
        };
        if store.insert_post_if_absent(&post).await? {
            inserted += 1;
        }
    }

    Ok(inserted)
}
