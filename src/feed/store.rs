//! Storage capability used by the refresh engine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::repository::{FeedRepository, PostRepository};
use super::types::{CacheMetadata, Feed, NewPost};
use crate::db::Database;
use crate::Result;

/// Storage operations needed to refresh feeds.
///
/// Every write is atomic on its own. A failure of any call other than
/// [`list_all_feeds`](FeedStore::list_all_feeds) only affects the feed being
/// refreshed.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Load every known feed.
    async fn list_all_feeds(&self) -> Result<Vec<Feed>>;

    /// Look up a feed by URL.
    async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>>;

    /// Insert a post unless its (feed, guid) is already stored.
    ///
    /// Returns `true` when a row was inserted.
    async fn insert_post_if_absent(&self, post: &NewPost) -> Result<bool>;

    /// Replace a feed's display title.
    async fn update_feed_title(&self, feed_id: i64, title: &str) -> Result<()>;

    /// Stamp the last fetch that reached the server.
    async fn update_feed_last_fetched_at(&self, feed_id: i64, at: DateTime<Utc>) -> Result<()>;

    /// Overwrite validators and cache expiry.
    async fn update_feed_cache_metadata(&self, feed_id: i64, cache: &CacheMetadata)
        -> Result<()>;

    /// Stamp last-fetched-at and overwrite the cache metadata together.
    ///
    /// Implementations backed by a database should write both in one
    /// statement; the default issues two calls.
    async fn record_fetch(
        &self,
        feed_id: i64,
        fetched_at: DateTime<Utc>,
        cache: &CacheMetadata,
    ) -> Result<()> {
        self.update_feed_cache_metadata(feed_id, cache).await?;
        self.update_feed_last_fetched_at(feed_id, fetched_at).await
    }
}

#[async_trait]
impl FeedStore for Database {
    async fn list_all_feeds(&self) -> Result<Vec<Feed>> {
        FeedRepository::new(self.pool()).list_all().await
    }

    async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>> {
        FeedRepository::new(self.pool()).get_by_url(url).await
    }

    async fn insert_post_if_absent(&self, post: &NewPost) -> Result<bool> {
        let id = PostRepository::new(self.pool()).insert_if_absent(post).await?;
        Ok(id.is_some())
    }

    async fn update_feed_title(&self, feed_id: i64, title: &str) -> Result<()> {
        FeedRepository::new(self.pool())
            .update_title(feed_id, title)
            .await
    }

    async fn update_feed_last_fetched_at(&self, feed_id: i64, at: DateTime<Utc>) -> Result<()> {
        FeedRepository::new(self.pool())
            .update_last_fetched(feed_id, at)
            .await
    }

    async fn update_feed_cache_metadata(
        &self,
        feed_id: i64,
        cache: &CacheMetadata,
    ) -> Result<()> {
        FeedRepository::new(self.pool())
            .update_cache_metadata(feed_id, cache)
            .await
    }

    async fn record_fetch(
        &self,
        feed_id: i64,
        fetched_at: DateTime<Utc>,
        cache: &CacheMetadata,
    ) -> Result<()> {
        FeedRepository::new(self.pool())
            .record_fetch(feed_id, fetched_at, cache)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::sanitize::sanitize;
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn test_database_store() {
        let db = Database::open_in_memory().await.unwrap();
        let feed = FeedRepository::new(db.pool())
            .create("https://example.com/a.xml")
            .await
            .unwrap();
        let store: &dyn FeedStore = &db;

        let feeds = store.list_all_feeds().await.unwrap();
        assert_eq!(feeds.len(), 1);

        let post = NewPost {
            feed_id: feed.id,
            guid: "g".to_string(),
            title: "t".to_string(),
            link: String::new(),
            published_at: Utc::now(),
            content: sanitize("x"),
        };
        assert!(store.insert_post_if_absent(&post).await.unwrap());
        assert!(!store.insert_post_if_absent(&post).await.unwrap());

        store.update_feed_title(feed.id, "Example").await.unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        store.update_feed_last_fetched_at(feed.id, now).await.unwrap();

        let stored = store
            .get_feed_by_url("https://example.com/a.xml")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.title, "Example");
        assert_eq!(stored.last_fetched_at, Some(now));
        assert!(stored.cache_until.is_none());

        let cache = CacheMetadata {
            etag: None,
            last_modified: None,
            cache_until: now + Duration::hours(1),
        };
        store.update_feed_cache_metadata(feed.id, &cache).await.unwrap();
        let stored = store.list_all_feeds().await.unwrap().remove(0);
        assert_eq!(stored.cache_until, Some(cache.cache_until));
        assert_eq!(stored.last_fetched_at, Some(now));
    }
}
