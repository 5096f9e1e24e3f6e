//! User subscriptions and grid layout.
//!
//! Feeds are shared: subscribing to a URL someone else already follows reuses
//! the existing feed row, and a feed is removed once nobody follows it.

use super::fetcher::validate_url;
use super::repository::{FeedRepository, FeedRow};
use super::types::{Feed, UserFeed};
use crate::db::DbPool;
use crate::{Result, RssGridError};

/// Row type for a feed on a user's grid.
#[derive(Debug, Clone, sqlx::FromRow)]
struct UserFeedRow {
    #[sqlx(flatten)]
    feed: FeedRow,
    grid_position: i64,
}

impl From<UserFeedRow> for UserFeed {
    fn from(row: UserFeedRow) -> Self {
        UserFeed {
            feed: row.feed.into(),
            grid_position: row.grid_position,
        }
    }
}

/// Repository for subscription operations.
pub struct SubscriptionRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> SubscriptionRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Subscribe a user to a feed URL.
    ///
    /// The feed is placed after the user's existing feeds. Subscribing twice
    /// is a no-op that returns the same feed.
    pub async fn subscribe(&self, user_id: i64, url: &str) -> Result<Feed> {
        let url = url.trim();
        validate_url(url, true)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR IGNORE INTO feeds (url) VALUES ($1)")
            .bind(url)
            .execute(&mut *tx)
            .await?;

        let feed_id: i64 = sqlx::query_scalar("SELECT id FROM feeds WHERE url = $1")
            .bind(url)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO user_feeds (user_id, feed_id, grid_position)
            SELECT $1, $2, COALESCE(MAX(grid_position) + 1, 0)
            FROM user_feeds
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(feed_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        FeedRepository::new(self.pool)
            .get_by_id(feed_id)
            .await?
            .ok_or_else(|| RssGridError::NotFound(format!("feed {feed_id}")))
    }

    /// List a user's feeds in grid order.
    pub async fn list_user_feeds(&self, user_id: i64) -> Result<Vec<UserFeed>> {
        let rows = sqlx::query_as::<_, UserFeedRow>(
            r#"
            SELECT f.id, f.url, f.title, f.etag, f.last_modified, f.cache_until,
                   f.last_fetched_at, f.created_at, uf.grid_position
            FROM user_feeds uf
            JOIN feeds f ON f.id = uf.feed_id
            WHERE uf.user_id = $1
            ORDER BY uf.grid_position, f.id
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(UserFeed::from).collect())
    }

    /// Remove a feed from a user's grid.
    ///
    /// When no other user follows the feed it is deleted along with its
    /// posts. Returns `false` if the user was not subscribed.
    pub async fn unsubscribe(&self, user_id: i64, feed_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM user_feeds WHERE user_id = $1 AND feed_id = $2")
            .bind(user_id)
            .bind(feed_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed > 0 {
            sqlx::query(
                r#"
                DELETE FROM feeds
                WHERE id = $1
                  AND NOT EXISTS (SELECT 1 FROM user_feeds WHERE feed_id = $1)
                "#,
            )
            .bind(feed_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, UserRepository};
    use crate::feed::repository::PostRepository;
    use crate::feed::sanitize::sanitize;
    use crate::feed::types::NewPost;
    use chrono::Utc;

    async fn setup() -> (Database, i64, i64) {
        let db = Database::open_in_memory().await.unwrap();
        let users = UserRepository::new(db.pool());
        let alice = users.get_or_create("alice", "issuer").await.unwrap();
        let bob = users.get_or_create("bob", "issuer").await.unwrap();
        (db, alice, bob)
    }

    #[tokio::test]
    async fn test_subscribe_appends_to_grid() {
        let (db, alice, _) = setup().await;
        let repo = SubscriptionRepository::new(db.pool());

        let a = repo.subscribe(alice, "https://ex.com/a.xml").await.unwrap();
        let b = repo.subscribe(alice, " https://ex.com/b.xml ").await.unwrap();
        assert_eq!(b.url, "https://ex.com/b.xml");

        let feeds = repo.list_user_feeds(alice).await.unwrap();
        let layout: Vec<_> = feeds.iter().map(|f| (f.feed.id, f.grid_position)).collect();
        assert_eq!(layout, [(a.id, 0), (b.id, 1)]);
    }

    #[tokio::test]
    async fn test_subscribe_is_idempotent_and_shared() {
        let (db, alice, bob) = setup().await;
        let repo = SubscriptionRepository::new(db.pool());

        let first = repo.subscribe(alice, "https://ex.com/a.xml").await.unwrap();
        let again = repo.subscribe(alice, "https://ex.com/a.xml").await.unwrap();
        let shared = repo.subscribe(bob, "https://ex.com/a.xml").await.unwrap();

        assert_eq!(first.id, again.id);
        assert_eq!(first.id, shared.id);
        assert_eq!(repo.list_user_feeds(alice).await.unwrap().len(), 1);
        assert_eq!(FeedRepository::new(db.pool()).count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_rejects_invalid_url() {
        let (db, alice, _) = setup().await;
        let repo = SubscriptionRepository::new(db.pool());

        assert!(matches!(
            repo.subscribe(alice, "ftp://ex.com/feed").await,
            Err(RssGridError::Validation(_))
        ));
        assert!(matches!(
            repo.subscribe(alice, "not a url").await,
            Err(RssGridError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_orphaned_feed() {
        let (db, alice, bob) = setup().await;
        let repo = SubscriptionRepository::new(db.pool());
        let feeds = FeedRepository::new(db.pool());
        let posts = PostRepository::new(db.pool());

        let feed = repo.subscribe(alice, "https://ex.com/a.xml").await.unwrap();
        repo.subscribe(bob, "https://ex.com/a.xml").await.unwrap();
        posts
            .insert_if_absent(&NewPost {
                feed_id: feed.id,
                guid: "g1".to_string(),
                title: String::new(),
                link: String::new(),
                published_at: Utc::now(),
                content: sanitize(""),
            })
            .await
            .unwrap();

        // Bob still follows it
        assert!(repo.unsubscribe(alice, feed.id).await.unwrap());
        assert!(feeds.get_by_id(feed.id).await.unwrap().is_some());
        assert!(!repo.unsubscribe(alice, feed.id).await.unwrap());

        assert!(repo.unsubscribe(bob, feed.id).await.unwrap());
        assert!(feeds.get_by_id(feed.id).await.unwrap().is_none());
        assert_eq!(posts.count_by_feed(feed.id).await.unwrap(), 0);
    }
}
