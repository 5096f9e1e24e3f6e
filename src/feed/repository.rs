//! Feed and post repositories for RSSGrid.

use chrono::{DateTime, Utc};

use super::types::{CacheMetadata, Feed, NewPost, Post, UserPost};
use crate::db::{format_datetime, parse_datetime, DbPool};
use crate::{Result, RssGridError};

const FEED_COLUMNS: &str =
    "id, url, title, etag, last_modified, cache_until, last_fetched_at, created_at";

/// Row type for feed from database.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct FeedRow {
    id: i64,
    url: String,
    title: String,
    etag: Option<String>,
    last_modified: Option<String>,
    cache_until: Option<String>,
    last_fetched_at: Option<String>,
    created_at: String,
}

impl From<FeedRow> for Feed {
    fn from(row: FeedRow) -> Self {
        Feed {
            id: row.id,
            url: row.url,
            title: row.title,
            etag: row.etag,
            last_modified: row.last_modified,
            cache_until: row.cache_until.and_then(|s| parse_datetime(&s)),
            last_fetched_at: row.last_fetched_at.and_then(|s| parse_datetime(&s)),
            created_at: parse_datetime(&row.created_at).unwrap_or_else(Utc::now),
        }
    }
}

/// Row type for post from database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct PostRow {
    id: i64,
    feed_id: i64,
    guid: String,
    title: String,
    link: String,
    published_at: String,
    content: String,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id: row.id,
            feed_id: row.feed_id,
            guid: row.guid,
            title: row.title,
            link: row.link,
            published_at: parse_datetime(&row.published_at).unwrap_or_else(Utc::now),
            content: row.content,
        }
    }
}

/// Row type for post joined with a user's read state.
#[derive(Debug, Clone, sqlx::FromRow)]
struct UserPostRow {
    #[sqlx(flatten)]
    post: PostRow,
    seen: i64,
}

impl From<UserPostRow> for UserPost {
    fn from(row: UserPostRow) -> Self {
        UserPost {
            post: row.post.into(),
            seen: row.seen != 0,
        }
    }
}

fn feed_not_found(id: i64) -> RssGridError {
    RssGridError::NotFound(format!("feed {id}"))
}

/// Repository for feed operations.
pub struct FeedRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> FeedRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new feed with an empty title.
    pub async fn create(&self, url: &str) -> Result<Feed> {
        let id: i64 = sqlx::query_scalar("INSERT INTO feeds (url) VALUES ($1) RETURNING id")
            .bind(url)
            .fetch_one(self.pool)
            .await?;

        self.get_by_id(id).await?.ok_or_else(|| feed_not_found(id))
    }

    /// Get a feed by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Feed>> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Feed::from))
    }

    /// Get a feed by URL.
    pub async fn get_by_url(&self, url: &str) -> Result<Option<Feed>> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE url = $1"
        ))
        .bind(url)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Feed::from))
    }

    /// List all feeds.
    pub async fn list_all(&self) -> Result<Vec<Feed>> {
        let rows = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds ORDER BY id"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Feed::from).collect())
    }

    /// Replace the display title.
    pub async fn update_title(&self, id: i64, title: &str) -> Result<()> {
        let result = sqlx::query("UPDATE feeds SET title = $1 WHERE id = $2")
            .bind(title)
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(feed_not_found(id));
        }
        Ok(())
    }

    /// Stamp the time of the last fetch that reached the server.
    pub async fn update_last_fetched(&self, id: i64, fetched_at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE feeds SET last_fetched_at = $1 WHERE id = $2")
            .bind(format_datetime(&fetched_at))
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(feed_not_found(id));
        }
        Ok(())
    }

    /// Overwrite the stored validators and cache expiry.
    pub async fn update_cache_metadata(&self, id: i64, cache: &CacheMetadata) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE feeds
            SET etag = $1, last_modified = $2, cache_until = $3
            WHERE id = $4
            "#,
        )
        .bind(&cache.etag)
        .bind(&cache.last_modified)
        .bind(format_datetime(&cache.cache_until))
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(feed_not_found(id));
        }
        Ok(())
    }

    /// Stamp last_fetched_at and overwrite the cache metadata in one statement.
    pub async fn record_fetch(
        &self,
        id: i64,
        fetched_at: DateTime<Utc>,
        cache: &CacheMetadata,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE feeds
            SET last_fetched_at = $1, etag = $2, last_modified = $3, cache_until = $4
            WHERE id = $5
            "#,
        )
        .bind(format_datetime(&fetched_at))
        .bind(&cache.etag)
        .bind(&cache.last_modified)
        .bind(format_datetime(&cache.cache_until))
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(feed_not_found(id));
        }
        Ok(())
    }

    /// Delete a feed and, through the foreign keys, its posts.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feeds WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count all feeds.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feeds")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

/// Repository for post operations.
pub struct PostRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> PostRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a post unless one with the same (feed, guid) already exists.
    ///
    /// Returns the new post's ID, or `None` when the post was already stored.
    /// An existing row is never modified.
    pub async fn insert_if_absent(&self, post: &NewPost) -> Result<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO posts (feed_id, guid, title, link, published_at, content)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (feed_id, guid) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(post.feed_id)
        .bind(&post.guid)
        .bind(&post.title)
        .bind(&post.link)
        .bind(format_datetime(&post.published_at))
        .bind(post.content.as_str())
        .fetch_optional(self.pool)
        .await?;

        Ok(id)
    }

    /// Get a post by its identity within a feed.
    pub async fn get_by_guid(&self, feed_id: i64, guid: &str) -> Result<Option<Post>> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, feed_id, guid, title, link, published_at, content
            FROM posts
            WHERE feed_id = $1 AND guid = $2
            "#,
        )
        .bind(feed_id)
        .bind(guid)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Post::from))
    }

    /// List the newest posts of a feed.
    pub async fn list_by_feed(&self, feed_id: i64, limit: i64) -> Result<Vec<Post>> {
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, feed_id, guid, title, link, published_at, content
            FROM posts
            WHERE feed_id = $1
            ORDER BY published_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(feed_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Post::from).collect())
    }

    /// Count posts in a feed.
    pub async fn count_by_feed(&self, feed_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE feed_id = $1")
            .bind(feed_id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// List the newest posts of a feed with the user's seen flag.
    pub async fn list_for_user(
        &self,
        feed_id: i64,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<UserPost>> {
        let rows = sqlx::query_as::<_, UserPostRow>(
            r#"
            SELECT p.id, p.feed_id, p.guid, p.title, p.link, p.published_at, p.content,
                   COALESCE(s.seen, 0) AS seen
            FROM posts p
            LEFT JOIN user_post_states s ON s.post_id = p.id AND s.user_id = $2
            WHERE p.feed_id = $1
            ORDER BY p.published_at DESC, p.id DESC
            LIMIT $3
            "#,
        )
        .bind(feed_id)
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(UserPost::from).collect())
    }

    /// Mark one post as seen by a user.
    pub async fn mark_seen(&self, user_id: i64, post_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_post_states (user_id, post_id, seen)
            VALUES ($1, $2, 1)
            ON CONFLICT (user_id, post_id) DO UPDATE SET seen = 1
            "#,
        )
        .bind(user_id)
        .bind(post_id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Mark every post of a feed as seen by a user.
    pub async fn mark_all_seen(&self, user_id: i64, feed_id: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_post_states (user_id, post_id, seen)
            SELECT $1, id, 1 FROM posts WHERE feed_id = $2
            ON CONFLICT (user_id, post_id) DO UPDATE SET seen = 1
            "#,
        )
        .bind(user_id)
        .bind(feed_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Count posts of a feed the user has not seen.
    pub async fn count_unseen(&self, user_id: i64, feed_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM posts p
            LEFT JOIN user_post_states s ON s.post_id = p.id AND s.user_id = $1
            WHERE p.feed_id = $2 AND COALESCE(s.seen, 0) = 0
            "#,
        )
        .bind(user_id)
        .bind(feed_id)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }
}
