//! Dashboard users.
//!
//! Authentication happens at the identity provider; a user row only maps the
//! provider's (subject, issuer) pair to a local id and holds display
//! preferences.

use chrono::{DateTime, Utc};

use super::{parse_datetime, DbPool};
use crate::{Result, RssGridError};

/// Smallest allowed posts-per-feed preference.
pub const MIN_POSTS_PER_FEED: i64 = 1;

/// Largest allowed posts-per-feed preference.
pub const MAX_POSTS_PER_FEED: i64 = 100;

/// A dashboard user.
#[derive(Debug, Clone)]
pub struct User {
    /// User ID.
    pub id: i64,
    /// Subject claim from the identity provider.
    pub oidc_subject: String,
    /// Issuer of the identity token.
    pub oidc_issuer: String,
    /// Number of posts shown per feed on the grid.
    pub posts_per_feed: i64,
    /// When the user first logged in.
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct UserRow {
    id: i64,
    oidc_subject: String,
    oidc_issuer: String,
    posts_per_feed: i64,
    created_at: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            oidc_subject: row.oidc_subject,
            oidc_issuer: row.oidc_issuer,
            posts_per_feed: row.posts_per_feed,
            created_at: parse_datetime(&row.created_at).unwrap_or_else(Utc::now),
        }
    }
}

/// Repository for user operations.
pub struct UserRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Return the id of the user with this identity, creating the user on first login.
    pub async fn get_or_create(&self, oidc_subject: &str, oidc_issuer: &str) -> Result<i64> {
        sqlx::query("INSERT OR IGNORE INTO users (oidc_subject, oidc_issuer) VALUES ($1, $2)")
            .bind(oidc_subject)
            .bind(oidc_issuer)
            .execute(self.pool)
            .await?;

        let id: i64 =
            sqlx::query_scalar("SELECT id FROM users WHERE oidc_subject = $1 AND oidc_issuer = $2")
                .bind(oidc_subject)
                .bind(oidc_issuer)
                .fetch_one(self.pool)
                .await?;

        Ok(id)
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, oidc_subject, oidc_issuer, posts_per_feed, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    /// Get the number of posts shown per feed for a user.
    pub async fn posts_per_feed(&self, user_id: i64) -> Result<i64> {
        sqlx::query_scalar("SELECT posts_per_feed FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| RssGridError::NotFound("user".into()))
    }

    /// Set the number of posts shown per feed for a user.
    pub async fn set_posts_per_feed(&self, user_id: i64, posts_per_feed: i64) -> Result<()> {
        if !(MIN_POSTS_PER_FEED..=MAX_POSTS_PER_FEED).contains(&posts_per_feed) {
            return Err(RssGridError::Validation(format!(
                "posts per feed must be between {} and {}",
                MIN_POSTS_PER_FEED, MAX_POSTS_PER_FEED
            )));
        }

        let result = sqlx::query("UPDATE users SET posts_per_feed = $1 WHERE id = $2")
            .bind(posts_per_feed)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RssGridError::NotFound("user".into()));
        }
        Ok(())
    }
}
