//! Database schema and migrations for RSSGrid.
//!
//! Migrations are applied in order; the schema_version table records
//! which ones have run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: Initial schema
    r#"
-- Users authenticated through the identity provider
CREATE TABLE users (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    oidc_subject    TEXT NOT NULL,
    oidc_issuer     TEXT NOT NULL,
    posts_per_feed  INTEGER NOT NULL DEFAULT 10,
    created_at      TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (oidc_subject, oidc_issuer)
);

-- Feeds are shared between all subscribers of the same URL
CREATE TABLE feeds (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    url             TEXT NOT NULL UNIQUE,
    title           TEXT NOT NULL DEFAULT '',
    last_fetched_at TEXT,
    created_at      TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Subscriptions and their position on the user's grid
CREATE TABLE user_feeds (
    user_id         INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    feed_id         INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
    grid_position   INTEGER NOT NULL,
    PRIMARY KEY (user_id, feed_id)
);

CREATE INDEX idx_user_feeds_feed_id ON user_feeds(feed_id);

CREATE TABLE posts (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    feed_id         INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
    guid            TEXT NOT NULL,
    title           TEXT NOT NULL DEFAULT '',
    link            TEXT NOT NULL DEFAULT '',
    published_at    TEXT NOT NULL,
    content         TEXT NOT NULL DEFAULT '',  -- sanitized HTML
    created_at      TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (feed_id, guid)
);

CREATE INDEX idx_posts_feed_published ON posts(feed_id, published_at);

CREATE TABLE user_post_states (
    user_id         INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    post_id         INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    seen            INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (user_id, post_id)
);
"#,
    // v2: HTTP cache metadata for conditional fetches
    r#"
ALTER TABLE feeds ADD COLUMN etag TEXT;
ALTER TABLE feeds ADD COLUMN last_modified TEXT;
ALTER TABLE feeds ADD COLUMN cache_until TEXT;
"#,
];
