//! Feed refresh engine for RSSGrid.
//!
//! Keeps every subscribed feed's posts current: a background task checks
//! each feed's cache expiry, fetches it conditionally, parses and sanitizes
//! the document and stores only the posts it has not seen before.

pub mod cache;
pub mod fetcher;
pub mod ingest;
pub mod parser;
pub mod repository;
pub mod sanitize;
pub mod store;
pub mod subscription;
pub mod types;
pub mod updater;

pub use cache::{
    conditional_headers, evaluate, extract_cache_metadata, parse_max_age, CacheDecision,
    DEFAULT_CACHE_TTL_SECS,
};
pub use fetcher::{validate_url, FeedFetcher, FetchOutcome, ACCEPT_FEEDS};
pub use ingest::ingest;
pub use parser::parse_feed;
pub use repository::{FeedRepository, PostRepository};
pub use sanitize::{sanitize, SanitizedHtml};
pub use store::FeedStore;
pub use subscription::SubscriptionRepository;
pub use types::{
    CacheMetadata, Feed, NewPost, ParsedFeed, ParsedItem, Post, UserFeed, UserPost,
};
pub use updater::{
    BatchReport, FeedUpdater, RefreshOutcome, UpdaterHandle, UpdaterState,
    DEFAULT_UPDATE_INTERVAL_SECS,
};
