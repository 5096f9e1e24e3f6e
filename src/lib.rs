//! RSSGrid - a self-hosted RSS dashboard
//!
//! Users subscribe to feeds and see them as a grid of recent posts. This
//! crate holds the storage layer and the background engine that keeps every
//! feed's posts current.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod logging;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use db::{Database, User, UserRepository};
pub use error::{Result, RssGridError};
pub use feed::{
    BatchReport, Feed, FeedFetcher, FeedRepository, FeedStore, FeedUpdater, Post,
    PostRepository, RefreshOutcome, SubscriptionRepository, UpdaterHandle, UpdaterState,
};
