//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::time::{sleep, Instant};

use rssgrid::config::FeedConfig;
use rssgrid::{Database, Feed, FeedRepository, FeedUpdater, ManualClock};

/// Default timeout for background operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A feed item for [`rss`].
pub struct Item<'a> {
    pub guid: Option<&'a str>,
    pub title: &'a str,
    pub link: &'a str,
    pub content: &'a str,
}

impl<'a> Item<'a> {
    pub fn new(guid: &'a str, title: &'a str) -> Self {
        Self {
            guid: Some(guid),
            title,
            link: "",
            content: "",
        }
    }
}

/// Render an RSS 2.0 document.
pub fn rss(title: &str, items: &[Item<'_>]) -> String {
    let mut body = String::new();
    for item in items {
        body.push_str("    <item>\n");
        body.push_str(&format!("      <title>{}</title>\n", item.title));
        if let Some(guid) = item.guid {
            body.push_str(&format!("      <guid>{guid}</guid>\n"));
        }
        if !item.link.is_empty() {
            body.push_str(&format!("      <link>{}</link>\n", item.link));
        }
        if !item.content.is_empty() {
            body.push_str(&format!(
                "      <content:encoded><![CDATA[{}]]></content:encoded>\n",
                item.content
            ));
        }
        body.push_str("    </item>\n");
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>{title}</title>
    <link>https://ex.com/</link>
    <description>Test feed</description>
{body}  </channel>
</rss>"#
    )
}

/// Fixed start time for the manual clock.
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// Feed settings that allow fetching from the local mock server.
pub fn feed_config() -> FeedConfig {
    FeedConfig {
        fetch_timeout_secs: 5,
        connect_timeout_secs: 2,
        allow_private_hosts: true,
        ..Default::default()
    }
}

/// In-memory database, manual clock and an updater over them.
pub async fn setup() -> (Arc<Database>, Arc<ManualClock>, FeedUpdater<Database>) {
    setup_with(feed_config()).await
}

/// Like [`setup`] with custom feed settings.
pub async fn setup_with(
    config: FeedConfig,
) -> (Arc<Database>, Arc<ManualClock>, FeedUpdater<Database>) {
    let db = Arc::new(Database::open_in_memory().await.unwrap());
    let clock = Arc::new(ManualClock::new(start_time()));
    let updater = FeedUpdater::from_config(db.clone(), &config, clock.clone()).unwrap();
    (db, clock, updater)
}

/// Create a feed row for `url`.
pub async fn add_feed(db: &Database, url: &str) -> Feed {
    FeedRepository::new(db.pool()).create(url).await.unwrap()
}

/// Reload a feed row.
pub async fn reload(db: &Database, feed: &Feed) -> Feed {
    FeedRepository::new(db.pool())
        .get_by_id(feed.id)
        .await
        .unwrap()
        .unwrap()
}

/// Poll `check` until it returns true or the timeout expires.
pub async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + DEFAULT_TIMEOUT;
    while !check().await {
        assert!(Instant::now() < deadline, "condition not met in time");
        sleep(Duration::from_millis(20)).await;
    }
}
