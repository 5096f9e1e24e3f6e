//! Background feed refresh for RSSGrid.
//!
//! A single task wakes on a fixed interval (or on a manual trigger) and runs
//! one batch over every known feed. Each feed goes through the same
//! pipeline: cache check, conditional fetch, parse, sanitize, store. A
//! failing feed is logged and counted; it never aborts the batch.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::cache::{evaluate, CacheDecision};
use super::fetcher::{FeedFetcher, FetchOutcome};
use super::ingest::ingest;
use super::store::FeedStore;
use super::types::Feed;
use crate::clock::Clock;
use crate::config::FeedConfig;
use crate::{Result, RssGridError};

/// Default interval between batches in seconds (30 minutes).
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 1800;

/// Shortest interval accepted by [`FeedUpdater::with_interval`].
const MIN_UPDATE_INTERVAL: Duration = Duration::from_secs(1);

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdaterState {
    /// Waiting for the next tick.
    Idle,
    /// A batch is in progress.
    Running,
    /// Stopped for good.
    Stopped,
}

/// What happened to one feed during a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The cached copy was still valid; nothing was fetched.
    Skipped,
    /// The server reported no changes.
    NotModified,
    /// New content was fetched and stored.
    Updated {
        /// Number of posts that were not stored before.
        new_posts: usize,
    },
}

/// Summary of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Feeds loaded for the batch.
    pub feeds: usize,
    /// Feeds fetched with new content.
    pub updated: usize,
    /// Feeds the server reported unchanged.
    pub not_modified: usize,
    /// Feeds skipped because their cache was still valid.
    pub skipped: usize,
    /// Feeds whose refresh failed.
    pub failed: usize,
    /// Feeds not started because the updater was stopping.
    pub cancelled: usize,
    /// Posts inserted across all feeds.
    pub new_posts: usize,
}

impl BatchReport {
    fn record(&mut self, outcome: Option<&Result<RefreshOutcome>>) {
        match outcome {
            None => self.cancelled += 1,
            Some(Err(_)) => self.failed += 1,
            Some(Ok(RefreshOutcome::Skipped)) => self.skipped += 1,
            Some(Ok(RefreshOutcome::NotModified)) => self.not_modified += 1,
            Some(Ok(RefreshOutcome::Updated { new_posts })) => {
                self.updated += 1;
                self.new_posts += new_posts;
            }
        }
    }
}

/// Periodic feed refresher.
pub struct FeedUpdater<S: FeedStore + ?Sized> {
    store: Arc<S>,
    fetcher: FeedFetcher,
    clock: Arc<dyn Clock>,
    interval: Duration,
    max_concurrent: usize,
    state: watch::Sender<UpdaterState>,
}

impl<S: FeedStore + ?Sized + 'static> FeedUpdater<S> {
    /// Create an updater with the default interval, refreshing one feed at a time.
    pub fn new(store: Arc<S>, fetcher: FeedFetcher, clock: Arc<dyn Clock>) -> Self {
        let (state, _) = watch::channel(UpdaterState::Idle);
        Self {
            store,
            fetcher,
            clock,
            interval: Duration::from_secs(DEFAULT_UPDATE_INTERVAL_SECS),
            max_concurrent: 1,
            state,
        }
    }

    /// Create an updater from configuration.
    pub fn from_config(store: Arc<S>, config: &FeedConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        if config.update_interval_secs == 0 {
            return Err(RssGridError::Config(
                "feeds.update_interval_secs must be greater than 0".to_string(),
            ));
        }
        let fetcher = FeedFetcher::new(config, Arc::clone(&clock))?;
        Ok(Self::new(store, fetcher, clock)
            .with_interval(config.update_interval())
            .with_max_concurrent(config.max_concurrent_fetches))
    }

    /// Set the interval between batches. Values below one second are raised
    /// to one second.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_UPDATE_INTERVAL);
        self
    }

    /// Set how many feeds are refreshed concurrently within a batch.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Interval between batches.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Current state.
    pub fn state(&self) -> UpdaterState {
        *self.state.borrow()
    }

    /// Watch state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<UpdaterState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: UpdaterState) {
        // Stopped is terminal
        self.state.send_if_modified(|current| {
            if *current == UpdaterState::Stopped || *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    /// Refresh one feed.
    pub async fn refresh_feed(&self, feed: &Feed) -> Result<RefreshOutcome> {
        if evaluate(feed.cache_until, self.clock.now()) == CacheDecision::Skip {
            debug!(feed = %feed.url, "Cache still valid, skipping");
            return Ok(RefreshOutcome::Skipped);
        }

        let outcome = self
            .fetcher
            .fetch(&feed.url, feed.etag.as_deref(), feed.last_modified.as_deref())
            .await?;
        let fetched_at = self.clock.now();

        match outcome {
            FetchOutcome::NotModified => {
                debug!(feed = %feed.url, "Feed not modified");
                self.store
                    .update_feed_last_fetched_at(feed.id, fetched_at)
                    .await?;
                Ok(RefreshOutcome::NotModified)
            }
            FetchOutcome::Modified {
                feed: parsed,
                cache,
            } => {
                let new_posts = ingest(&*self.store, feed, &parsed, fetched_at).await?;
                self.store.record_fetch(feed.id, fetched_at, &cache).await?;

                if new_posts > 0 {
                    info!(feed = %feed.url, new_posts, "Feed updated");
                } else {
                    debug!(feed = %feed.url, "Feed updated: no new posts");
                }
                Ok(RefreshOutcome::Updated { new_posts })
            }
        }
    }

    /// Run one batch over every known feed.
    ///
    /// Only a failure to load the feed list is returned as an error.
    pub async fn run_batch(&self) -> Result<BatchReport> {
        self.batch(None).await
    }

    async fn batch(&self, stop: Option<&watch::Receiver<bool>>) -> Result<BatchReport> {
        self.set_state(UpdaterState::Running);
        let result = self.refresh_all(stop).await;
        self.set_state(UpdaterState::Idle);
        result
    }

    async fn refresh_all(&self, stop: Option<&watch::Receiver<bool>>) -> Result<BatchReport> {
        let feeds = self.store.list_all_feeds().await.map_err(|e| {
            error!(error = %e, "Failed to list feeds");
            e
        })?;

        let mut report = BatchReport {
            feeds: feeds.len(),
            ..Default::default()
        };
        if feeds.is_empty() {
            debug!("No feeds to refresh");
            return Ok(report);
        }
        info!(feeds = feeds.len(), "Refreshing feeds");

        let outcomes: Vec<Option<Result<RefreshOutcome>>> = stream::iter(feeds)
            .map(|feed| async move {
                if stop.is_some_and(is_stopped) {
                    return None;
                }
                let result = self.refresh_feed(&feed).await;
                if let Err(e) = &result {
                    warn!(feed = %feed.url, error = %e, "Failed to refresh feed");
                }
                Some(result)
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        for outcome in &outcomes {
            report.record(outcome.as_ref());
        }

        info!(
            updated = report.updated,
            not_modified = report.not_modified,
            skipped = report.skipped,
            failed = report.failed,
            cancelled = report.cancelled,
            new_posts = report.new_posts,
            "Feed refresh complete"
        );
        Ok(report)
    }

    /// Run batches until `stop` is set or its sender is dropped.
    ///
    /// The first batch starts immediately. `trigger` starts a batch without
    /// waiting for the next tick.
    pub async fn run(&self, mut stop: watch::Receiver<bool>, trigger: Arc<Notify>) {
        if self.state() == UpdaterState::Stopped {
            return;
        }
        info!(
            "Feed updater started (interval: {} seconds)",
            self.interval.as_secs()
        );

        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = wait_for_stop(&mut stop) => break,
                _ = timer.tick() => {}
                _ = trigger.notified() => debug!("Manual refresh triggered"),
            }

            if is_stopped(&stop) {
                break;
            }
            // Errors are logged inside the batch
            let _ = self.batch(Some(&stop)).await;
        }

        self.set_state(UpdaterState::Stopped);
        info!("Feed updater stopped");
    }

    /// Spawn the updater as a background task.
    pub fn start(self: Arc<Self>) -> UpdaterHandle {
        self.spawn(None)
    }

    /// Spawn the updater as a background task that also stops when `cancel`
    /// is set or its sender is dropped.
    pub fn start_with(self: Arc<Self>, cancel: watch::Receiver<bool>) -> UpdaterHandle {
        self.spawn(Some(cancel))
    }

    fn spawn(self: Arc<Self>, cancel: Option<watch::Receiver<bool>>) -> UpdaterHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let stop_tx = Arc::new(stop_tx);
        let trigger = Arc::new(Notify::new());
        let state = self.subscribe_state();

        let task_trigger = Arc::clone(&trigger);
        // Weak so that dropping the handle still closes the stop channel
        let forward_stop = Arc::downgrade(&stop_tx);
        let join = tokio::spawn(async move {
            let forward = async move {
                if let Some(mut cancel) = cancel {
                    wait_for_stop(&mut cancel).await;
                    if let Some(stop) = forward_stop.upgrade() {
                        stop.send_replace(true);
                    }
                }
                std::future::pending::<()>().await
            };
            tokio::select! {
                _ = self.run(stop_rx, task_trigger) => {}
                _ = forward => {}
            }
        });

        UpdaterHandle {
            stop: stop_tx,
            trigger,
            state,
            join,
        }
    }
}

fn is_stopped(stop: &watch::Receiver<bool>) -> bool {
    *stop.borrow() || stop.has_changed().is_err()
}

async fn wait_for_stop(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        if stop.changed().await.is_err() {
            return;
        }
    }
}

/// Handle to a running updater task.
///
/// Dropping the handle stops the updater after its current batch.
pub struct UpdaterHandle {
    stop: Arc<watch::Sender<bool>>,
    trigger: Arc<Notify>,
    state: watch::Receiver<UpdaterState>,
    join: JoinHandle<()>,
}

impl UpdaterHandle {
    /// Run a batch now instead of waiting for the next tick.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Ask the updater to stop. No new feed is started after this call;
    /// fetches already in flight finish or time out.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    /// Current state.
    pub fn state(&self) -> UpdaterState {
        *self.state.borrow()
    }

    /// Watch state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<UpdaterState> {
        self.state.clone()
    }

    /// Stop the updater and wait for the task to finish.
    pub async fn shutdown(self) {
        self.stop();
        if let Err(e) = self.join.await {
            error!(error = %e, "Feed updater task failed");
        }
    }
}
