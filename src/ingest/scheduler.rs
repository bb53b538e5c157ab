//! Ingestion scheduler for rssagg.
//!
//! On every tick the scheduler selects the feeds that have waited longest
//! and hands each one to its own task, which fetches the feed and persists
//! its entries. Ticks never wait for those tasks; a shared semaphore bounds
//! how many are fetching at once. Stopping a started scheduler waits for
//! the tasks it dispatched.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::fetcher::{FeedFetcher, FeedSource};
use super::persister::{PersistSummary, PostPersister};
use crate::config::IngestConfig;
use crate::db::Database;
use crate::feed::{Feed, FeedRepository, FeedStore, PostRepository, PostStore};
use crate::{AggError, Result};

/// Totals for one pass that was awaited to completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Feeds selected for the pass.
    pub selected: usize,
    /// Feeds fetched and persisted completely.
    pub succeeded: usize,
    /// Feeds whose fetch or persistence failed.
    pub failed: usize,
    /// New posts across all feeds.
    pub inserted: usize,
    /// Entries skipped as duplicates across all feeds.
    pub duplicates: usize,
}

/// Fetch one feed and persist its entries.
pub async fn ingest_feed(
    source: &dyn FeedSource,
    persister: &PostPersister,
    feed: &Feed,
) -> Result<PersistSummary> {
    debug!("Fetching feed {}", feed.url);

    let entries = source.fetch(&feed.url).await?;
    let summary = persister.persist(feed, entries).await?;

    if summary.inserted > 0 {
        info!("Feed {} updated: {} new post(s)", feed.url, summary.inserted);
    } else {
        debug!("Feed {} updated: no new posts", feed.url);
    }

    Ok(summary)
}

/// Periodic feed ingestion scheduler.
pub struct IngestScheduler {
    feeds: Arc<dyn FeedStore>,
    source: Arc<dyn FeedSource>,
    persister: Arc<PostPersister>,
    batch_size: u32,
    interval: Duration,
    limiter: Arc<Semaphore>,
}

impl IngestScheduler {
    /// Create a scheduler over explicit stores and feed source.
    pub fn new(
        feeds: Arc<dyn FeedStore>,
        posts: Arc<dyn PostStore>,
        source: Arc<dyn FeedSource>,
        config: &IngestConfig,
    ) -> Self {
        let persister = Arc::new(PostPersister::new(posts, Arc::clone(&feeds)));
        Self {
            feeds,
            source,
            persister,
            batch_size: config.batch_size,
            interval: config.interval(),
            limiter: Arc::new(Semaphore::new(config.max_concurrent_fetches)),
        }
    }

    /// Create a scheduler backed by the SQLite repositories and the HTTP
    /// fetcher.
    pub fn from_database(db: &Database, config: &IngestConfig) -> Result<Self> {
        let fetcher = FeedFetcher::new(config)?;
        Ok(Self::new(
            Arc::new(FeedRepository::new(db.pool())),
            Arc::new(PostRepository::new(db.pool())),
            Arc::new(fetcher),
            config,
        ))
    }

    /// Number of feeds selected per pass.
    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    /// Time between passes.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one pass without waiting for the feed tasks.
    ///
    /// A failed selection is logged and yields no tasks. The returned
    /// handles may be dropped; the tasks keep running.
    pub async fn tick(&self) -> Vec<JoinHandle<Result<PersistSummary>>> {
        match self.select_batch().await {
            Ok(batch) => self.dispatch(batch),
            Err(e) => {
                error!("Failed to select feeds for ingestion: {}", e);
                Vec::new()
            }
        }
    }

    /// Run one pass and wait for every feed task to finish.
    pub async fn ingest_once(&self) -> Result<CycleReport> {
        let batch = self.select_batch().await?;
        let mut report = CycleReport {
            selected: batch.len(),
            ..CycleReport::default()
        };

        for joined in join_all(self.dispatch(batch)).await {
            match joined {
                Ok(Ok(summary)) => {
                    report.succeeded += 1;
                    report.inserted += summary.inserted;
                    report.duplicates += summary.duplicates;
                }
                Ok(Err(_)) => report.failed += 1,
                Err(e) => {
                    error!("Feed task panicked: {}", e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Start ticking in the background.
    ///
    /// The first pass runs immediately. Passes continue until
    /// [`SchedulerHandle::stop`] is called or the handle is dropped.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        SchedulerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Ingestion scheduler started (interval: {} seconds, batch size: {})",
            self.interval.as_secs(),
            self.batch_size
        );

        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight: JoinSet<Result<PersistSummary>> = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    report_join_error(joined);
                }
                _ = timer.tick() => {
                    match self.select_batch().await {
                        Ok(batch) => {
                            for feed in batch {
                                in_flight.spawn(self.feed_task(feed));
                            }
                        }
                        Err(e) => error!("Failed to select feeds for ingestion: {}", e),
                    }
                }
            }
        }

        if !in_flight.is_empty() {
            info!("Waiting for {} feed task(s) to finish", in_flight.len());
        }
        while let Some(joined) = in_flight.join_next().await {
            report_join_error(joined);
        }

        info!("Ingestion scheduler stopped");
    }

    async fn select_batch(&self) -> Result<Vec<Feed>> {
        let feeds = self.feeds.next_due_feeds(self.batch_size).await?;
        if feeds.is_empty() {
            debug!("No feeds due for ingestion");
        } else {
            info!("Ingesting {} feed(s)", feeds.len());
        }
        Ok(feeds)
    }

    fn dispatch(&self, batch: Vec<Feed>) -> Vec<JoinHandle<Result<PersistSummary>>> {
        batch
            .into_iter()
            .map(|feed| tokio::spawn(self.feed_task(feed)))
            .collect()
    }

    /// Ingest `feed` once a fetch permit is available.
    fn feed_task(
        &self,
        feed: Feed,
    ) -> impl Future<Output = Result<PersistSummary>> + Send + 'static {
        let source = Arc::clone(&self.source);
        let persister = Arc::clone(&self.persister);
        let limiter = Arc::clone(&self.limiter);

        async move {
            let _permit = limiter
                .acquire_owned()
                .await
                .map_err(|_| AggError::Io(std::io::Error::other("fetch limiter closed")))?;

            let result = ingest_feed(source.as_ref(), &persister, &feed).await;
            if let Err(e) = &result {
                warn!("Failed to ingest feed {}: {}", feed.url, e);
            }
            result
        }
    }
}

fn report_join_error(joined: std::result::Result<Result<PersistSummary>, JoinError>) {
    if let Err(e) = joined {
        error!("Feed task failed: {}", e);
    }
}

/// Handle to a running scheduler.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop ticking and wait for the scheduler to wind down.
    ///
    /// Returns once the loop has exited and every feed task it dispatched
    /// has finished, so the database may be closed afterwards.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("Ingestion scheduler task failed: {}", e);
        }
    }

    /// Whether the scheduler loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
