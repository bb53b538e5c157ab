//! rssagg - RSS feed aggregator
//!
//! Periodically polls registered feeds, stores new entries as posts and
//! tracks a per-feed watermark recording the last complete ingestion.

pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod ingest;
pub mod logging;

pub use config::{Config, IngestConfig};
pub use db::{Database, NewUser, User, UserRepository};
pub use error::{AggError, Result};
pub use feed::{
    Feed, FeedService, FeedStore, InsertOutcome, NewPost, NormalizedEntry, Post, PostStore,
};
pub use ingest::{
    CycleReport, FeedFetcher, FeedSource, IngestScheduler, PersistSummary, PostPersister,
    SchedulerHandle,
};
