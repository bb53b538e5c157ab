//! Feed ingestion engine.
//!
//! - [`fetcher`]: downloads and parses feed documents
//! - [`persister`]: stores entries as posts and advances the watermark
//! - [`scheduler`]: periodically selects due feeds and ingests them concurrently

pub mod fetcher;
pub mod persister;
pub mod scheduler;

pub use fetcher::{parse_feed, parse_published, FeedFetcher, FeedSource};
pub use persister::{PersistSummary, PostPersister};
pub use scheduler::{ingest_feed, CycleReport, IngestScheduler, SchedulerHandle};
