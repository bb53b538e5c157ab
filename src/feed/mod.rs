//! Feed, follow and post storage for rssagg.
//!
//! This module owns the durable side of the aggregator: the data-access
//! contract the ingestion engine depends on, its SQLite implementation, and
//! the service used by the command-line surface.

pub mod repository;
pub mod service;
pub mod store;
pub mod types;
pub mod validation;

pub use repository::{FeedFollowRepository, FeedRepository, PostRepository};
pub use service::{AddFeedRequest, FeedService, DEFAULT_POST_LIMIT};
pub use store::{FeedStore, PostStore};
pub use types::{
    Feed, FeedFollow, InsertOutcome, NewFeed, NewPost, NormalizedEntry, Post,
    MAX_DESCRIPTION_LENGTH, UNTITLED,
};
pub use validation::validate_url;
