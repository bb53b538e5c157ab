//! Data-access contract used by the ingestion engine.
//!
//! The engine only talks to storage through these traits. The SQLite
//! repositories implement them; tests substitute their own.

use async_trait::async_trait;
use uuid::Uuid;

use super::types::{Feed, InsertOutcome, NewPost, Post};
use crate::Result;

/// Feed storage as seen by the scheduler and the persister.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Return up to `limit` feeds ordered by ascending `last_fetched_at`,
    /// never-fetched feeds first.
    async fn next_due_feeds(&self, limit: u32) -> Result<Vec<Feed>>;

    /// Set the watermark of the feed with `url` to now.
    ///
    /// Returns `false` when no feed has that URL.
    async fn mark_fetched(&self, url: &str) -> Result<bool>;
}

/// Post storage as seen by the persister.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Insert a post.
    ///
    /// A URL collision is reported as [`InsertOutcome::Duplicate`]; every
    /// other failure is an `Err`.
    async fn insert_post(&self, post: &NewPost) -> Result<InsertOutcome>;

    /// Posts of every feed `user_id` follows, newest first.
    async fn list_for_user(&self, user_id: Uuid, limit: u32) -> Result<Vec<Post>>;
}
