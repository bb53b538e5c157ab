//! Post persister.
//!
//! Writes the entries of one fetched feed as posts and advances the feed's
//! watermark once every entry has been stored or recognized as a duplicate.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::feed::{Feed, FeedStore, InsertOutcome, NewPost, NormalizedEntry, PostStore};
use crate::Result;

/// Counts of what happened to a feed's entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistSummary {
    /// Entries stored as new posts.
    pub inserted: usize,
    /// Entries whose URL was already stored.
    pub duplicates: usize,
}

/// Stores fetched entries and updates the feed watermark.
pub struct PostPersister {
    posts: Arc<dyn PostStore>,
    feeds: Arc<dyn FeedStore>,
}

impl PostPersister {
    /// Create a persister over the given stores.
    pub fn new(posts: Arc<dyn PostStore>, feeds: Arc<dyn FeedStore>) -> Self {
        Self { posts, feeds }
    }

    /// Persist `entries` for `feed` in order.
    ///
    /// Duplicates are skipped. The first other storage failure aborts the
    /// remaining entries and leaves the watermark untouched; posts written
    /// before the failure stay written.
    pub async fn persist(
        &self,
        feed: &Feed,
        entries: Vec<NormalizedEntry>,
    ) -> Result<PersistSummary> {
        let mut summary = PersistSummary::default();

        for entry in entries {
            let post = NewPost::from_entry(feed.id, entry);
            match self.posts.insert_post(&post).await {
                Ok(InsertOutcome::Inserted) => {
                    summary.inserted += 1;
                }
                Ok(InsertOutcome::Duplicate) => {
                    debug!("Post {} already stored", post.url);
                    summary.duplicates += 1;
                }
                Err(e) => {
                    error!(
                        "Failed to store post {} for feed {}: {}",
                        post.url, feed.url, e
                    );
                    return Err(e);
                }
            }
        }

        if !self.feeds.mark_fetched(&feed.url).await? {
            warn!("Feed {} no longer exists, watermark not updated", feed.url);
        }

        Ok(summary)
    }
}
