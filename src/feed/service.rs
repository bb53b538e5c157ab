//! Feed service for rssagg.
//!
//! High-level operations behind the command-line surface: registering
//! feeds, following them and reading the resulting posts.

use uuid::Uuid;

use super::repository::{FeedFollowRepository, FeedRepository, PostRepository};
use super::types::{Feed, FeedFollow, NewFeed, Post};
use super::validation::validate_url;
use crate::db::{Database, UserRepository};
use crate::{AggError, Result};

/// Default number of posts returned for a user.
pub const DEFAULT_POST_LIMIT: u32 = 20;

/// Request to add a new feed.
#[derive(Debug, Clone)]
pub struct AddFeedRequest {
    /// Feed URL.
    pub url: String,
    /// Display name.
    pub name: String,
    /// User adding (and owning) the feed.
    pub user_id: Uuid,
}

impl AddFeedRequest {
    /// Create a new add feed request.
    pub fn new(name: impl Into<String>, url: impl Into<String>, user_id: Uuid) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            user_id,
        }
    }
}

/// Service for feed operations.
pub struct FeedService<'a> {
    db: &'a Database,
}

impl<'a> FeedService<'a> {
    /// Create a new FeedService with the given database reference.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Register a feed and make its owner follow it.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The URL is invalid or points at a private host
    /// - The user doesn't exist
    /// - A feed with the same URL already exists
    pub async fn add_feed(&self, request: &AddFeedRequest) -> Result<(Feed, FeedFollow)> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AggError::Validation("feed name must not be empty".to_string()));
        }
        validate_url(&request.url)?;
        self.require_user(request.user_id).await?;

        let feed = FeedRepository::new(self.db.pool())
            .create(&NewFeed::new(name, &request.url, request.user_id))
            .await?;
        let follow = FeedFollowRepository::new(self.db.pool())
            .create(request.user_id, feed.id)
            .await?;

        Ok((feed, follow))
    }

    /// List every feed.
    pub async fn list_feeds(&self) -> Result<Vec<Feed>> {
        FeedRepository::new(self.db.pool()).list_all().await
    }

    /// Follow an existing feed.
    pub async fn follow(&self, user_id: Uuid, feed_id: Uuid) -> Result<FeedFollow> {
        self.require_user(user_id).await?;
        FeedRepository::new(self.db.pool())
            .get_by_id(feed_id)
            .await?
            .ok_or_else(|| AggError::NotFound("feed".to_string()))?;

        FeedFollowRepository::new(self.db.pool())
            .create(user_id, feed_id)
            .await
    }

    /// Stop following a feed.
    pub async fn unfollow(&self, user_id: Uuid, feed_id: Uuid) -> Result<()> {
        let removed = FeedFollowRepository::new(self.db.pool())
            .delete(user_id, feed_id)
            .await?;
        if !removed {
            return Err(AggError::NotFound("feed follow".to_string()));
        }
        Ok(())
    }

    /// List a user's follows.
    pub async fn list_follows(&self, user_id: Uuid) -> Result<Vec<FeedFollow>> {
        self.require_user(user_id).await?;
        FeedFollowRepository::new(self.db.pool())
            .list_by_user(user_id)
            .await
    }

    /// List posts from the feeds a user follows, newest first.
    pub async fn posts_for_user(&self, user_id: Uuid, limit: u32) -> Result<Vec<Post>> {
        self.require_user(user_id).await?;
        PostRepository::new(self.db.pool())
            .list_by_user(user_id, limit)
            .await
    }

    async fn require_user(&self, user_id: Uuid) -> Result<()> {
        UserRepository::new(self.db.pool())
            .get_by_id(user_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| AggError::NotFound("user".to_string()))
    }
}
