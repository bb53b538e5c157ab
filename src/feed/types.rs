//! Feed, follow and post types for rssagg.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Maximum length (in characters) for a stored post description.
pub const MAX_DESCRIPTION_LENGTH: usize = 10000;

/// Title used for entries that carry none.
pub const UNTITLED: &str = "Untitled";

/// A subscribed feed.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Feed {
    /// Feed ID.
    pub id: Uuid,
    /// Display name chosen by the owner.
    pub name: String,
    /// Feed URL, unique across all feeds.
    pub url: String,
    /// Owner user ID.
    pub user_id: Uuid,
    /// Watermark: last time the feed was ingested completely.
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// When the feed was created.
    pub created_at: DateTime<Utc>,
    /// When the feed was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Feed {
    /// Whether the feed has never been ingested.
    pub fn is_never_fetched(&self) -> bool {
        self.last_fetched_at.is_none()
    }
}

/// New feed for creation.
#[derive(Debug, Clone)]
pub struct NewFeed {
    /// Display name.
    pub name: String,
    /// Feed URL.
    pub url: String,
    /// Owner user ID.
    pub user_id: Uuid,
}

impl NewFeed {
    /// Create a new feed request.
    pub fn new(name: impl Into<String>, url: impl Into<String>, user_id: Uuid) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            user_id,
        }
    }
}

/// A user following a feed.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct FeedFollow {
    /// Follow ID.
    pub id: Uuid,
    /// Following user.
    pub user_id: Uuid,
    /// Followed feed.
    pub feed_id: Uuid,
    /// When the follow was created.
    pub created_at: DateTime<Utc>,
    /// When the follow was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A stored post. Posts are immutable once written.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Post {
    /// Post ID.
    pub id: Uuid,
    /// When the post was ingested.
    pub created_at: DateTime<Utc>,
    /// When the post was last updated.
    pub updated_at: DateTime<Utc>,
    /// Post title.
    pub title: String,
    /// Link to the original article, unique across all posts.
    pub url: String,
    /// Description or summary.
    pub description: Option<String>,
    /// When the source says the entry was published.
    pub published_at: Option<DateTime<Utc>>,
    /// Owning feed.
    pub feed_id: Uuid,
}

/// A feed entry reduced to the fields that get persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEntry {
    /// Entry title.
    pub title: String,
    /// Entry link.
    pub link: String,
    /// Entry description.
    pub description: Option<String>,
    /// Publication time, if the source gives one.
    pub published_at: Option<DateTime<Utc>>,
}

impl NormalizedEntry {
    /// Create a new entry.
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            description: None,
            published_at: None,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the published date.
    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }
}

/// Candidate post record built from a normalized entry.
#[derive(Debug, Clone)]
pub struct NewPost {
    /// Fresh post ID.
    pub id: Uuid,
    /// Owning feed.
    pub feed_id: Uuid,
    /// Post title.
    pub title: String,
    /// Link to the original article.
    pub url: String,
    /// Description, truncated to [`MAX_DESCRIPTION_LENGTH`].
    pub description: Option<String>,
    /// Publication time.
    pub published_at: Option<DateTime<Utc>>,
}

impl NewPost {
    /// Create a new post with a fresh ID.
    pub fn new(feed_id: Uuid, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            feed_id,
            title: title.into(),
            url: url.into(),
            description: None,
            published_at: None,
        }
    }

    /// Build the post for `entry` belonging to `feed_id`.
    pub fn from_entry(feed_id: Uuid, entry: NormalizedEntry) -> Self {
        let mut post = Self::new(feed_id, entry.title, entry.link);
        if let Some(description) = entry.description {
            post = post.with_description(description);
        }
        post.published_at = entry.published_at;
        post
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let desc = description.into();
        if desc.chars().count() > MAX_DESCRIPTION_LENGTH {
            self.description = Some(desc.chars().take(MAX_DESCRIPTION_LENGTH).collect());
        } else {
            self.description = Some(desc);
        }
        self
    }

    /// Set the published date.
    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }
}

/// Result of a post insert that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The post was written.
    Inserted,
    /// A post with the same URL already exists; nothing was written.
    Duplicate,
}
