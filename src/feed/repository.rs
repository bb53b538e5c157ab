//! SQLite repositories for feeds, follows and posts.

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::store::{FeedStore, PostStore};
use super::types::{Feed, FeedFollow, InsertOutcome, NewFeed, NewPost, Post};
use crate::db::DbPool;
use crate::{AggError, Result};

const FEED_COLUMNS: &str = "id, name, url, user_id, last_fetched_at, created_at, updated_at";

const POST_COLUMNS: &str =
    "p.id, p.created_at, p.updated_at, p.title, p.url, p.description, p.published_at, p.feed_id";

/// Whether `err` is a UNIQUE/PRIMARY KEY constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

/// Repository for feed operations.
///
/// Holds its own handle to the pool so it can be shared with spawned tasks.
#[derive(Clone)]
pub struct FeedRepository {
    pool: DbPool,
}

impl FeedRepository {
    /// Create a new repository instance.
    pub fn new(pool: &DbPool) -> Self {
        Self { pool: pool.clone() }
    }

    /// Create a new feed.
    pub async fn create(&self, feed: &NewFeed) -> Result<Feed> {
        let now = Utc::now();
        let query = format!(
            "INSERT INTO feeds (id, name, url, user_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {FEED_COLUMNS}"
        );
        sqlx::query_as::<_, Feed>(&query)
            .bind(Uuid::new_v4())
            .bind(&feed.name)
            .bind(&feed.url)
            .bind(feed.user_id)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AggError::Validation(format!("a feed with URL {} already exists", feed.url))
                } else {
                    AggError::from(e)
                }
            })
    }

    /// Get a feed by ID.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Feed>> {
        let query = format!("SELECT {FEED_COLUMNS} FROM feeds WHERE id = $1");
        let feed = sqlx::query_as::<_, Feed>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(feed)
    }

    /// Get a feed by URL.
    pub async fn get_by_url(&self, url: &str) -> Result<Option<Feed>> {
        let query = format!("SELECT {FEED_COLUMNS} FROM feeds WHERE url = $1");
        let feed = sqlx::query_as::<_, Feed>(&query)
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;

        Ok(feed)
    }

    /// List all feeds in creation order.
    pub async fn list_all(&self) -> Result<Vec<Feed>> {
        let query = format!("SELECT {FEED_COLUMNS} FROM feeds ORDER BY created_at ASC");
        let feeds = sqlx::query_as::<_, Feed>(&query)
            .fetch_all(&self.pool)
            .await?;

        Ok(feeds)
    }

    /// List feeds that are due for fetching, stalest first.
    pub async fn list_due(&self, limit: u32) -> Result<Vec<Feed>> {
        let query = format!(
            "SELECT {FEED_COLUMNS}
             FROM feeds
             ORDER BY last_fetched_at ASC NULLS FIRST, created_at ASC
             LIMIT $1"
        );
        let feeds = sqlx::query_as::<_, Feed>(&query)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(feeds)
    }

    /// Set `last_fetched_at` of the feed with `url` to now.
    pub async fn update_last_fetched(&self, url: &str) -> Result<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE feeds SET last_fetched_at = $1, updated_at = $2 WHERE url = $3",
        )
        .bind(now)
        .bind(now)
        .bind(url)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count all feeds.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feeds")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[async_trait]
impl FeedStore for FeedRepository {
    async fn next_due_feeds(&self, limit: u32) -> Result<Vec<Feed>> {
        self.list_due(limit).await
    }

    async fn mark_fetched(&self, url: &str) -> Result<bool> {
        self.update_last_fetched(url).await
    }
}

/// Repository for feed follow operations.
pub struct FeedFollowRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> FeedFollowRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Make `user_id` follow `feed_id`.
    pub async fn create(&self, user_id: Uuid, feed_id: Uuid) -> Result<FeedFollow> {
        let now = Utc::now();
        sqlx::query_as::<_, FeedFollow>(
            "INSERT INTO feed_follows (id, user_id, feed_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, user_id, feed_id, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(feed_id)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AggError::Validation("user already follows this feed".to_string())
            } else {
                AggError::from(e)
            }
        })
    }

    /// Remove the follow of `feed_id` by `user_id`.
    pub async fn delete(&self, user_id: Uuid, feed_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feed_follows WHERE user_id = $1 AND feed_id = $2")
            .bind(user_id)
            .bind(feed_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List the follows of a user in creation order.
    pub async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<FeedFollow>> {
        let follows = sqlx::query_as::<_, FeedFollow>(
            "SELECT id, user_id, feed_id, created_at, updated_at
             FROM feed_follows
             WHERE user_id = $1
             ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(follows)
    }
}

/// Repository for post operations.
#[derive(Clone)]
pub struct PostRepository {
    pool: DbPool,
}

impl PostRepository {
    /// Create a new repository instance.
    pub fn new(pool: &DbPool) -> Self {
        Self { pool: pool.clone() }
    }

    /// Insert a post, reporting a URL collision as a duplicate.
    pub async fn create(&self, post: &NewPost) -> Result<InsertOutcome> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO posts
                 (id, created_at, updated_at, title, url, description, published_at, feed_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(post.id)
        .bind(now)
        .bind(now)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at)
        .bind(post.feed_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::Duplicate),
            Err(e) => Err(e.into()),
        }
    }

    /// Get a post by URL.
    pub async fn get_by_url(&self, url: &str) -> Result<Option<Post>> {
        let query = format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.url = $1");
        let post = sqlx::query_as::<_, Post>(&query)
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;

        Ok(post)
    }

    /// List posts of a feed, newest first.
    pub async fn list_by_feed(&self, feed_id: Uuid, limit: u32) -> Result<Vec<Post>> {
        let query = format!(
            "SELECT {POST_COLUMNS}
             FROM posts p
             WHERE p.feed_id = $1
             ORDER BY p.published_at DESC NULLS LAST, p.created_at DESC
             LIMIT $2"
        );
        let posts = sqlx::query_as::<_, Post>(&query)
            .bind(feed_id)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(posts)
    }

    /// List posts of every feed a user follows, newest first.
    pub async fn list_by_user(&self, user_id: Uuid, limit: u32) -> Result<Vec<Post>> {
        let query = format!(
            "SELECT {POST_COLUMNS}
             FROM posts p
             JOIN feed_follows ff ON ff.feed_id = p.feed_id
             WHERE ff.user_id = $1
             ORDER BY p.published_at DESC NULLS LAST, p.created_at DESC
             LIMIT $2"
        );
        let posts = sqlx::query_as::<_, Post>(&query)
            .bind(user_id)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(posts)
    }

    /// Count all posts.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Count the posts of a feed.
    pub async fn count_by_feed(&self, feed_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE feed_id = $1")
            .bind(feed_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[async_trait]
impl PostStore for PostRepository {
    async fn insert_post(&self, post: &NewPost) -> Result<InsertOutcome> {
        self.create(post).await
    }

    async fn list_for_user(&self, user_id: Uuid, limit: u32) -> Result<Vec<Post>> {
        self.list_by_user(user_id, limit).await
    }
}
