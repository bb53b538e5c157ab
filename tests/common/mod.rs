//! Test helpers for ingestion tests.
//!
//! Provides a scripted feed source, a post store that fails on demand, and
//! database fixtures.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use rssagg::db::{NewUser, UserRepository};
use rssagg::feed::{FeedRepository, NewFeed, PostRepository};
use rssagg::ingest::parse_feed;
use rssagg::{
    AggError, Database, Feed, FeedSource, IngestConfig, InsertOutcome, NewPost, NormalizedEntry,
    Post, PostStore, Result,
};

/// What a scripted URL answers with.
#[derive(Clone)]
pub enum Script {
    /// Already normalized entries.
    Entries(Vec<NormalizedEntry>),
    /// A raw document run through the real parser.
    Document(String),
    /// A fetch failure.
    Fail(String),
}

/// Feed source answering from a per-URL script.
#[derive(Default)]
pub struct ScriptedSource {
    scripts: Mutex<HashMap<String, Script>>,
    fetched: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Set what `url` answers with from now on.
    pub fn script(&self, url: &str, script: Script) {
        self.scripts.lock().unwrap().insert(url.to_string(), script);
    }

    /// URLs fetched so far, in call order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetched.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl FeedSource for ScriptedSource {
    async fn fetch(&self, url: &str) -> Result<Vec<NormalizedEntry>> {
        self.fetched.lock().unwrap().push(url.to_string());
        let script = self.scripts.lock().unwrap().get(url).cloned();
        match script {
            Some(Script::Entries(entries)) => Ok(entries),
            Some(Script::Document(body)) => parse_feed(body.as_bytes()),
            Some(Script::Fail(reason)) => Err(AggError::Http(reason)),
            None => Err(AggError::Http(format!("no script for {url}"))),
        }
    }
}

/// Feed source that takes `delay` per fetch and records how many fetches
/// were in progress at once.
pub struct SlowSource {
    delay: Duration,
    per_feed: usize,
    current: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl SlowSource {
    /// Each fetch answers with `per_feed` entries under the feed URL.
    pub fn new(delay: Duration, per_feed: usize) -> Arc<Self> {
        Arc::new(Self {
            delay,
            per_feed,
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    /// Highest number of simultaneous fetches seen.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for SlowSource {
    async fn fetch(&self, url: &str) -> Result<Vec<NormalizedEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(entries(url, self.per_feed))
    }
}

/// Post store over SQLite that fails when inserting one particular URL.
pub struct FailingPosts {
    inner: PostRepository,
    fail_url: String,
    attempts: AtomicUsize,
}

impl FailingPosts {
    pub fn new(db: &Database, fail_url: &str) -> Arc<Self> {
        Arc::new(Self {
            inner: PostRepository::new(db.pool()),
            fail_url: fail_url.to_string(),
            attempts: AtomicUsize::new(0),
        })
    }

    /// Inserts attempted, including the failing one.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PostStore for FailingPosts {
    async fn insert_post(&self, post: &NewPost) -> Result<InsertOutcome> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if post.url == self.fail_url {
            return Err(AggError::Database("database disk image is malformed".to_string()));
        }
        self.inner.insert_post(post).await
    }

    async fn list_for_user(&self, user_id: Uuid, limit: u32) -> Result<Vec<Post>> {
        self.inner.list_for_user(user_id, limit).await
    }
}

pub async fn setup_db() -> Database {
    Database::open_in_memory().await.unwrap()
}

pub async fn create_user(db: &Database, name: &str) -> Uuid {
    UserRepository::new(db.pool())
        .create(&NewUser::new(name))
        .await
        .unwrap()
        .id
}

/// Insert a feed directly, bypassing URL validation.
pub async fn create_feed(db: &Database, owner: Uuid, url: &str) -> Feed {
    FeedRepository::new(db.pool())
        .create(&NewFeed::new(url, url, owner))
        .await
        .unwrap()
}

pub async fn reload_feed(db: &Database, feed: &Feed) -> Feed {
    FeedRepository::new(db.pool())
        .get_by_id(feed.id)
        .await
        .unwrap()
        .unwrap()
}

/// `n` entries linking to `{base}/1` .. `{base}/n`.
pub fn entries(base: &str, n: usize) -> Vec<NormalizedEntry> {
    (1..=n)
        .map(|i| NormalizedEntry::new(format!("Post {i}"), format!("{base}/{i}")))
        .collect()
}

pub fn ingest_config(batch_size: u32) -> IngestConfig {
    IngestConfig {
        batch_size,
        ..IngestConfig::default()
    }
}
