//! Feed fetcher.
//!
//! Downloads a feed document over HTTP with timeouts and a size cap, and
//! parses it into [`NormalizedEntry`] values in source order.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::parser;
use reqwest::Client;
use tracing::debug;

use crate::config::IngestConfig;
use crate::feed::{NormalizedEntry, UNTITLED};
use crate::{AggError, Result};

/// Source of feed entries, keyed by feed URL.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Retrieve and parse the feed at `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<NormalizedEntry>>;
}

/// HTTP feed fetcher.
pub struct FeedFetcher {
    client: Client,
    max_feed_size: u64,
}

impl FeedFetcher {
    /// Create a fetcher using the timeouts and limits from `config`.
    pub fn new(config: &IngestConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .timeout(Duration::from_secs(config.total_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| AggError::Http(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_feed_size: config.max_feed_size_bytes,
        })
    }
}

#[async_trait]
impl FeedSource for FeedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<NormalizedEntry>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AggError::Http(format!("failed to fetch {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(AggError::Http(format!(
                "{} returned HTTP {}",
                url,
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_feed_size {
                return Err(AggError::Http(format!(
                    "feed too large: {} bytes (max {} bytes)",
                    content_length, self.max_feed_size
                )));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AggError::Http(format!("failed to read {}: {}", url, e)))?;

        // Chunked responses carry no Content-Length
        if bytes.len() as u64 > self.max_feed_size {
            return Err(AggError::Http(format!(
                "feed too large: {} bytes (max {} bytes)",
                bytes.len(),
                self.max_feed_size
            )));
        }

        parse_feed(&bytes)
    }
}

/// Parse a publication timestamp.
///
/// RSS dates must be RFC 2822 and Atom dates RFC 3339; anything else is
/// rejected.
pub fn parse_published(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    DateTime::parse_from_rfc2822(text)
        .or_else(|_| DateTime::parse_from_rfc3339(text))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Stand-in returned for unparseable dates. The n-th rejected text maps to
/// this instant plus n seconds, far before any real publication date.
const UNPARSEABLE: DateTime<Utc> = DateTime::<Utc>::MIN_UTC;

/// Rejected date text behind a stand-in timestamp, if `ts` is one.
fn rejected_text(rejected: &Mutex<Vec<String>>, ts: DateTime<Utc>) -> Option<String> {
    let index = usize::try_from(ts.signed_duration_since(UNPARSEABLE).num_seconds()).ok()?;
    rejected.lock().ok()?.get(index).cloned()
}

/// Parse a feed document into entries.
///
/// Fails without returning any entry if the document is malformed or if
/// the publication date of any entry does not match [`parse_published`].
/// Feed-level dates such as `lastBuildDate` are not checked. Entries
/// without a link are dropped.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<NormalizedEntry>> {
    let rejected: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&rejected);

    let parser = parser::Builder::new()
        .timestamp_parser(move |text| {
            parse_published(text).or_else(|| {
                let mut bad = sink.lock().ok()?;
                let offset = chrono::Duration::seconds(bad.len() as i64);
                bad.push(text.trim().to_string());
                UNPARSEABLE.checked_add_signed(offset)
            })
        })
        .build();

    let feed = parser
        .parse(bytes)
        .map_err(|e| AggError::FeedParse(format!("failed to parse feed: {}", e)))?;

    let mut entries = Vec::with_capacity(feed.entries.len());
    for entry in feed.entries {
        let published_at = entry.published.or(entry.updated);
        if let Some(text) = published_at.and_then(|ts| rejected_text(&rejected, ts)) {
            return Err(AggError::FeedParse(format!(
                "unrecognized date format: {:?}",
                text
            )));
        }

        let Some(link) = entry.links.first().map(|l| l.href.clone()) else {
            debug!("Skipping entry {} without a link", entry.id);
            continue;
        };

        let title = entry
            .title
            .map(|t| t.content)
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| UNTITLED.to_string());
        let description = entry
            .summary
            .map(|t| t.content)
            .or_else(|| entry.content.and_then(|c| c.body));

        let mut normalized = NormalizedEntry::new(title, link);
        if let Some(description) = description {
            normalized = normalized.with_description(description);
        }
        if let Some(published_at) = published_at {
            normalized = normalized.with_published_at(published_at);
        }
        entries.push(normalized);
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_published_rfc2822() {
        let expected = Utc.with_ymd_and_hms(2023, 11, 7, 13, 0, 0).unwrap();
        assert_eq!(
            parse_published("Tue, 07 Nov 2023 14:00:00 +0100"),
            Some(expected)
        );
        assert_eq!(
            parse_published("  Tue, 07 Nov 2023 13:00:00 GMT\n"),
            Some(expected)
        );
    }

    #[test]
    fn test_parse_published_rfc3339() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_published("2025-01-01T00:00:00Z"), Some(expected));
    }

    #[test]
    fn test_parse_published_rejects_other_formats() {
        assert_eq!(parse_published("yesterday"), None);
        assert_eq!(parse_published("2025/01/01 10:00"), None);
        assert_eq!(parse_published(""), None);
    }

    #[test]
    fn test_parse_feed_rss() {
        let rss = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <link>https://x.test</link>
    <description>A test feed</description>
    <item>
      <title>First Article</title>
      <link>https://x.test/1</link>
      <description>First description</description>
      <pubDate>Tue, 07 Nov 2023 13:00:00 +0000</pubDate>
    </item>
    <item>
      <title>Second Article</title>
      <link>https://x.test/2</link>
    </item>
  </channel>
</rss>"#;

        let entries = parse_feed(rss.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].title, "First Article");
        assert_eq!(entries[0].link, "https://x.test/1");
        assert_eq!(entries[0].description.as_deref(), Some("First description"));
        assert_eq!(
            entries[0].published_at,
            Some(Utc.with_ymd_and_hms(2023, 11, 7, 13, 0, 0).unwrap())
        );

        assert_eq!(entries[1].title, "Second Article");
        assert_eq!(entries[1].description, None);
        assert_eq!(entries[1].published_at, None);
    }

    #[test]
    fn test_parse_feed_atom() {
        let atom = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Feed</title>
  <id>urn:uuid:feed</id>
  <updated>2025-01-01T00:00:00Z</updated>
  <entry>
    <id>urn:uuid:1</id>
    <title>Atom Entry</title>
    <link href="https://x.test/entry"/>
    <summary>Entry summary</summary>
    <updated>2025-01-01T00:00:00Z</updated>
  </entry>
</feed>"#;

        let entries = parse_feed(atom.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Atom Entry");
        assert_eq!(entries[0].link, "https://x.test/entry");
        assert_eq!(entries[0].description.as_deref(), Some("Entry summary"));
        assert_eq!(
            entries[0].published_at,
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_feed_keeps_source_order() {
        let items: String = (1..=5)
            .map(|i| format!("<item><title>Item {i}</title><link>https://x.test/{i}</link></item>"))
            .collect();
        let rss = format!(r#"<rss version="2.0"><channel><title>T</title>{items}</channel></rss>"#);

        let entries = parse_feed(rss.as_bytes()).unwrap();
        let titles: Vec<_> = entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Item 1", "Item 2", "Item 3", "Item 4", "Item 5"]);
    }

    #[test]
    fn test_parse_feed_bad_date_fails_whole_feed() {
        let rss = r#"<rss version="2.0">
  <channel>
    <title>T</title>
    <item>
      <title>Good</title>
      <link>https://x.test/1</link>
      <pubDate>Tue, 07 Nov 2023 13:00:00 +0000</pubDate>
    </item>
    <item>
      <title>Bad</title>
      <link>https://x.test/2</link>
      <pubDate>sometime last week</pubDate>
    </item>
  </channel>
</rss>"#;

        let err = parse_feed(rss.as_bytes()).unwrap_err();
        assert!(matches!(err, AggError::FeedParse(_)));
        assert!(err.to_string().contains("sometime last week"));
    }

    #[test]
    fn test_parse_feed_ignores_bad_channel_dates() {
        let rss = r#"<rss version="2.0">
  <channel>
    <title>T</title>
    <pubDate>last tuesday</pubDate>
    <lastBuildDate>2024-01-01 10:00:00</lastBuildDate>
    <item>
      <title>Good</title>
      <link>https://x.test/1</link>
      <pubDate>Tue, 07 Nov 2023 13:00:00 +0000</pubDate>
    </item>
  </channel>
</rss>"#;

        let entries = parse_feed(rss.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].published_at,
            Some(Utc.with_ymd_and_hms(2023, 11, 7, 13, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_feed_ignores_bad_atom_feed_updated() {
        let atom = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Feed</title>
  <id>urn:uuid:feed</id>
  <updated>yesterday</updated>
  <entry>
    <id>urn:uuid:1</id>
    <title>Atom Entry</title>
    <link href="https://x.test/entry"/>
    <updated>2025-01-01T00:00:00Z</updated>
  </entry>
</feed>"#;

        let entries = parse_feed(atom.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].published_at,
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_feed_reports_the_entry_date_not_the_channel_date() {
        let rss = r#"<rss version="2.0">
  <channel>
    <title>T</title>
    <lastBuildDate>soon</lastBuildDate>
    <item>
      <title>Bad</title>
      <link>https://x.test/1</link>
      <pubDate>2023-11-07 13:00</pubDate>
    </item>
  </channel>
</rss>"#;

        let err = parse_feed(rss.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("2023-11-07 13:00"), "{err}");
    }

    #[test]
    fn test_parse_feed_skips_entries_without_link() {
        let rss = r#"<rss version="2.0">
  <channel>
    <title>T</title>
    <item><guid isPermaLink="false">no-link</guid><title>Orphan</title></item>
    <item><title>Linked</title><link>https://x.test/1</link></item>
  </channel>
</rss>"#;

        let entries = parse_feed(rss.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Linked");
    }

    #[test]
    fn test_parse_feed_untitled_entry() {
        let rss = r#"<rss version="2.0"><channel><title>T</title>
<item><link>https://x.test/1</link></item>
</channel></rss>"#;

        let entries = parse_feed(rss.as_bytes()).unwrap();
        assert_eq!(entries[0].title, UNTITLED);
    }

    #[test]
    fn test_parse_feed_invalid() {
        let err = parse_feed("This is not XML".as_bytes()).unwrap_err();
        assert!(matches!(err, AggError::FeedParse(_)));
    }

    #[test]
    fn test_fetcher_new_from_default_config() {
        assert!(FeedFetcher::new(&IngestConfig::default()).is_ok());
    }
}
