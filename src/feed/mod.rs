//! Content-source collaborators: RSS collection and article extraction.

pub mod extract;
pub mod rss;

pub use extract::HttpExtractor;
pub use rss::FeedClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StoreError;
use crate::store::SeenStore;

/// One discovered news candidate.
///
/// Created unscored at ingestion; `hype_score` and `summary` are written once
/// by the analysis step and immutable after that.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub source: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,
    /// 1–10 once scored, 0 while unscored.
    #[serde(default)]
    pub hype_score: u8,
    pub fingerprint: String,
}

impl NewsItem {
    pub fn new(title: impl Into<String>, url: impl Into<String>, source: impl Into<String>) -> Self {
        let url = url.into();
        let fingerprint = fingerprint_url(&url);
        Self {
            title: title.into(),
            url,
            source: source.into(),
            summary: String::new(),
            published: None,
            hype_score: 0,
            fingerprint,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }
}

/// Fingerprints are truncated sha256 — short enough to ride inside a
/// 64-byte callback payload next to an action tag.
const FINGERPRINT_LEN: usize = 16;

/// Deterministic identity digest of an item — sha256 of its canonical URL.
pub fn fingerprint_url(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(FINGERPRINT_LEN);
    hex
}

/// A single RSS/Atom feed to poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub rss_url: String,
}

impl FeedSource {
    pub fn new(name: impl Into<String>, rss_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rss_url: rss_url.into(),
        }
    }

    /// Default motorsport feed set.
    pub fn defaults() -> Vec<FeedSource> {
        vec![
            FeedSource::new(
                "Formula1.com",
                "https://www.formula1.com/content/fom-website/en/latest/all.xml",
            ),
            FeedSource::new("Autosport", "https://www.autosport.com/rss/feed/f1"),
            FeedSource::new("Motorsport.com", "https://www.motorsport.com/rss/f1/news/"),
            FeedSource::new("RaceFans", "https://www.racefans.net/feed/"),
            FeedSource::new("PlanetF1", "https://www.planetf1.com/feed/"),
            FeedSource::new("The Race", "https://the-race.com/feed/"),
            FeedSource::new("Crash.net", "https://www.crash.net/rss/f1/news"),
            FeedSource::new("GPFans", "https://www.gpfans.com/en/rss.xml"),
        ]
    }
}

/// Produces unscored candidates, one finite batch per ingestion cycle.
/// Per-source failures must be logged and swallowed, never propagated.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn collect(&self) -> Vec<NewsItem>;
}

/// Best-effort plain-text extraction for a URL. An empty string is a valid
/// non-error result; callers fall back to title + summary.
#[async_trait]
pub trait ArticleExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> String;
}

/// Filter a candidate batch against the seen-store, then record *all*
/// candidate fingerprints (including filtered ones — they were seen even if
/// not yielded).
///
/// The record step runs only after the filtered batch is materialized, which
/// makes ingestion idempotent under retry: a crash before the record step
/// re-yields the same batch, a rerun after it yields nothing.
pub fn admit_new(
    candidates: Vec<NewsItem>,
    seen: &mut SeenStore,
) -> Result<Vec<NewsItem>, StoreError> {
    let fresh: Vec<NewsItem> = candidates
        .iter()
        .filter(|item| !seen.contains(&item.fingerprint))
        .cloned()
        .collect();

    seen.record_all(candidates.into_iter().map(|item| item.fingerprint))?;

    tracing::info!(admitted = fresh.len(), "ingestion batch admitted");
    Ok(fresh)
}
