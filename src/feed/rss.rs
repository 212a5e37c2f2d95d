//! RSS/Atom collection over reqwest + feed-rs.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::FeedError;
use crate::feed::extract::strip_tags;
use crate::feed::{ContentSource, FeedSource, NewsItem};

/// Newest entries taken per source per cycle.
const MAX_ENTRIES_PER_SOURCE: usize = 15;

/// Feed summaries are capped after HTML stripping.
const MAX_SUMMARY_CHARS: usize = 500;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Polls a fixed set of RSS/Atom feeds.
pub struct FeedClient {
    http: reqwest::Client,
    sources: Vec<FeedSource>,
}

impl FeedClient {
    pub fn new(sources: Vec<FeedSource>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(USER_AGENT)
            .build()
            .expect("failed to build feed HTTP client");
        Self { http, sources }
    }

    /// Fetch and parse one source.
    async fn fetch_source(&self, source: &FeedSource) -> Result<Vec<NewsItem>, FeedError> {
        let resp = self.http.get(&source.rss_url).send().await?;
        let bytes = resp.bytes().await?;

        let feed = feed_rs::parser::parse(&bytes[..]).map_err(|e| FeedError::Parse {
            feed: source.name.clone(),
            reason: e.to_string(),
        })?;

        let items = feed
            .entries
            .into_iter()
            .take(MAX_ENTRIES_PER_SOURCE)
            .filter_map(|entry| {
                let title = entry.title.map(|t| t.content.trim().to_string())?;
                let url = entry
                    .links
                    .first()
                    .map(|l| l.href.clone())
                    .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;
                if title.is_empty() || url.is_empty() {
                    return None;
                }

                let summary = entry
                    .summary
                    .map(|s| clean_summary(&s.content))
                    .unwrap_or_default();
                let published = entry
                    .published
                    .or(entry.updated)
                    .map(|dt| dt.with_timezone(&Utc));

                let mut item = NewsItem::new(title, url, source.name.clone()).with_summary(summary);
                item.published = published;
                Some(item)
            })
            .collect();

        Ok(items)
    }
}

#[async_trait]
impl ContentSource for FeedClient {
    async fn collect(&self) -> Vec<NewsItem> {
        let fetches = self
            .sources
            .iter()
            .map(|source| async move { (source, self.fetch_source(source).await) });

        let mut all = Vec::new();
        for (source, result) in futures::future::join_all(fetches).await {
            match result {
                Ok(items) => {
                    tracing::info!(source = %source.name, count = items.len(), "feed parsed");
                    all.extend(items);
                }
                Err(e) => {
                    tracing::warn!(source = %source.name, error = %e, "feed fetch failed");
                }
            }
        }
        all
    }
}

/// Strip markup from a feed summary and cap its length.
fn clean_summary(raw: &str) -> String {
    let text = strip_tags(raw);
    if text.chars().count() > MAX_SUMMARY_CHARS {
        text.chars().take(MAX_SUMMARY_CHARS).collect()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_summary_strips_markup() {
        let s = clean_summary("<p>Hello <b>world</b></p>");
        assert_eq!(s, "Hello world");
    }

    #[test]
    fn clean_summary_caps_length() {
        let long = "x".repeat(2000);
        assert_eq!(clean_summary(&long).chars().count(), MAX_SUMMARY_CHARS);
    }
}
