//! Day-scoped aggregate of every scored item (not just published ones).
//!
//! Backs the /digest command. At most one day's bucket is retained: on every
//! load and save, any bucket whose key is not today is discarded — stale
//! digests must never be presented as today's.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Local;

use crate::error::StoreError;
use crate::feed::NewsItem;
use crate::store::{load_json, save_json};

fn today_key() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Single-day accumulation of scored items, deduplicated by fingerprint.
pub struct DailyCache {
    path: PathBuf,
    day: String,
    items: Vec<NewsItem>,
}

impl DailyCache {
    /// Load, discarding any bucket that is not today's.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let day = today_key();
        let mut buckets: HashMap<String, Vec<NewsItem>> = load_json(&path);
        let items = buckets.remove(&day).unwrap_or_default();
        tracing::debug!(day = %day, count = items.len(), "daily cache loaded");
        Self { path, day, items }
    }

    /// Append newly scored items into today's bucket.
    ///
    /// Rolls the bucket over first if the calendar day has changed since the
    /// last touch; dedups by fingerprint against what is already recorded.
    pub fn record(&mut self, items: &[NewsItem]) -> Result<(), StoreError> {
        self.roll_over();

        let mut added = 0;
        for item in items {
            if self
                .items
                .iter()
                .any(|existing| existing.fingerprint == item.fingerprint)
            {
                continue;
            }
            self.items.push(item.clone());
            added += 1;
        }

        if added > 0 {
            self.save()?;
        }
        tracing::debug!(added, total = self.items.len(), "daily cache updated");
        Ok(())
    }

    /// Today's items with `min <= score <= max`, sorted by score descending.
    pub fn query_range(&mut self, min: u8, max: u8) -> Vec<NewsItem> {
        self.roll_over();
        let mut hits: Vec<NewsItem> = self
            .items
            .iter()
            .filter(|item| (min..=max).contains(&item.hype_score))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.hype_score.cmp(&a.hype_score));
        hits
    }

    /// Number of items recorded today.
    pub fn today_count(&mut self) -> usize {
        self.roll_over();
        self.items.len()
    }

    fn roll_over(&mut self) {
        let today = today_key();
        if self.day != today {
            tracing::info!(old_day = %self.day, "daily cache rolled over");
            self.day = today;
            self.items.clear();
        }
    }

    fn save(&self) -> Result<(), StoreError> {
        let mut buckets = HashMap::new();
        buckets.insert(self.day.clone(), &self.items);
        save_json(&self.path, &buckets)
    }
}
