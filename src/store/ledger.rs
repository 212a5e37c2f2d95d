//! Published-post ledger — bounded history of posts that reached the channel.
//!
//! Entries back both the style context fed to generation and the candidate
//! list for reply-thread resolution.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::store::{load_json, save_json};

/// Maximum entries kept; oldest are evicted on every write.
pub const MAX_PUBLISHED: usize = 50;

/// One post that reached the channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishedPost {
    /// Item fingerprint, or a manual id for posts published out-of-band.
    pub uid: String,
    pub title: String,
    /// Full post text as transmitted.
    pub text: String,
    pub channel_message_id: i64,
    pub timestamp: DateTime<Utc>,
}

/// Append-ordered, size-bounded log of published posts.
pub struct Ledger {
    path: PathBuf,
    posts: Vec<PublishedPost>,
}

impl Ledger {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut posts: Vec<PublishedPost> = load_json(&path);
        if posts.len() > MAX_PUBLISHED {
            posts.drain(..posts.len() - MAX_PUBLISHED);
        }
        tracing::debug!(count = posts.len(), path = %path.display(), "ledger loaded");
        Self { path, posts }
    }

    /// Append a post, truncate to the bound, and persist.
    pub fn append(&mut self, post: PublishedPost) -> Result<(), StoreError> {
        tracing::info!(
            uid = %post.uid,
            message_id = post.channel_message_id,
            "post recorded in ledger"
        );
        self.posts.push(post);
        if self.posts.len() > MAX_PUBLISHED {
            self.posts.drain(..self.posts.len() - MAX_PUBLISHED);
        }
        self.save()
    }

    /// All live entries, oldest first.
    pub fn posts(&self) -> &[PublishedPost] {
        &self.posts
    }

    /// The most recent `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> &[PublishedPost] {
        let start = self.posts.len().saturating_sub(n);
        &self.posts[start..]
    }

    /// Texts of the most recent `n` posts for generation context.
    /// The trailing source-link line is stripped to save tokens.
    pub fn recent_texts(&self, n: usize) -> Vec<String> {
        self.recent(n)
            .iter()
            .filter_map(|post| {
                let cleaned: Vec<&str> = post
                    .text
                    .lines()
                    .take_while(|line| !line.trim_start().starts_with("🔗"))
                    .collect();
                let text = cleaned.join("\n").trim().to_string();
                (!text.is_empty()).then_some(text)
            })
            .collect()
    }

    pub fn find_by_uid(&self, uid: &str) -> Option<&PublishedPost> {
        self.posts.iter().find(|p| p.uid == uid)
    }

    /// Drop every entry whose channel message id is in `dead`, preserving
    /// the order of survivors. Persists only if something was removed.
    pub fn remove_by_message_ids(&mut self, dead: &[i64]) -> Result<usize, StoreError> {
        let before = self.posts.len();
        self.posts.retain(|p| !dead.contains(&p.channel_message_id));
        let removed = before - self.posts.len();
        if removed > 0 {
            tracing::info!(removed, "pruned dead ledger entries");
            self.save()?;
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    fn save(&self) -> Result<(), StoreError> {
        save_json(&self.path, &self.posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn post(uid: &str, message_id: i64) -> PublishedPost {
        PublishedPost {
            uid: uid.to_string(),
            title: format!("title {uid}"),
            text: format!("body {uid}\n🔗 Source: https://example.com/{uid}"),
            channel_message_id: message_id,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn ledger_keeps_only_newest_n() {
        let dir = TempDir::new().unwrap();
        let mut ledger = Ledger::load(dir.path().join("ledger.json"));

        for i in 0..(MAX_PUBLISHED as i64 + 5) {
            ledger.append(post(&format!("u{i}"), i)).unwrap();
        }

        assert_eq!(ledger.len(), MAX_PUBLISHED);
        // Oldest evicted first: entry 0..4 gone, 5 survives at the front.
        assert_eq!(ledger.posts()[0].channel_message_id, 5);
        assert_eq!(
            ledger.posts().last().unwrap().channel_message_id,
            MAX_PUBLISHED as i64 + 4
        );
    }

    #[test]
    fn ledger_bound_survives_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        {
            let mut ledger = Ledger::load(&path);
            for i in 0..3 {
                ledger.append(post(&format!("u{i}"), i)).unwrap();
            }
        }
        let ledger = Ledger::load(&path);
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.find_by_uid("u1").unwrap().channel_message_id, 1);
    }

    #[test]
    fn recent_texts_strips_link_line() {
        let dir = TempDir::new().unwrap();
        let mut ledger = Ledger::load(dir.path().join("ledger.json"));
        ledger.append(post("a", 1)).unwrap();

        let texts = ledger.recent_texts(7);
        assert_eq!(texts, vec!["body a".to_string()]);
    }

    #[test]
    fn remove_preserves_order_of_survivors() {
        let dir = TempDir::new().unwrap();
        let mut ledger = Ledger::load(dir.path().join("ledger.json"));
        for i in 0..4 {
            ledger.append(post(&format!("u{i}"), i)).unwrap();
        }

        let removed = ledger.remove_by_message_ids(&[1, 3]).unwrap();
        assert_eq!(removed, 2);
        let ids: Vec<i64> = ledger.posts().iter().map(|p| p.channel_message_id).collect();
        assert_eq!(ids, vec![0, 2]);
    }

    #[test]
    fn recent_handles_short_ledger() {
        let dir = TempDir::new().unwrap();
        let mut ledger = Ledger::load(dir.path().join("ledger.json"));
        ledger.append(post("a", 1)).unwrap();
        assert_eq!(ledger.recent(10).len(), 1);
    }
}
