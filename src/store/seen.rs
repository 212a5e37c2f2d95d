//! Seen-fingerprint set — gates re-ingestion of already-handled items.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::StoreError;
use crate::store::{load_json, save_json};

/// Persisted set of content fingerprints that completed ingestion.
///
/// Membership is checked before, and recorded after, every ingestion batch —
/// never partially (see `feed::admit_new`).
pub struct SeenStore {
    path: PathBuf,
    seen: HashSet<String>,
}

impl SeenStore {
    /// Load the full set into memory. Missing or malformed files start empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries: Vec<String> = load_json(&path);
        let seen: HashSet<String> = entries.into_iter().collect();
        tracing::debug!(count = seen.len(), path = %path.display(), "seen store loaded");
        Self { path, seen }
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.seen.contains(fingerprint)
    }

    /// Record a batch of fingerprints and rewrite the file.
    pub fn record_all<I>(&mut self, fingerprints: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = String>,
    {
        let before = self.seen.len();
        self.seen.extend(fingerprints);
        if self.seen.len() != before {
            self.save()?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn save(&self) -> Result<(), StoreError> {
        let mut entries: Vec<&String> = self.seen.iter().collect();
        entries.sort();
        save_json(&self.path, &entries)
    }

    #[cfg(test)]
    pub(crate) fn path(&self) -> &std::path::Path {
        &self.path
    }
}
