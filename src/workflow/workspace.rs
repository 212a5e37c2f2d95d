//! In-memory per-item working state.
//!
//! Owned by the lifecycle controller and injected where needed — never
//! process-global. Entries are evicted once untouched for longer than the
//! configured TTL; pending edit/photo captures carry their own expiry.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::feed::NewsItem;

/// Stale draft entries are dropped after this long without a touch.
const ENTRY_TTL_HOURS: i64 = 24;

/// Pending edit/photo captures expire after this long.
const PENDING_TTL_MINUTES: i64 = 15;

/// Lifecycle position of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    /// Scored and alerted, no draft yet.
    Scored,
    /// Draft present, publishable.
    Ready,
    /// Waiting for replacement text from the operator.
    Editing,
    /// Waiting for a photo from the operator.
    AwaitingMedia,
    /// Operator is browsing reply candidates.
    SelectingReply,
    /// Terminal.
    Published,
}

/// Mutable working state for one discovered item, keyed by fingerprint.
#[derive(Debug, Clone)]
pub struct DraftEntry {
    pub item: NewsItem,
    pub state: ItemState,
    pub draft: Option<String>,
    pub photo_file_id: Option<String>,
    /// Explicitly selected reply target (channel message id).
    pub reply_target: Option<i64>,
    /// Resolver suggestion awaiting the operator's decision.
    pub proposed_reply: Option<i64>,
    pub touched_at: DateTime<Utc>,
}

impl DraftEntry {
    fn new(item: NewsItem) -> Self {
        Self {
            item,
            state: ItemState::Scored,
            draft: None,
            photo_file_id: None,
            reply_target: None,
            proposed_reply: None,
            touched_at: Utc::now(),
        }
    }
}

/// What a conversation is currently expected to supply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingKind {
    Edit { uid: String },
    Photo { uid: String },
}

impl PendingKind {
    pub fn uid(&self) -> &str {
        match self {
            PendingKind::Edit { uid } | PendingKind::Photo { uid } => uid,
        }
    }
}

#[derive(Debug, Clone)]
struct PendingAction {
    kind: PendingKind,
    expires_at: DateTime<Utc>,
}

/// Per-item draft state plus per-conversation pending-input state.
pub struct Workspace {
    entries: RwLock<HashMap<String, DraftEntry>>,
    pending: RwLock<HashMap<i64, PendingAction>>,
    /// Per-fingerprint transition locks; every lifecycle transition for a
    /// fingerprint is serialized through its lock.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    entry_ttl: Duration,
    pending_ttl: Duration,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            pending: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            entry_ttl: Duration::hours(ENTRY_TTL_HOURS),
            pending_ttl: Duration::minutes(PENDING_TTL_MINUTES),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_ttls(entry_ttl: Duration, pending_ttl: Duration) -> Self {
        Self {
            entry_ttl,
            pending_ttl,
            ..Self::new()
        }
    }

    /// The transition lock for a fingerprint, created on first use.
    pub async fn transition_lock(&self, uid: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(uid.to_string()).or_default())
    }

    /// Track a scored item. An existing entry is kept (its draft survives a
    /// repeat alert) and only refreshed.
    pub async fn insert_item(&self, item: NewsItem) {
        let mut entries = self.entries.write().await;
        entries
            .entry(item.fingerprint.clone())
            .and_modify(|entry| entry.touched_at = Utc::now())
            .or_insert_with(|| DraftEntry::new(item));
    }

    pub async fn get(&self, uid: &str) -> Option<DraftEntry> {
        self.entries.read().await.get(uid).cloned()
    }

    /// Mutate an entry in place, refreshing its touch time.
    /// Returns false when the entry is gone.
    pub async fn modify<F>(&self, uid: &str, mutate: F) -> bool
    where
        F: FnOnce(&mut DraftEntry),
    {
        let mut entries = self.entries.write().await;
        match entries.get_mut(uid) {
            Some(entry) => {
                mutate(entry);
                entry.touched_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    // ── Pending input ───────────────────────────────────────────────

    /// Arm a pending edit/photo capture for a conversation, replacing any
    /// previous one.
    pub async fn set_pending(&self, chat_id: i64, kind: PendingKind) {
        let mut pending = self.pending.write().await;
        pending.insert(
            chat_id,
            PendingAction {
                kind,
                expires_at: Utc::now() + self.pending_ttl,
            },
        );
    }

    /// Disarm every pending capture aimed at an item, in any conversation.
    pub async fn clear_pending_for(&self, uid: &str) {
        self.pending
            .write()
            .await
            .retain(|_, action| action.kind.uid() != uid);
    }

    /// Consume the pending capture for a conversation. Expired captures are
    /// dropped and reported as absent.
    pub async fn take_pending(&self, chat_id: i64) -> Option<PendingKind> {
        let action = self.pending.write().await.remove(&chat_id)?;
        if action.expires_at < Utc::now() {
            tracing::debug!(chat_id, "pending action expired before input arrived");
            return None;
        }
        Some(action.kind)
    }

    // ── Eviction ────────────────────────────────────────────────────

    /// Drop entries untouched past the TTL and expired pending captures.
    /// Returns (entries evicted, pendings evicted).
    pub async fn evict_stale(&self) -> (usize, usize) {
        let now = Utc::now();

        let removed_uids: Vec<String> = {
            let mut entries = self.entries.write().await;
            let stale: Vec<String> = entries
                .iter()
                .filter(|(_, e)| now - e.touched_at > self.entry_ttl)
                .map(|(uid, _)| uid.clone())
                .collect();
            for uid in &stale {
                entries.remove(uid);
            }
            stale
        };

        {
            let mut locks = self.locks.lock().await;
            for uid in &removed_uids {
                locks.remove(uid);
            }
        }

        let pendings_removed = {
            let mut pending = self.pending.write().await;
            let before = pending.len();
            pending.retain(|_, action| action.expires_at >= now);
            before - pending.len()
        };

        if !removed_uids.is_empty() || pendings_removed > 0 {
            tracing::info!(
                entries = removed_uids.len(),
                pendings = pendings_removed,
                "workspace eviction pass"
            );
        }
        (removed_uids.len(), pendings_removed)
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}
