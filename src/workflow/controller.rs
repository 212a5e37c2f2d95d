//! Lifecycle controller — orchestrates every state transition for an item:
//! discovery → scoring → draft generation → (edit | attach-media |
//! select-reply)* → publish → ledger append.
//!
//! Collaborator failures at any transition leave the item in its prior state
//! and surface to the operator; every retry is operator-initiated.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use chrono::Utc;
use tokio::sync::Mutex;

use crate::channel::{ChannelApi, SendOptions, truncate_caption};
use crate::config::ResolverFailurePolicy;
use crate::error::{Error, WorkflowError};
use crate::feed::{ArticleExtractor, ContentSource, NewsItem, admit_new};
use crate::llm::NewsAnalyst;
use crate::store::{DailyCache, Ledger, PublishedPost, SeenStore};
use crate::workflow::reconcile::prune_dead_entries;
use crate::workflow::threading::ThreadResolver;
use crate::workflow::workspace::{ItemState, PendingKind, Workspace};

/// The analyst scores a whole sub-batch atomically.
const SCORING_BATCH: usize = 10;

/// Recent published posts fed to generation for tone consistency.
const STYLE_CONTEXT_POSTS: usize = 7;

/// Page size for manual reply selection, most recent first.
const REPLY_PAGE_SIZE: usize = 5;

/// Candidate window offered to the thread resolver.
const REPLY_CANDIDATES: usize = 20;

/// Outcome of one ingestion + scoring cycle.
#[derive(Debug)]
pub struct CheckReport {
    /// Candidates pulled from the feeds.
    pub fetched: usize,
    /// Candidates surviving the seen-filter.
    pub fresh: usize,
    /// Items the analyst scored.
    pub scored: usize,
    /// Items at or above the hype threshold, score descending.
    pub hot: Vec<NewsItem>,
}

/// One page of reply candidates.
#[derive(Debug)]
pub struct ReplyPage {
    pub posts: Vec<PublishedPost>,
    pub page: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

/// Snapshot for the /status command.
#[derive(Debug)]
pub struct StatusReport {
    pub workspace_items: usize,
    pub ledger_posts: usize,
    pub daily_items: usize,
    pub threshold: u8,
}

/// Result of a publish request.
#[derive(Debug)]
pub enum PublishOutcome {
    /// The resolver found a candidate; the operator must choose before the
    /// post is transmitted.
    AwaitingReplyChoice { candidate: PublishedPost },
    /// The post reached the channel and was appended to the ledger.
    Published {
        message_id: i64,
        as_reply: bool,
        /// The resolver failed and policy says the operator should know.
        resolver_warned: bool,
    },
}

pub struct LifecycleController {
    channel: Arc<dyn ChannelApi>,
    analyst: Arc<dyn NewsAnalyst>,
    source: Arc<dyn ContentSource>,
    extractor: Arc<dyn ArticleExtractor>,
    workspace: Arc<Workspace>,
    resolver: ThreadResolver,
    seen: Mutex<SeenStore>,
    ledger: Mutex<Ledger>,
    daily: Mutex<DailyCache>,
    channel_chat: String,
    hype_threshold: AtomicU8,
    resolver_policy: ResolverFailurePolicy,
}

impl LifecycleController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        channel: Arc<dyn ChannelApi>,
        analyst: Arc<dyn NewsAnalyst>,
        source: Arc<dyn ContentSource>,
        extractor: Arc<dyn ArticleExtractor>,
        workspace: Arc<Workspace>,
        seen: SeenStore,
        ledger: Ledger,
        daily: DailyCache,
        channel_chat: String,
        hype_threshold: u8,
        resolver_policy: ResolverFailurePolicy,
    ) -> Self {
        let resolver = ThreadResolver::new(Arc::clone(&analyst));
        Self {
            channel,
            analyst,
            source,
            extractor,
            workspace,
            resolver,
            seen: Mutex::new(seen),
            ledger: Mutex::new(ledger),
            daily: Mutex::new(daily),
            channel_chat,
            hype_threshold: AtomicU8::new(hype_threshold),
            resolver_policy,
        }
    }

    // ── Discovery & scoring ─────────────────────────────────────────

    /// Run one full ingestion cycle: collect, dedup, score in sub-batches,
    /// record the day's aggregate, and stage hot items in the workspace.
    pub async fn check_cycle(&self) -> Result<CheckReport, Error> {
        let candidates = self.source.collect().await;
        let fetched = candidates.len();

        let fresh = {
            let mut seen = self.seen.lock().await;
            admit_new(candidates, &mut seen)?
        };

        if fresh.is_empty() {
            return Ok(CheckReport {
                fetched,
                fresh: 0,
                scored: 0,
                hot: Vec::new(),
            });
        }

        // A failed sub-batch drops its items (their score stays 0) without
        // blocking the rest of the cycle.
        let mut scored = Vec::new();
        for chunk in fresh.chunks(SCORING_BATCH) {
            match self.analyst.score_batch(chunk).await {
                Ok(scores) => {
                    let mut used = HashSet::new();
                    for score in scores {
                        if !used.insert(score.index) {
                            continue;
                        }
                        let Some(source) = chunk.get(score.index) else {
                            continue;
                        };
                        let mut item = source.clone();
                        item.hype_score = score.hype_score;
                        if !score.summary.is_empty() {
                            item.summary = score.summary;
                        }
                        scored.push(item);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, size = chunk.len(), "scoring batch failed, items dropped");
                }
            }
        }

        {
            let mut daily = self.daily.lock().await;
            daily.record(&scored)?;
        }

        let threshold = self.threshold();
        let mut hot: Vec<NewsItem> = scored
            .iter()
            .filter(|item| item.hype_score >= threshold)
            .cloned()
            .collect();
        hot.sort_by(|a, b| b.hype_score.cmp(&a.hype_score));

        for item in &hot {
            self.workspace.insert_item(item.clone()).await;
        }

        tracing::info!(fetched, fresh = fresh.len(), scored = scored.len(), hot = hot.len(), "check cycle complete");
        Ok(CheckReport {
            fetched,
            fresh: fresh.len(),
            scored: scored.len(),
            hot,
        })
    }

    /// Today's items within a score range, staged in the workspace so the
    /// operator can generate from the digest directly.
    pub async fn digest(&self, min: u8, max: u8) -> Result<(Vec<NewsItem>, usize), Error> {
        let (hits, total) = {
            let mut daily = self.daily.lock().await;
            (daily.query_range(min, max), daily.today_count())
        };
        for item in &hits {
            self.workspace.insert_item(item.clone()).await;
        }
        Ok((hits, total))
    }

    // ── Draft generation ────────────────────────────────────────────

    /// Generate (or regenerate) the draft for an item. Overwrites any prior
    /// draft; attached media and reply selection survive regeneration.
    pub async fn generate_draft(&self, uid: &str) -> Result<String, Error> {
        let lock = self.workspace.transition_lock(uid).await;
        let _guard = lock.lock().await;

        let entry = self
            .workspace
            .get(uid)
            .await
            .ok_or(WorkflowError::UnknownItem { uid: uid.into() })?;
        if entry.state == ItemState::Published {
            return Err(WorkflowError::AlreadyPublished { uid: uid.into() }.into());
        }

        let mut article = self.extractor.extract(&entry.item.url).await;
        if article.is_empty() {
            article = format!("{}\n{}", entry.item.title, entry.item.summary);
        }

        let style_context = {
            let ledger = self.ledger.lock().await;
            ledger.recent_texts(STYLE_CONTEXT_POSTS)
        };

        let post = self
            .analyst
            .generate_post(&entry.item.title, &article, &style_context)
            .await?;

        self.workspace
            .modify(uid, |e| {
                e.draft = Some(post.clone());
                e.state = ItemState::Ready;
            })
            .await;

        tracing::info!(uid, chars = post.len(), "draft generated");
        Ok(post)
    }

    // ── Edit & media capture ────────────────────────────────────────

    /// Enter edit mode: the conversation's next free-text message replaces
    /// the draft. Returns the current draft for display.
    pub async fn begin_edit(&self, uid: &str, chat_id: i64) -> Result<String, Error> {
        let lock = self.workspace.transition_lock(uid).await;
        let _guard = lock.lock().await;

        let entry = self
            .workspace
            .get(uid)
            .await
            .ok_or(WorkflowError::UnknownItem { uid: uid.into() })?;
        let draft = entry
            .draft
            .clone()
            .ok_or(WorkflowError::NoDraft { uid: uid.into() })?;
        if entry.state == ItemState::Published {
            return Err(WorkflowError::AlreadyPublished { uid: uid.into() }.into());
        }

        self.workspace
            .modify(uid, |e| e.state = ItemState::Editing)
            .await;
        self.workspace
            .set_pending(chat_id, PendingKind::Edit { uid: uid.into() })
            .await;
        Ok(draft)
    }

    /// Replace the draft with operator-supplied text. Rejected once the item
    /// is published, even if an armed edit outlived the publication.
    pub async fn submit_edit(&self, uid: &str, new_text: String) -> Result<(), Error> {
        let lock = self.workspace.transition_lock(uid).await;
        let _guard = lock.lock().await;

        let entry = self
            .workspace
            .get(uid)
            .await
            .ok_or(WorkflowError::UnknownItem { uid: uid.into() })?;
        if entry.state == ItemState::Published {
            return Err(WorkflowError::AlreadyPublished { uid: uid.into() }.into());
        }

        self.workspace
            .modify(uid, |e| {
                e.draft = Some(new_text);
                e.state = ItemState::Ready;
            })
            .await;
        tracing::info!(uid, "draft replaced by operator");
        Ok(())
    }

    /// Enter media-capture mode: the conversation's next photo attaches to
    /// this item. Returns whether a photo is already attached.
    pub async fn begin_photo(&self, uid: &str, chat_id: i64) -> Result<bool, Error> {
        let lock = self.workspace.transition_lock(uid).await;
        let _guard = lock.lock().await;

        let entry = self
            .workspace
            .get(uid)
            .await
            .ok_or(WorkflowError::UnknownItem { uid: uid.into() })?;
        if entry.draft.is_none() {
            return Err(WorkflowError::NoDraft { uid: uid.into() }.into());
        }
        if entry.state == ItemState::Published {
            return Err(WorkflowError::AlreadyPublished { uid: uid.into() }.into());
        }
        let has_photo = entry.photo_file_id.is_some();

        self.workspace
            .modify(uid, |e| e.state = ItemState::AwaitingMedia)
            .await;
        self.workspace
            .set_pending(chat_id, PendingKind::Photo { uid: uid.into() })
            .await;
        Ok(has_photo)
    }

    /// Attach (or replace) the item's photo. Rejected once the item is
    /// published.
    pub async fn attach_photo(&self, uid: &str, file_id: String) -> Result<(), Error> {
        let lock = self.workspace.transition_lock(uid).await;
        let _guard = lock.lock().await;

        let entry = self
            .workspace
            .get(uid)
            .await
            .ok_or(WorkflowError::UnknownItem { uid: uid.into() })?;
        if entry.state == ItemState::Published {
            return Err(WorkflowError::AlreadyPublished { uid: uid.into() }.into());
        }

        self.workspace
            .modify(uid, |e| {
                e.photo_file_id = Some(file_id);
                e.state = ItemState::Ready;
            })
            .await;
        Ok(())
    }

    /// Consume the conversation's pending capture, if any.
    pub async fn take_pending(&self, chat_id: i64) -> Option<PendingKind> {
        self.workspace.take_pending(chat_id).await
    }

    /// Converge an interrupted edit/media capture back to a publishable
    /// state without mutation.
    pub async fn cancel_input(&self, kind: &PendingKind) {
        self.workspace
            .modify(kind.uid(), |e| {
                if matches!(e.state, ItemState::Editing | ItemState::AwaitingMedia) {
                    e.state = if e.draft.is_some() {
                        ItemState::Ready
                    } else {
                        ItemState::Scored
                    };
                }
            })
            .await;
    }

    // ── Reply selection ─────────────────────────────────────────────

    /// One page of reply candidates, most recent first. Opening the list
    /// (page 0) first reconciles the ledger so a deleted channel message is
    /// never offered as a target.
    pub async fn reply_page(
        &self,
        uid: &str,
        page: usize,
        probe_chat: &str,
    ) -> Result<ReplyPage, Error> {
        let entry = self
            .workspace
            .get(uid)
            .await
            .ok_or(WorkflowError::UnknownItem { uid: uid.into() })?;
        if entry.draft.is_none() {
            return Err(WorkflowError::NoDraft { uid: uid.into() }.into());
        }
        self.workspace
            .modify(uid, |e| e.state = ItemState::SelectingReply)
            .await;

        let mut ledger = self.ledger.lock().await;
        if page == 0 {
            prune_dead_entries(
                self.channel.as_ref(),
                &mut ledger,
                &self.channel_chat,
                probe_chat,
            )
            .await?;
        }

        let total = ledger.len();
        let start = page * REPLY_PAGE_SIZE;
        let posts: Vec<PublishedPost> = ledger
            .posts()
            .iter()
            .rev()
            .skip(start)
            .take(REPLY_PAGE_SIZE)
            .cloned()
            .collect();

        Ok(ReplyPage {
            posts,
            page,
            has_prev: page > 0,
            has_next: start + REPLY_PAGE_SIZE < total,
        })
    }

    // ── Publish protocol ────────────────────────────────────────────

    /// Publish an item. With no explicit reply target the ledger is first
    /// reconciled against the channel, then the thread resolver is asked;
    /// a candidate match is returned for the operator to decide on rather
    /// than auto-published.
    pub async fn publish(&self, uid: &str, probe_chat: &str) -> Result<PublishOutcome, Error> {
        let lock = self.workspace.transition_lock(uid).await;
        let _guard = lock.lock().await;

        let entry = self
            .workspace
            .get(uid)
            .await
            .ok_or(WorkflowError::UnknownItem { uid: uid.into() })?;
        if entry.state == ItemState::Published {
            return Err(WorkflowError::AlreadyPublished { uid: uid.into() }.into());
        }
        let draft = entry
            .draft
            .clone()
            .ok_or(WorkflowError::NoDraft { uid: uid.into() })?;

        if let Some(target) = entry.reply_target {
            return self.transmit(uid, Some(target), false).await;
        }

        // Stale ledger entries must not reach the resolver or the operator.
        let candidates: Vec<PublishedPost> = {
            let mut ledger = self.ledger.lock().await;
            prune_dead_entries(
                self.channel.as_ref(),
                &mut ledger,
                &self.channel_chat,
                probe_chat,
            )
            .await?;
            ledger.recent(REPLY_CANDIDATES).to_vec()
        };

        match self
            .resolver
            .resolve(&entry.item.title, &draft, &candidates)
            .await
        {
            Ok(Some(target_uid)) => {
                match candidates.iter().find(|p| p.uid == target_uid).cloned() {
                    Some(candidate) => {
                        self.workspace
                            .modify(uid, |e| {
                                e.proposed_reply = Some(candidate.channel_message_id);
                                e.state = ItemState::SelectingReply;
                            })
                            .await;
                        Ok(PublishOutcome::AwaitingReplyChoice { candidate })
                    }
                    None => self.transmit(uid, None, false).await,
                }
            }
            Ok(None) => self.transmit(uid, None, false).await,
            Err(e) => {
                tracing::warn!(error = %e, "thread resolver failed, publishing without reply");
                let warned = self.resolver_policy == ResolverFailurePolicy::Warn;
                self.transmit(uid, None, warned).await
            }
        }
    }

    /// Publish as a reply to the resolver's proposed candidate. If the
    /// proposal is gone (eviction, regeneration), the press is rejected
    /// rather than silently publishing standalone.
    pub async fn confirm_proposed_reply(&self, uid: &str) -> Result<PublishOutcome, Error> {
        let lock = self.workspace.transition_lock(uid).await;
        let _guard = lock.lock().await;

        let entry = self
            .workspace
            .get(uid)
            .await
            .ok_or(WorkflowError::UnknownItem { uid: uid.into() })?;
        let target = entry
            .proposed_reply
            .ok_or(WorkflowError::NoProposedReply { uid: uid.into() })?;
        self.transmit(uid, Some(target), false).await
    }

    /// Publish without any reply link, skipping resolution.
    pub async fn publish_without_reply(&self, uid: &str) -> Result<PublishOutcome, Error> {
        let lock = self.workspace.transition_lock(uid).await;
        let _guard = lock.lock().await;
        self.transmit(uid, None, false).await
    }

    /// Set an explicit reply target from the paged list and publish.
    pub async fn select_reply(&self, uid: &str, target_uid: &str) -> Result<PublishOutcome, Error> {
        let lock = self.workspace.transition_lock(uid).await;
        let _guard = lock.lock().await;

        let target = {
            let ledger = self.ledger.lock().await;
            ledger
                .find_by_uid(target_uid)
                .map(|p| p.channel_message_id)
        }
        .ok_or(WorkflowError::UnknownPost {
            uid: target_uid.into(),
        })?;

        self.workspace
            .modify(uid, |e| e.reply_target = Some(target))
            .await;
        self.transmit(uid, Some(target), false).await
    }

    /// Transmit the post and append it to the ledger. Caller holds the
    /// item's transition lock.
    async fn transmit(
        &self,
        uid: &str,
        reply_to: Option<i64>,
        resolver_warned: bool,
    ) -> Result<PublishOutcome, Error> {
        let entry = self
            .workspace
            .get(uid)
            .await
            .ok_or(WorkflowError::UnknownItem { uid: uid.into() })?;
        if entry.state == ItemState::Published {
            return Err(WorkflowError::AlreadyPublished { uid: uid.into() }.into());
        }
        let draft = entry
            .draft
            .clone()
            .ok_or(WorkflowError::NoDraft { uid: uid.into() })?;

        let opts = SendOptions {
            reply_to,
            keyboard: None,
            disable_preview: false,
        };

        let message_id = match &entry.photo_file_id {
            Some(file_id) => {
                self.channel
                    .send_photo(&self.channel_chat, file_id, &truncate_caption(&draft), opts)
                    .await?
            }
            None => {
                self.channel
                    .send_message(&self.channel_chat, &draft, opts)
                    .await?
            }
        };

        {
            let mut ledger = self.ledger.lock().await;
            ledger.append(PublishedPost {
                uid: uid.to_string(),
                title: entry.item.title.clone(),
                text: draft,
                channel_message_id: message_id,
                timestamp: Utc::now(),
            })?;
        }

        // Reply target is consumed exactly once; any armed edit/photo
        // capture aimed at the item dies with the publication.
        self.workspace
            .modify(uid, |e| {
                e.state = ItemState::Published;
                e.reply_target = None;
                e.proposed_reply = None;
            })
            .await;
        self.workspace.clear_pending_for(uid).await;

        tracing::info!(uid, message_id, as_reply = reply_to.is_some(), "post published");
        Ok(PublishOutcome::Published {
            message_id,
            as_reply: reply_to.is_some(),
            resolver_warned,
        })
    }

    // ── Odds and ends ───────────────────────────────────────────────

    pub fn threshold(&self) -> u8 {
        self.hype_threshold.load(Ordering::Relaxed)
    }

    pub fn set_threshold(&self, threshold: u8) {
        self.hype_threshold.store(threshold, Ordering::Relaxed);
    }

    pub async fn status(&self) -> StatusReport {
        StatusReport {
            workspace_items: self.workspace.len().await,
            ledger_posts: self.ledger.lock().await.len(),
            daily_items: self.daily.lock().await.today_count(),
            threshold: self.threshold(),
        }
    }

    /// Drop stale workspace entries and expired pending captures.
    pub async fn evict_stale(&self) -> (usize, usize) {
        self.workspace.evict_stale().await
    }

    /// Read-only peek at an item's working state.
    pub async fn entry(&self, uid: &str) -> Option<crate::workflow::workspace::DraftEntry> {
        self.workspace.get(uid).await
    }
}
