//! End-to-end lifecycle tests with every external collaborator stubbed:
//! feed ingestion through scoring, drafting, reply resolution, publication,
//! and ledger reconciliation, against tempdir-backed stores.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;
use tokio::sync::Mutex;

use newsdesk::channel::{BotCommand, ChannelApi, SendOptions, Update};
use newsdesk::config::ResolverFailurePolicy;
use newsdesk::error::{ChannelError, LlmError};
use newsdesk::feed::{ArticleExtractor, ContentSource, NewsItem};
use newsdesk::llm::{BatchScore, NewsAnalyst};
use newsdesk::store::{DailyCache, Ledger, PublishedPost, SeenStore};
use newsdesk::workflow::{ItemState, LifecycleController, PublishOutcome, Workspace};

const CHANNEL: &str = "@channel";
const PROBE: &str = "42";

#[derive(Debug)]
struct SentMessage {
    chat: String,
    text: String,
    reply_to: Option<i64>,
    photo: Option<String>,
}

/// Channel fake: records sends, hands out increasing message ids, and fails
/// copy probes for a configured set of "deleted" messages.
struct MockChannel {
    next_id: AtomicI64,
    dead: HashSet<i64>,
    sends: Mutex<Vec<SentMessage>>,
}

impl MockChannel {
    fn new() -> Self {
        Self::with_dead(HashSet::new())
    }

    fn with_dead(dead: HashSet<i64>) -> Self {
        Self {
            next_id: AtomicI64::new(1000),
            dead,
            sends: Mutex::new(Vec::new()),
        }
    }

    async fn sent(&self) -> Vec<SentMessage> {
        std::mem::take(&mut *self.sends.lock().await)
    }
}

#[async_trait]
impl ChannelApi for MockChannel {
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        opts: SendOptions,
    ) -> Result<i64, ChannelError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sends.lock().await.push(SentMessage {
            chat: chat_id.to_string(),
            text: text.to_string(),
            reply_to: opts.reply_to,
            photo: None,
        });
        Ok(id)
    }

    async fn send_photo(
        &self,
        chat_id: &str,
        file_id: &str,
        caption: &str,
        opts: SendOptions,
    ) -> Result<i64, ChannelError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sends.lock().await.push(SentMessage {
            chat: chat_id.to_string(),
            text: caption.to_string(),
            reply_to: opts.reply_to,
            photo: Some(file_id.to_string()),
        });
        Ok(id)
    }

    async fn edit_message_text(
        &self,
        _chat_id: &str,
        _message_id: i64,
        _text: &str,
    ) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn copy_message(
        &self,
        _to_chat: &str,
        _from_chat: &str,
        message_id: i64,
    ) -> Result<i64, ChannelError> {
        if self.dead.contains(&message_id) {
            return Err(ChannelError::Api {
                method: "copyMessage".to_string(),
                description: "message to copy not found".to_string(),
            });
        }
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn delete_message(&self, _chat_id: &str, _message_id: i64) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn answer_callback(&self, _callback_id: &str) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn set_my_commands(&self, _commands: &[BotCommand]) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn get_updates(
        &self,
        _offset: i64,
        _timeout_secs: u64,
    ) -> Result<Vec<Update>, ChannelError> {
        Ok(Vec::new())
    }
}

struct StubSource {
    items: Vec<NewsItem>,
}

#[async_trait]
impl ContentSource for StubSource {
    async fn collect(&self) -> Vec<NewsItem> {
        self.items.clone()
    }
}

struct StubExtractor;

#[async_trait]
impl ArticleExtractor for StubExtractor {
    async fn extract(&self, _url: &str) -> String {
        "full article body".to_string()
    }
}

/// Analyst stub with scripted scores and thread matches.
struct ScriptedAnalyst {
    scores: Vec<(u8, &'static str)>,
    related: Result<Option<usize>, ()>,
}

impl ScriptedAnalyst {
    fn scoring(scores: Vec<(u8, &'static str)>) -> Self {
        Self {
            scores,
            related: Ok(None),
        }
    }

    fn matching(related: Result<Option<usize>, ()>) -> Self {
        Self {
            scores: Vec::new(),
            related,
        }
    }
}

#[async_trait]
impl NewsAnalyst for ScriptedAnalyst {
    async fn score_batch(&self, items: &[NewsItem]) -> Result<Vec<BatchScore>, LlmError> {
        Ok(items
            .iter()
            .enumerate()
            .map(|(index, _)| {
                let (hype_score, summary) = self.scores.get(index).copied().unwrap_or((1, ""));
                BatchScore {
                    index,
                    hype_score,
                    summary: summary.to_string(),
                }
            })
            .collect())
    }

    async fn generate_post(
        &self,
        title: &str,
        _article: &str,
        _style_context: &[String],
    ) -> Result<String, LlmError> {
        Ok(format!("<b>{title}</b>\n\ndraft body"))
    }

    async fn find_related(
        &self,
        _title: &str,
        _draft_text: &str,
        _candidate_titles: &[String],
    ) -> Result<Option<usize>, LlmError> {
        self.related.clone().map_err(|_| LlmError::RequestFailed {
            reason: "scripted outage".to_string(),
        })
    }
}

struct Harness {
    controller: LifecycleController,
    channel: Arc<MockChannel>,
    _dir: TempDir,
}

fn harness(channel: MockChannel, analyst: ScriptedAnalyst, items: Vec<NewsItem>) -> Harness {
    harness_with_ledger(channel, analyst, items, Vec::new())
}

fn harness_with_ledger(
    channel: MockChannel,
    analyst: ScriptedAnalyst,
    items: Vec<NewsItem>,
    posts: Vec<PublishedPost>,
) -> Harness {
    let dir = TempDir::new().unwrap();
    let mut ledger = Ledger::load(dir.path().join("published_posts.json"));
    for post in posts {
        ledger.append(post).unwrap();
    }

    let channel = Arc::new(channel);
    let controller = LifecycleController::new(
        channel.clone(),
        Arc::new(analyst),
        Arc::new(StubSource { items }),
        Arc::new(StubExtractor),
        Arc::new(Workspace::new()),
        SeenStore::load(dir.path().join("seen.json")),
        ledger,
        DailyCache::load(dir.path().join("daily_cache.json")),
        CHANNEL.to_string(),
        7,
        ResolverFailurePolicy::Warn,
    );
    Harness {
        controller,
        channel,
        _dir: dir,
    }
}

fn item(title: &str, url: &str) -> NewsItem {
    NewsItem::new(title, url, "Stub Feed")
}

fn ledger_post(uid: &str, title: &str, message_id: i64) -> PublishedPost {
    PublishedPost {
        uid: uid.to_string(),
        title: title.to_string(),
        text: format!("{title} text"),
        channel_message_id: message_id,
        timestamp: Utc::now(),
    }
}

// ── Discovery & scoring ─────────────────────────────────────────────

#[tokio::test]
async fn check_cycle_scores_filters_and_stages_hot_items() {
    let h = harness(
        MockChannel::new(),
        ScriptedAnalyst::scoring(vec![(8, "big news"), (3, "minor news")]),
        vec![item("Big", "https://e.com/big"), item("Minor", "https://e.com/minor")],
    );

    let report = h.controller.check_cycle().await.unwrap();
    assert_eq!((report.fetched, report.fresh, report.scored), (2, 2, 2));
    assert_eq!(report.hot.len(), 1);
    assert_eq!(report.hot[0].title, "Big");
    assert_eq!(report.hot[0].hype_score, 8);
    assert_eq!(report.hot[0].summary, "big news");

    // Hot item is staged for the operator.
    let entry = h.controller.entry(&report.hot[0].fingerprint).await.unwrap();
    assert_eq!(entry.state, ItemState::Scored);
}

#[tokio::test]
async fn second_cycle_sees_nothing_fresh() {
    let h = harness(
        MockChannel::new(),
        ScriptedAnalyst::scoring(vec![(8, "s")]),
        vec![item("A", "https://e.com/a")],
    );

    h.controller.check_cycle().await.unwrap();
    let report = h.controller.check_cycle().await.unwrap();
    assert_eq!((report.fetched, report.fresh, report.hot.len()), (1, 0, 0));
}

#[tokio::test]
async fn digest_returns_only_items_in_range() {
    let h = harness(
        MockChannel::new(),
        ScriptedAnalyst::scoring(vec![(8, "hot"), (5, "mid")]),
        vec![item("Hot", "https://e.com/hot"), item("Mid", "https://e.com/mid")],
    );
    h.controller.check_cycle().await.unwrap();

    let (hits, total) = h.controller.digest(1, 6).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "Mid");

    // Digest hits become workable items too.
    assert!(h.controller.entry(&hits[0].fingerprint).await.is_some());
}

// ── Draft → publish ─────────────────────────────────────────────────

#[tokio::test]
async fn full_lifecycle_publishes_standalone_when_nothing_related() {
    let h = harness(
        MockChannel::new(),
        ScriptedAnalyst::scoring(vec![(9, "s")]),
        vec![item("Breaking", "https://e.com/breaking")],
    );

    let report = h.controller.check_cycle().await.unwrap();
    let uid = report.hot[0].fingerprint.clone();

    let draft = h.controller.generate_draft(&uid).await.unwrap();
    assert!(draft.contains("Breaking"));
    assert_eq!(h.controller.entry(&uid).await.unwrap().state, ItemState::Ready);

    let outcome = h.controller.publish(&uid, PROBE).await.unwrap();
    let PublishOutcome::Published {
        as_reply,
        resolver_warned,
        ..
    } = outcome
    else {
        panic!("expected a direct publication");
    };
    assert!(!as_reply);
    assert!(!resolver_warned);

    let sends = h.channel.sent().await;
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].chat, CHANNEL);
    assert_eq!(sends[0].reply_to, None);

    let status = h.controller.status().await;
    assert_eq!(status.ledger_posts, 1);
    assert_eq!(h.controller.entry(&uid).await.unwrap().state, ItemState::Published);
}

#[tokio::test]
async fn publishing_twice_is_rejected() {
    let h = harness(
        MockChannel::new(),
        ScriptedAnalyst::scoring(vec![(9, "s")]),
        vec![item("Once", "https://e.com/once")],
    );
    let uid = h.controller.check_cycle().await.unwrap().hot[0].fingerprint.clone();
    h.controller.generate_draft(&uid).await.unwrap();
    h.controller.publish(&uid, PROBE).await.unwrap();

    assert!(h.controller.publish(&uid, PROBE).await.is_err());
    assert_eq!(h.controller.status().await.ledger_posts, 1);
}

#[tokio::test]
async fn publish_without_draft_is_rejected() {
    let h = harness(
        MockChannel::new(),
        ScriptedAnalyst::scoring(vec![(9, "s")]),
        vec![item("NoDraft", "https://e.com/nodraft")],
    );
    let uid = h.controller.check_cycle().await.unwrap().hot[0].fingerprint.clone();
    assert!(h.controller.publish(&uid, PROBE).await.is_err());
}

#[tokio::test]
async fn edited_draft_is_what_gets_published() {
    let h = harness(
        MockChannel::new(),
        ScriptedAnalyst::scoring(vec![(9, "s")]),
        vec![item("Edit me", "https://e.com/edit")],
    );
    let uid = h.controller.check_cycle().await.unwrap().hot[0].fingerprint.clone();
    h.controller.generate_draft(&uid).await.unwrap();

    let shown = h.controller.begin_edit(&uid, 42).await.unwrap();
    assert!(shown.contains("Edit me"));
    h.controller
        .submit_edit(&uid, "rewritten by hand".to_string())
        .await
        .unwrap();

    h.controller.publish(&uid, PROBE).await.unwrap();
    let sends = h.channel.sent().await;
    assert_eq!(sends[0].text, "rewritten by hand");
}

#[tokio::test]
async fn attached_photo_turns_publish_into_captioned_photo() {
    let h = harness(
        MockChannel::new(),
        ScriptedAnalyst::scoring(vec![(9, "s")]),
        vec![item("Pic", "https://e.com/pic")],
    );
    let uid = h.controller.check_cycle().await.unwrap().hot[0].fingerprint.clone();
    h.controller.generate_draft(&uid).await.unwrap();

    let had_photo = h.controller.begin_photo(&uid, 42).await.unwrap();
    assert!(!had_photo);
    h.controller
        .attach_photo(&uid, "file123".to_string())
        .await
        .unwrap();

    h.controller.publish(&uid, PROBE).await.unwrap();
    let sends = h.channel.sent().await;
    assert_eq!(sends[0].photo.as_deref(), Some("file123"));
}

// ── Thread resolution ───────────────────────────────────────────────

#[tokio::test]
async fn resolver_match_pauses_for_operator_confirmation() {
    let mut analyst = ScriptedAnalyst::matching(Ok(Some(0)));
    analyst.scores = vec![(9, "s")];
    let h = harness_with_ledger(
        MockChannel::new(),
        analyst,
        vec![item("Follow-up", "https://e.com/follow")],
        vec![ledger_post("prior1", "Original story", 500)],
    );
    let uid = h.controller.check_cycle().await.unwrap().hot[0].fingerprint.clone();
    h.controller.generate_draft(&uid).await.unwrap();

    let outcome = h.controller.publish(&uid, PROBE).await.unwrap();
    let PublishOutcome::AwaitingReplyChoice { candidate } = outcome else {
        panic!("expected the resolver proposal to pause publication");
    };
    assert_eq!(candidate.uid, "prior1");

    // Nothing reached the channel yet.
    assert_eq!(h.controller.status().await.ledger_posts, 1);
    assert_eq!(
        h.controller.entry(&uid).await.unwrap().state,
        ItemState::SelectingReply
    );

    // Confirming publishes as a reply to the proposed message.
    let outcome = h.controller.confirm_proposed_reply(&uid).await.unwrap();
    let PublishOutcome::Published { as_reply, .. } = outcome else {
        panic!("expected publication after confirmation");
    };
    assert!(as_reply);

    let sends = h.channel.sent().await;
    let published = sends.iter().find(|s| s.chat == CHANNEL).unwrap();
    assert_eq!(published.reply_to, Some(500));
}

#[tokio::test]
async fn resolver_failure_publishes_standalone_with_warning() {
    let mut analyst = ScriptedAnalyst::matching(Err(()));
    analyst.scores = vec![(9, "s")];
    let h = harness_with_ledger(
        MockChannel::new(),
        analyst,
        vec![item("Solo", "https://e.com/solo")],
        vec![ledger_post("prior1", "Original story", 500)],
    );
    let uid = h.controller.check_cycle().await.unwrap().hot[0].fingerprint.clone();
    h.controller.generate_draft(&uid).await.unwrap();

    let outcome = h.controller.publish(&uid, PROBE).await.unwrap();
    let PublishOutcome::Published {
        as_reply,
        resolver_warned,
        ..
    } = outcome
    else {
        panic!("resolver failure must not block publication");
    };
    assert!(!as_reply);
    assert!(resolver_warned);
    assert_eq!(h.controller.status().await.ledger_posts, 2);
}

#[tokio::test]
async fn explicit_reply_selection_overrides_resolution() {
    let mut analyst = ScriptedAnalyst::matching(Ok(Some(0)));
    analyst.scores = vec![(9, "s")];
    let h = harness_with_ledger(
        MockChannel::new(),
        analyst,
        vec![item("Picked", "https://e.com/picked")],
        vec![
            ledger_post("prior1", "First", 500),
            ledger_post("prior2", "Second", 501),
        ],
    );
    let uid = h.controller.check_cycle().await.unwrap().hot[0].fingerprint.clone();
    h.controller.generate_draft(&uid).await.unwrap();

    let page = h.controller.reply_page(&uid, 0, PROBE).await.unwrap();
    assert_eq!(page.posts.len(), 2);
    // Most recent first.
    assert_eq!(page.posts[0].uid, "prior2");

    let outcome = h.controller.select_reply(&uid, "prior2").await.unwrap();
    let PublishOutcome::Published { as_reply, .. } = outcome else {
        panic!("expected publication");
    };
    assert!(as_reply);

    let sends = h.channel.sent().await;
    assert_eq!(sends[0].reply_to, Some(501));
}

#[tokio::test]
async fn ingest_score_draft_publish_digest_round_trip() {
    let h = harness(
        MockChannel::new(),
        ScriptedAnalyst::scoring(vec![(8, "the big one"), (3, "the small one")]),
        vec![item("A", "https://e.com/A"), item("B", "https://e.com/B")],
    );

    // Both fresh, only A crosses the threshold of 7.
    let report = h.controller.check_cycle().await.unwrap();
    assert_eq!(report.fresh, 2);
    assert_eq!(report.hot.len(), 1);
    let uid_a = report.hot[0].fingerprint.clone();

    h.controller.generate_draft(&uid_a).await.unwrap();
    let outcome = h.controller.publish(&uid_a, PROBE).await.unwrap();
    let PublishOutcome::Published { message_id, .. } = outcome else {
        panic!("no candidates, so publication must be direct");
    };
    assert!(message_id >= 1000);
    assert_eq!(h.controller.status().await.ledger_posts, 1);

    // The digest window below the threshold holds exactly B.
    let (hits, _) = h.controller.digest(1, 6).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "B");
    assert_eq!(hits[0].hype_score, 3);
}

// ── Reconciliation ──────────────────────────────────────────────────

#[tokio::test]
async fn publish_prunes_dead_ledger_entries_before_resolution() {
    let mut analyst = ScriptedAnalyst::matching(Ok(None));
    analyst.scores = vec![(9, "s")];
    // Message 501 was deleted from the channel out-of-band.
    let h = harness_with_ledger(
        MockChannel::with_dead(HashSet::from([501])),
        analyst,
        vec![item("Fresh", "https://e.com/fresh")],
        vec![
            ledger_post("prior1", "Alive", 500),
            ledger_post("prior2", "Deleted", 501),
            ledger_post("prior3", "Alive too", 502),
        ],
    );
    let uid = h.controller.check_cycle().await.unwrap().hot[0].fingerprint.clone();
    h.controller.generate_draft(&uid).await.unwrap();

    h.controller.publish(&uid, PROBE).await.unwrap();

    // 3 prior - 1 dead + 1 just published.
    assert_eq!(h.controller.status().await.ledger_posts, 3);
    let page = h.controller.reply_page(&uid, 0, PROBE).await.unwrap();
    assert!(page.posts.iter().all(|p| p.uid != "prior2"));
}

#[tokio::test]
async fn opening_the_manual_reply_list_prunes_dead_entries() {
    let mut analyst = ScriptedAnalyst::matching(Ok(None));
    analyst.scores = vec![(9, "s")];
    let h = harness_with_ledger(
        MockChannel::with_dead(HashSet::from([501])),
        analyst,
        vec![item("Fresh", "https://e.com/fresh")],
        vec![
            ledger_post("prior1", "Alive", 500),
            ledger_post("prior2", "Deleted", 501),
        ],
    );
    let uid = h.controller.check_cycle().await.unwrap().hot[0].fingerprint.clone();
    h.controller.generate_draft(&uid).await.unwrap();

    // No publish has run yet; the list itself must not offer the dead post.
    let page = h.controller.reply_page(&uid, 0, PROBE).await.unwrap();
    assert_eq!(page.posts.len(), 1);
    assert_eq!(page.posts[0].uid, "prior1");
    assert_eq!(h.controller.status().await.ledger_posts, 1);
}

// ── Terminal-state protection ───────────────────────────────────────

#[tokio::test]
async fn stale_pending_edit_cannot_reopen_a_published_item() {
    let h = harness(
        MockChannel::new(),
        ScriptedAnalyst::scoring(vec![(9, "s")]),
        vec![item("Done", "https://e.com/done")],
    );
    let uid = h.controller.check_cycle().await.unwrap().hot[0].fingerprint.clone();
    h.controller.generate_draft(&uid).await.unwrap();

    // Arm an edit, then publish from a button press before any text arrives.
    h.controller.begin_edit(&uid, 42).await.unwrap();
    h.controller.publish(&uid, PROBE).await.unwrap();

    // Publication disarmed the capture, and late text cannot revive the item.
    assert!(h.controller.take_pending(42).await.is_none());
    assert!(h.controller.submit_edit(&uid, "stray text".to_string()).await.is_err());
    assert!(h.controller.attach_photo(&uid, "late.jpg".to_string()).await.is_err());
    assert!(h.controller.publish(&uid, PROBE).await.is_err());

    assert_eq!(h.controller.status().await.ledger_posts, 1);
    assert_eq!(h.controller.entry(&uid).await.unwrap().state, ItemState::Published);
}

#[tokio::test]
async fn reply_confirmation_without_a_proposal_is_rejected() {
    let h = harness(
        MockChannel::new(),
        ScriptedAnalyst::scoring(vec![(9, "s")]),
        vec![item("Orphan", "https://e.com/orphan")],
    );
    let uid = h.controller.check_cycle().await.unwrap().hot[0].fingerprint.clone();
    h.controller.generate_draft(&uid).await.unwrap();

    // The confirm button with no stored proposal must not publish standalone.
    assert!(h.controller.confirm_proposed_reply(&uid).await.is_err());
    assert_eq!(h.controller.status().await.ledger_posts, 0);
    assert!(h.channel.sent().await.is_empty());
}
