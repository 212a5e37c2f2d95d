//! Long-poll dispatcher — routes operator commands, button presses, and
//! pending edit/photo input to the lifecycle controller, and runs the
//! scheduled check cycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::bot::{format, keyboards};
use crate::channel::{BotCommand, ChannelApi, IncomingMessage, SendOptions, Update};
use crate::workflow::{LifecycleController, PendingKind, PublishOutcome};

/// Long-poll timeout for getUpdates.
const POLL_TIMEOUT_SECS: u64 = 50;

/// Back-off after a failed poll.
const POLL_RETRY: Duration = Duration::from_secs(5);

/// Grace period before the first scheduled check.
const FIRST_CHECK_DELAY: Duration = Duration::from_secs(30);

/// Courtesy pause between consecutive alert sends.
pub(super) const ALERT_PAUSE: Duration = Duration::from_millis(500);

pub struct Dispatcher {
    pub(super) channel: Arc<dyn ChannelApi>,
    pub(super) controller: Arc<LifecycleController>,
    check_interval: Duration,
    /// Operator chat, bound by the first /start. Alerts and scheduled
    /// reports go here; everything else is ignored.
    owner_chat: RwLock<Option<i64>>,
}

impl Dispatcher {
    pub fn new(
        channel: Arc<dyn ChannelApi>,
        controller: Arc<LifecycleController>,
        check_interval: Duration,
    ) -> Self {
        Self {
            channel,
            controller,
            check_interval,
            owner_chat: RwLock::new(None),
        }
    }

    fn menu() -> Vec<BotCommand> {
        vec![
            BotCommand::new("start", "Bind this chat and show help"),
            BotCommand::new("check", "Run a feed check now"),
            BotCommand::new("digest", "Today's mid-tier items, e.g. /digest 3 7"),
            BotCommand::new("status", "Workspace and ledger counters"),
            BotCommand::new("sethype", "Set alert threshold, e.g. /sethype 7"),
            BotCommand::new("cancel", "Cancel a pending edit or photo"),
        ]
    }

    /// Run forever: scheduled checks in a background task, updates in the
    /// foreground long-poll loop.
    pub async fn run(self: Arc<Self>) {
        if let Err(e) = self.channel.set_my_commands(&Self::menu()).await {
            tracing::warn!(error = %e, "failed to publish command menu");
        }

        let scheduler = Arc::clone(&self);
        tokio::spawn(async move { scheduler.scheduled_checks().await });

        let mut offset = 0i64;
        loop {
            match self.channel.get_updates(offset, POLL_TIMEOUT_SECS).await {
                Ok(updates) => {
                    for update in updates {
                        offset = update.update_id + 1;
                        self.handle_update(update).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "update poll failed");
                    tokio::time::sleep(POLL_RETRY).await;
                }
            }
        }
    }

    async fn scheduled_checks(&self) {
        tokio::time::sleep(FIRST_CHECK_DELAY).await;
        let mut ticker = tokio::time::interval(self.check_interval);
        loop {
            ticker.tick().await;
            self.controller.evict_stale().await;

            let Some(owner) = *self.owner_chat.read().await else {
                tracing::debug!("scheduled check skipped, no operator chat bound");
                continue;
            };
            match self.controller.check_cycle().await {
                Ok(report) => self.deliver_alerts(owner, &report.hot).await,
                Err(e) => tracing::error!(error = %e, "scheduled check failed"),
            }
        }
    }

    async fn deliver_alerts(&self, chat: i64, hot: &[crate::feed::NewsItem]) {
        for (i, item) in hot.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(ALERT_PAUSE).await;
            }
            let text = format::format_alert(item);
            let opts = SendOptions::with_keyboard(keyboards::alert(&item.fingerprint));
            if let Err(e) = self.channel.send_message(&chat.to_string(), &text, opts).await {
                tracing::warn!(error = %e, uid = %item.fingerprint, "alert delivery failed");
            }
        }
    }

    async fn handle_update(&self, update: Update) {
        if let Some(message) = update.message {
            self.handle_message(message).await;
        } else if let Some(callback) = update.callback_query {
            if let Err(e) = self.channel.answer_callback(&callback.id).await {
                tracing::debug!(error = %e, "callback ack failed");
            }
            let Some(chat) = callback.message.as_ref().map(|m| m.chat.id) else {
                return;
            };
            if !self.is_owner(chat).await {
                return;
            }
            let Some(data) = callback.data else { return };
            if let Err(e) = self.handle_callback(chat, &data).await {
                self.report_error(chat, &e).await;
            }
        }
    }

    async fn handle_message(&self, message: IncomingMessage) {
        let chat = message.chat.id;
        let text = message.text.clone().unwrap_or_default();

        if text.starts_with("/start") {
            self.bind_owner(chat).await;
            return;
        }
        if !self.is_owner(chat).await {
            tracing::debug!(chat, "message from unbound chat ignored");
            return;
        }

        // Any command interrupts a pending capture.
        if text.starts_with('/') {
            if let Some(kind) = self.controller.take_pending(chat).await {
                self.controller.cancel_input(&kind).await;
                self.notify(chat, "↩️ Pending input cancelled.").await;
            }
            if let Err(e) = self.handle_command(chat, &text).await {
                self.report_error(chat, &e).await;
            }
            return;
        }

        match self.controller.take_pending(chat).await {
            Some(PendingKind::Edit { uid }) => {
                if text.trim().is_empty() {
                    self.controller
                        .cancel_input(&PendingKind::Edit { uid })
                        .await;
                    self.notify(chat, "✏️ Expected replacement text; edit cancelled.")
                        .await;
                    return;
                }
                match self.controller.submit_edit(&uid, text).await {
                    Ok(()) => self.show_draft(chat, &uid).await,
                    Err(e) => self.report_error(chat, &e).await,
                }
            }
            Some(PendingKind::Photo { uid }) => match message.largest_photo() {
                Some(file_id) => {
                    match self.controller.attach_photo(&uid, file_id.to_string()).await {
                        Ok(()) => self.show_draft(chat, &uid).await,
                        Err(e) => self.report_error(chat, &e).await,
                    }
                }
                None => {
                    self.controller
                        .cancel_input(&PendingKind::Photo { uid })
                        .await;
                    self.notify(chat, "🖼 Expected a photo; attach cancelled.").await;
                }
            },
            None => {
                tracing::debug!(chat, "free text with no pending capture ignored");
            }
        }
    }

    async fn bind_owner(&self, chat: i64) {
        {
            let mut owner = self.owner_chat.write().await;
            if owner.is_none() {
                *owner = Some(chat);
                tracing::info!(chat, "operator chat bound");
            } else if *owner != Some(chat) {
                tracing::warn!(chat, "second chat tried /start, ignored");
                return;
            }
        }
        self.notify(
            chat,
            "👋 Newsdesk is running.\n\
             /check — run a feed check now\n\
             /digest [min max] — today's mid-tier items\n\
             /status — counters\n\
             /sethype N — alert threshold\n\
             /cancel — drop a pending edit or photo",
        )
        .await;
    }

    async fn is_owner(&self, chat: i64) -> bool {
        *self.owner_chat.read().await == Some(chat)
    }

    pub(crate) async fn notify(&self, chat: i64, text: &str) {
        if let Err(e) = self
            .channel
            .send_message(&chat.to_string(), text, SendOptions::default())
            .await
        {
            tracing::warn!(error = %e, chat, "notification failed");
        }
    }

    pub(crate) async fn report_error(&self, chat: i64, err: &crate::error::Error) {
        tracing::error!(error = %err, "operation failed");
        let text = format!("⚠️ {}", format::truncate_error(err));
        self.notify(chat, &text).await;
    }

    /// Preview the current draft with its action keyboard.
    pub(crate) async fn show_draft(&self, chat: i64, uid: &str) {
        let Some(entry) = self.controller.entry(uid).await else {
            self.notify(chat, "⚠️ That item is no longer tracked.").await;
            return;
        };
        let Some(draft) = entry.draft else {
            self.notify(chat, "⚠️ No draft yet, generate one first.").await;
            return;
        };
        let opts = SendOptions::with_keyboard(keyboards::draft(uid, entry.photo_file_id.is_some()));
        if let Err(e) = self.channel.send_message(&chat.to_string(), &draft, opts).await {
            tracing::warn!(error = %e, "draft preview failed");
        }
    }

    /// Translate a publish outcome into operator messaging.
    pub(crate) async fn report_outcome(&self, chat: i64, uid: &str, outcome: PublishOutcome) {
        match outcome {
            PublishOutcome::AwaitingReplyChoice { candidate } => {
                let text = format!(
                    "🧵 This looks like a follow-up to:\n<b>{}</b>\n\nPublish as a reply?",
                    format::escape_html(&candidate.title)
                );
                let opts = SendOptions::with_keyboard(keyboards::reply_choice(uid));
                if let Err(e) = self.channel.send_message(&chat.to_string(), &text, opts).await {
                    tracing::warn!(error = %e, "reply prompt failed");
                }
            }
            PublishOutcome::Published {
                message_id,
                as_reply,
                resolver_warned,
            } => {
                let mut text = if as_reply {
                    format!("✅ Published as a reply (message {message_id}).")
                } else {
                    format!("✅ Published (message {message_id}).")
                };
                if resolver_warned {
                    text.push_str("\n⚠️ Thread check failed; posted standalone.");
                }
                self.notify(chat, &text).await;
            }
        }
    }
}
