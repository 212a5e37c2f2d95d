//! Slash-command handling.

use crate::bot::dispatcher::Dispatcher;
use crate::bot::{format, keyboards};
use crate::channel::SendOptions;
use crate::error::Error;

/// Default /digest score window.
const DIGEST_DEFAULT_MIN: u8 = 3;
const DIGEST_DEFAULT_MAX: u8 = 7;

impl Dispatcher {
    pub(super) async fn handle_command(&self, chat: i64, text: &str) -> Result<(), Error> {
        let mut parts = text.split_whitespace();
        let command = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        match command {
            "/check" => self.cmd_check(chat).await,
            "/digest" => self.cmd_digest(chat, &args).await,
            "/status" => self.cmd_status(chat).await,
            "/sethype" => self.cmd_sethype(chat, &args).await,
            "/cancel" => {
                // A pending capture was already consumed by the command
                // interrupt in the message handler.
                self.notify(chat, "👌 Nothing pending.").await;
                Ok(())
            }
            _ => {
                self.notify(chat, "🤔 Unknown command, see the menu.").await;
                Ok(())
            }
        }
    }

    async fn cmd_check(&self, chat: i64) -> Result<(), Error> {
        let progress_id = self
            .channel
            .send_message(&chat.to_string(), "🔍 Checking feeds…", SendOptions::default())
            .await?;

        let report = self.controller.check_cycle().await?;

        let summary = format!(
            "📡 Fetched {}, {} new, {} scored, {} hot.",
            report.fetched,
            report.fresh,
            report.scored,
            report.hot.len()
        );
        // The progress message becomes the cycle summary.
        if let Err(e) = self
            .channel
            .edit_message_text(&chat.to_string(), progress_id, &summary)
            .await
        {
            tracing::debug!(error = %e, "progress edit failed");
            self.notify(chat, &summary).await;
        }

        // Per-alert failures are isolated, matching the scheduled path.
        for (i, item) in report.hot.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(super::dispatcher::ALERT_PAUSE).await;
            }
            let text = format::format_alert(item);
            let opts = SendOptions::with_keyboard(keyboards::alert(&item.fingerprint));
            if let Err(e) = self.channel.send_message(&chat.to_string(), &text, opts).await {
                tracing::warn!(error = %e, uid = %item.fingerprint, "alert delivery failed");
            }
        }
        Ok(())
    }

    async fn cmd_digest(&self, chat: i64, args: &[&str]) -> Result<(), Error> {
        let (min, max) = match args {
            [] => (DIGEST_DEFAULT_MIN, DIGEST_DEFAULT_MAX),
            [min, max] => match (min.parse::<u8>(), max.parse::<u8>()) {
                (Ok(min), Ok(max)) if min <= max && (1..=10).contains(&min) && max <= 10 => {
                    (min, max)
                }
                _ => {
                    self.notify(chat, "Usage: /digest [min max], scores 1–10.").await;
                    return Ok(());
                }
            },
            _ => {
                self.notify(chat, "Usage: /digest [min max], scores 1–10.").await;
                return Ok(());
            }
        };

        let (items, total_today) = self.controller.digest(min, max).await?;
        let text = format::format_digest(&items, min, max, total_today);
        self.notify(chat, &text).await;

        // Each digest hit gets its own generate button.
        for item in &items {
            tokio::time::sleep(super::dispatcher::ALERT_PAUSE).await;
            let label = format!(
                "{} {} — {}",
                format::hype_emoji(item.hype_score),
                item.hype_score,
                format::escape_html(&item.title)
            );
            let opts = SendOptions::with_keyboard(keyboards::alert(&item.fingerprint));
            if let Err(e) = self.channel.send_message(&chat.to_string(), &label, opts).await {
                tracing::warn!(error = %e, uid = %item.fingerprint, "digest entry delivery failed");
            }
        }
        Ok(())
    }

    async fn cmd_status(&self, chat: i64) -> Result<(), Error> {
        let report = self.controller.status().await;
        self.notify(chat, &format::format_status(&report)).await;
        Ok(())
    }

    async fn cmd_sethype(&self, chat: i64, args: &[&str]) -> Result<(), Error> {
        match args.first().and_then(|a| a.parse::<u8>().ok()) {
            Some(threshold) if (1..=10).contains(&threshold) => {
                self.controller.set_threshold(threshold);
                self.notify(chat, &format!("📊 Alert threshold set to {threshold}/10."))
                    .await;
            }
            _ => {
                self.notify(chat, "Usage: /sethype N, where N is 1–10.").await;
            }
        }
        Ok(())
    }
}
