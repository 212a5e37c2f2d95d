//! Inline-button callback handling.
//!
//! Callback data is `action:uid` with optional extra segments; uids are
//! item fingerprints except `reply_set`, whose second segment is the
//! target post's uid.

use crate::bot::dispatcher::Dispatcher;
use crate::bot::keyboards;
use crate::channel::SendOptions;
use crate::error::Error;

impl Dispatcher {
    pub(super) async fn handle_callback(&self, chat: i64, data: &str) -> Result<(), Error> {
        let (action, rest) = data.split_once(':').unwrap_or((data, ""));
        match action {
            "generate" | "regenerate" => self.cb_generate(chat, rest).await,
            "publish" => self.cb_publish(chat, rest).await,
            "edit" => self.cb_edit(chat, rest).await,
            "photo" => self.cb_photo(chat, rest).await,
            "reply_confirm" => self.cb_reply_confirm(chat, rest).await,
            "reply_skip" | "reply_none" => self.cb_reply_skip(chat, rest).await,
            "reply_pick" => self.cb_reply_pick(chat, rest).await,
            "reply_set" => self.cb_reply_set(chat, rest).await,
            _ => {
                tracing::warn!(data, "unrecognized callback");
                Ok(())
            }
        }
    }

    async fn cb_generate(&self, chat: i64, uid: &str) -> Result<(), Error> {
        self.notify(chat, "✍️ Writing the post…").await;
        self.controller.generate_draft(uid).await?;
        self.show_draft(chat, uid).await;
        Ok(())
    }

    async fn cb_publish(&self, chat: i64, uid: &str) -> Result<(), Error> {
        let outcome = self.controller.publish(uid, &chat.to_string()).await?;
        self.report_outcome(chat, uid, outcome).await;
        Ok(())
    }

    async fn cb_edit(&self, chat: i64, uid: &str) -> Result<(), Error> {
        let draft = self.controller.begin_edit(uid, chat).await?;
        let text = format!(
            "✏️ Send the replacement text. Current draft:\n\n{draft}\n\n(/cancel to keep it)"
        );
        self.notify(chat, &text).await;
        Ok(())
    }

    async fn cb_photo(&self, chat: i64, uid: &str) -> Result<(), Error> {
        let has_photo = self.controller.begin_photo(uid, chat).await?;
        let text = if has_photo {
            "🖼 Send a photo to replace the current one. (/cancel to keep it)"
        } else {
            "🖼 Send a photo to attach. (/cancel to skip)"
        };
        self.notify(chat, text).await;
        Ok(())
    }

    async fn cb_reply_confirm(&self, chat: i64, uid: &str) -> Result<(), Error> {
        let outcome = self.controller.confirm_proposed_reply(uid).await?;
        self.report_outcome(chat, uid, outcome).await;
        Ok(())
    }

    async fn cb_reply_skip(&self, chat: i64, uid: &str) -> Result<(), Error> {
        let outcome = self.controller.publish_without_reply(uid).await?;
        self.report_outcome(chat, uid, outcome).await;
        Ok(())
    }

    async fn cb_reply_pick(&self, chat: i64, rest: &str) -> Result<(), Error> {
        let (uid, page) = rest.split_once(':').unwrap_or((rest, "0"));
        let page = page.parse::<usize>().unwrap_or(0);

        let reply_page = self
            .controller
            .reply_page(uid, page, &chat.to_string())
            .await?;
        if reply_page.posts.is_empty() && page == 0 {
            self.notify(chat, "📭 Nothing published yet to reply to.").await;
            return Ok(());
        }
        let text = format!("💬 Reply to which post? (page {})", reply_page.page + 1);
        let opts = SendOptions::with_keyboard(keyboards::reply_page(uid, &reply_page));
        self.channel.send_message(&chat.to_string(), &text, opts).await?;
        Ok(())
    }

    async fn cb_reply_set(&self, chat: i64, rest: &str) -> Result<(), Error> {
        let Some((uid, target_uid)) = rest.split_once(':') else {
            tracing::warn!(rest, "malformed reply_set callback");
            return Ok(());
        };
        let outcome = self.controller.select_reply(uid, target_uid).await?;
        self.report_outcome(chat, uid, outcome).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn reply_set_data_splits_into_uid_and_target() {
        let data = "reply_set:aaaaaaaaaaaaaaaa:bbbbbbbbbbbbbbbb";
        let (action, rest) = data.split_once(':').unwrap();
        assert_eq!(action, "reply_set");
        let (uid, target) = rest.split_once(':').unwrap();
        assert_eq!(uid.len(), 16);
        assert_eq!(target.len(), 16);
    }
}
