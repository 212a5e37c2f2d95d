//! Chat-platform abstraction — everything the workflow needs from the
//! messaging side, behind one trait so tests can inject a fake.

pub mod telegram;

pub use telegram::TelegramChannel;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Maximum text length for a single message.
pub const MAX_MESSAGE_LENGTH: usize = 4096;

/// Maximum caption length for a photo post.
pub const MAX_CAPTION_LENGTH: usize = 1024;

/// Optional knobs for an outgoing message.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Send as a reply to this message id.
    pub reply_to: Option<i64>,
    /// Inline keyboard attached to the message.
    pub keyboard: Option<InlineKeyboard>,
    /// Suppress the link preview.
    pub disable_preview: bool,
}

impl SendOptions {
    pub fn reply_to(id: i64) -> Self {
        Self {
            reply_to: Some(id),
            ..Default::default()
        }
    }

    pub fn with_keyboard(keyboard: InlineKeyboard) -> Self {
        Self {
            keyboard: Some(keyboard),
            disable_preview: true,
            ..Default::default()
        }
    }
}

/// Inline keyboard markup.
#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    pub fn new(rows: Vec<Vec<InlineButton>>) -> Self {
        Self {
            inline_keyboard: rows,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// A command shown in the bot's menu.
#[derive(Debug, Clone, Serialize)]
pub struct BotCommand {
    pub command: String,
    pub description: String,
}

impl BotCommand {
    pub fn new(command: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            description: description.into(),
        }
    }
}

// ── Inbound update payloads ─────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub photo: Option<Vec<PhotoSize>>,
}

impl IncomingMessage {
    /// File id of the largest photo variant, if any.
    pub fn largest_photo(&self) -> Option<&str> {
        self.photo
            .as_ref()
            .and_then(|sizes| sizes.last())
            .map(|p| p.file_id.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

// ── The platform trait ──────────────────────────────────────────────

/// Chat-platform collaborator. Message ids are opaque platform integers.
#[async_trait]
pub trait ChannelApi: Send + Sync {
    /// Send an HTML-formatted text message; returns the new message id.
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        opts: SendOptions,
    ) -> Result<i64, ChannelError>;

    /// Send a photo by platform file id with an HTML caption.
    async fn send_photo(
        &self,
        chat_id: &str,
        file_id: &str,
        caption: &str,
        opts: SendOptions,
    ) -> Result<i64, ChannelError>;

    /// Replace the text of a previously sent message.
    async fn edit_message_text(
        &self,
        chat_id: &str,
        message_id: i64,
        text: &str,
    ) -> Result<(), ChannelError>;

    /// Copy a message into another chat; returns the copy's message id.
    /// Fails if the source message no longer exists.
    async fn copy_message(
        &self,
        to_chat: &str,
        from_chat: &str,
        message_id: i64,
    ) -> Result<i64, ChannelError>;

    /// Delete a message.
    async fn delete_message(&self, chat_id: &str, message_id: i64) -> Result<(), ChannelError>;

    /// Acknowledge a button press.
    async fn answer_callback(&self, callback_id: &str) -> Result<(), ChannelError>;

    /// Publish the command menu.
    async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<(), ChannelError>;

    /// Long-poll for updates past `offset`.
    async fn get_updates(&self, offset: i64, timeout_secs: u64)
    -> Result<Vec<Update>, ChannelError>;
}

/// Truncate text to a char budget without splitting a code point.
pub fn truncate_caption(text: &str) -> String {
    if text.chars().count() > MAX_CAPTION_LENGTH {
        text.chars().take(MAX_CAPTION_LENGTH).collect()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_caption_short_text_untouched() {
        assert_eq!(truncate_caption("hello"), "hello");
    }

    #[test]
    fn truncate_caption_cuts_to_limit() {
        let long = "é".repeat(MAX_CAPTION_LENGTH + 50);
        let cut = truncate_caption(&long);
        assert_eq!(cut.chars().count(), MAX_CAPTION_LENGTH);
    }

    #[test]
    fn largest_photo_takes_last_size() {
        let msg = IncomingMessage {
            message_id: 1,
            chat: Chat { id: 7 },
            text: None,
            photo: Some(vec![
                PhotoSize {
                    file_id: "small".into(),
                },
                PhotoSize {
                    file_id: "large".into(),
                },
            ]),
        };
        assert_eq!(msg.largest_photo(), Some("large"));
    }

    #[test]
    fn update_parses_message_payload() {
        let raw = r#"{
            "update_id": 10,
            "message": {
                "message_id": 5,
                "chat": {"id": 42},
                "text": "/check"
            }
        }"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        assert_eq!(update.update_id, 10);
        let msg = update.message.unwrap();
        assert_eq!(msg.chat.id, 42);
        assert_eq!(msg.text.as_deref(), Some("/check"));
    }

    #[test]
    fn update_parses_callback_payload() {
        let raw = r#"{
            "update_id": 11,
            "callback_query": {
                "id": "cb1",
                "data": "generate:abc",
                "message": {"message_id": 6, "chat": {"id": 42}}
            }
        }"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        let cb = update.callback_query.unwrap();
        assert_eq!(cb.data.as_deref(), Some("generate:abc"));
    }
}
