//! Telegram Bot API client over reqwest.
//!
//! Every call goes through `call()`, which unwraps Telegram's
//! `{"ok": bool, "result": …, "description": …}` envelope.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::channel::{
    BotCommand, ChannelApi, SendOptions, Update, truncate_caption,
};
use crate::error::ChannelError;

pub struct TelegramChannel {
    bot_token: SecretString,
    http: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            http: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.bot_token.expose_secret()
        )
    }

    async fn call(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, ChannelError> {
        let resp = self
            .http
            .post(self.api_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                method: method.to_string(),
                reason: e.to_string(),
            })?;

        let envelope: serde_json::Value =
            resp.json().await.map_err(|e| ChannelError::SendFailed {
                method: method.to_string(),
                reason: format!("invalid response body: {e}"),
            })?;

        if envelope.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            let description = envelope
                .get("description")
                .and_then(|v| v.as_str())
                .unwrap_or("no description")
                .to_string();
            return Err(ChannelError::Api {
                method: method.to_string(),
                description,
            });
        }

        Ok(envelope.get("result").cloned().unwrap_or(serde_json::Value::Null))
    }

    fn message_id_of(method: &str, result: &serde_json::Value) -> Result<i64, ChannelError> {
        result
            .get("message_id")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ChannelError::InvalidUpdate(format!("{method}: no message_id in result")))
    }
}

#[async_trait]
impl ChannelApi for TelegramChannel {
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        opts: SendOptions,
    ) -> Result<i64, ChannelError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": opts.disable_preview,
        });
        if let Some(reply_to) = opts.reply_to {
            body["reply_to_message_id"] = serde_json::json!(reply_to);
        }
        if let Some(keyboard) = &opts.keyboard {
            body["reply_markup"] = serde_json::to_value(keyboard)
                .map_err(|e| ChannelError::InvalidUpdate(e.to_string()))?;
        }

        let result = self.call("sendMessage", body).await?;
        Self::message_id_of("sendMessage", &result)
    }

    async fn send_photo(
        &self,
        chat_id: &str,
        file_id: &str,
        caption: &str,
        opts: SendOptions,
    ) -> Result<i64, ChannelError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "photo": file_id,
            "caption": truncate_caption(caption),
            "parse_mode": "HTML",
        });
        if let Some(reply_to) = opts.reply_to {
            body["reply_to_message_id"] = serde_json::json!(reply_to);
        }
        if let Some(keyboard) = &opts.keyboard {
            body["reply_markup"] = serde_json::to_value(keyboard)
                .map_err(|e| ChannelError::InvalidUpdate(e.to_string()))?;
        }

        let result = self.call("sendPhoto", body).await?;
        Self::message_id_of("sendPhoto", &result)
    }

    async fn edit_message_text(
        &self,
        chat_id: &str,
        message_id: i64,
        text: &str,
    ) -> Result<(), ChannelError> {
        self.call(
            "editMessageText",
            serde_json::json!({
                "chat_id": chat_id,
                "message_id": message_id,
                "text": text,
                "parse_mode": "HTML",
            }),
        )
        .await?;
        Ok(())
    }

    async fn copy_message(
        &self,
        to_chat: &str,
        from_chat: &str,
        message_id: i64,
    ) -> Result<i64, ChannelError> {
        let result = self
            .call(
                "copyMessage",
                serde_json::json!({
                    "chat_id": to_chat,
                    "from_chat_id": from_chat,
                    "message_id": message_id,
                    "disable_notification": true,
                }),
            )
            .await?;
        Self::message_id_of("copyMessage", &result)
    }

    async fn delete_message(&self, chat_id: &str, message_id: i64) -> Result<(), ChannelError> {
        self.call(
            "deleteMessage",
            serde_json::json!({
                "chat_id": chat_id,
                "message_id": message_id,
            }),
        )
        .await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), ChannelError> {
        self.call(
            "answerCallbackQuery",
            serde_json::json!({ "callback_query_id": callback_id }),
        )
        .await?;
        Ok(())
    }

    async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<(), ChannelError> {
        self.call(
            "setMyCommands",
            serde_json::json!({ "commands": commands }),
        )
        .await?;
        Ok(())
    }

    async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, ChannelError> {
        let result = self
            .call(
                "getUpdates",
                serde_json::json!({
                    "offset": offset,
                    "timeout": timeout_secs,
                    "allowed_updates": ["message", "callback_query"],
                }),
            )
            .await?;

        serde_json::from_value(result).map_err(|e| ChannelError::InvalidUpdate(e.to_string()))
    }
}
