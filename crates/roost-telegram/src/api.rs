//! Raw HTTP calls to the Telegram Bot API.
//!
//! Wraps reqwest for `sendMessage`, `editMessageText`, `getUpdates`,
//! `answerCallbackQuery`, `getChatMember`, `banChatMember`, and
//! `setMyCommands`. All methods return typed responses.

use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use crate::types::{
    ApiResponse, BotCommand, ChatMember, InlineKeyboardButton, InlineKeyboardMarkup, SentMessage,
    Update,
};
use crate::TelegramError;

/// Low-level Telegram Bot API client.
pub struct TelegramApi {
    client: Client,
    base_url: String,
}

impl TelegramApi {
    /// Create a new API client for the given bot token.
    pub fn new(bot_token: &str) -> Self {
        Self::with_base_url(bot_token, "https://api.telegram.org")
    }

    /// Create a new API client with a custom base URL (for testing).
    pub fn with_base_url(bot_token: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("{}/bot{}", base_url.trim_end_matches('/'), bot_token),
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<Option<T>, TelegramError> {
        let resp = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .json(&body)
            .send()
            .await?;

        let api_resp: ApiResponse<T> = resp.json().await?;
        if !api_resp.ok {
            let desc = api_resp.description.unwrap_or_default();
            warn!(method, "bot api call failed: {desc}");
            return Err(TelegramError::Api(desc));
        }
        Ok(api_resp.result)
    }

    /// Send a text message to a chat. Returns the sent message's id.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<i64, TelegramError> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(markup) = reply_markup {
            body["reply_markup"] = serde_json::to_value(markup)
                .map_err(|e| TelegramError::Other(format!("serialize markup: {e}")))?;
        }

        debug!(chat_id, "sendMessage");
        let sent: Option<SentMessage> = self.call("sendMessage", body).await?;
        Ok(sent.map(|m| m.message_id).unwrap_or(0))
    }

    /// Edit the text (and optionally the keyboard) of an existing message.
    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<(), TelegramError> {
        let mut body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
        });
        if let Some(markup) = reply_markup {
            body["reply_markup"] = serde_json::to_value(markup)
                .map_err(|e| TelegramError::Other(format!("serialize markup: {e}")))?;
        }

        debug!(chat_id, message_id, "editMessageText");
        // editMessageText returns the edited Message or `true`; neither is consumed.
        let _: Option<serde_json::Value> = self.call("editMessageText", body).await?;
        Ok(())
    }

    /// Long-poll for new updates.
    ///
    /// `offset` should be `last_update_id + 1` to acknowledge previously
    /// received updates.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let mut body = json!({
            "timeout": timeout,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(off) = offset {
            body["offset"] = json!(off);
        }

        let updates: Option<Vec<Update>> = self.call("getUpdates", body).await?;
        Ok(updates.unwrap_or_default())
    }

    /// Acknowledge a callback query, dismissing the button spinner.
    ///
    /// With `show_alert`, the text is shown as a modal instead of a toast.
    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<(), TelegramError> {
        let mut body = json!({
            "callback_query_id": callback_query_id,
        });
        if let Some(t) = text {
            body["text"] = json!(t);
        }
        if show_alert {
            body["show_alert"] = json!(true);
        }

        let _: Option<bool> = self.call("answerCallbackQuery", body).await?;
        Ok(())
    }

    /// Fetch a chat member's role ("creator", "administrator", "member", ...).
    pub async fn get_chat_member(
        &self,
        chat_id: i64,
        user_id: i64,
    ) -> Result<ChatMember, TelegramError> {
        let body = json!({
            "chat_id": chat_id,
            "user_id": user_id,
        });
        self.call("getChatMember", body)
            .await?
            .ok_or_else(|| TelegramError::Api("getChatMember returned no result".into()))
    }

    /// Remove a member from a chat.
    pub async fn ban_chat_member(&self, chat_id: i64, user_id: i64) -> Result<(), TelegramError> {
        let body = json!({
            "chat_id": chat_id,
            "user_id": user_id,
        });
        let _: Option<bool> = self.call("banChatMember", body).await?;
        Ok(())
    }

    /// Register the bot's command vocabulary with the platform.
    pub async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<(), TelegramError> {
        let body = json!({
            "commands": commands,
        });
        let _: Option<bool> = self.call("setMyCommands", body).await?;
        Ok(())
    }
}

/// Build an inline keyboard from rows of `(label, callback_data)` pairs.
pub fn build_keyboard(rows: &[Vec<(&str, String)>]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|(text, data)| InlineKeyboardButton {
                        text: text.to_string(),
                        callback_data: data.clone(),
                    })
                    .collect()
            })
            .collect(),
    }
}
