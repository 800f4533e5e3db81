//! Core dispatch types: event context, the [`Command`] trait, and
//! [`Middleware`] guards.
//!
//! Every command implements [`Command`], which exposes an entry point plus
//! the optional capability set the engine routes to: middleware guards,
//! callback actions, and session-scoped text handlers. Commands receive an
//! [`EventCtx`] describing who sent the event and from where, with reply
//! helpers bound to the Bot API client.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use roost_telegram::types::{CallbackQuery, Chat, InlineKeyboardMarkup, Message, Update, User};
use roost_telegram::TelegramApi;
use roost_types::UserId;

use crate::engine::COMMAND_PREFIX;

/// Reference to the callback query an event originated from.
#[derive(Debug, Clone)]
pub struct CallbackRef {
    /// Callback query id, needed to answer the interaction.
    pub id: String,
    /// The raw callback data the action matching runs against.
    pub data: String,
    /// Message carrying the pressed button, if the platform included it.
    pub message_id: Option<i64>,
}

/// Execution context passed to every command handler.
#[derive(Clone)]
pub struct EventCtx {
    /// Bot API client for outbound calls.
    pub api: Arc<TelegramApi>,
    pub chat: Chat,
    pub user: User,
    /// Message text for message-born events.
    pub text: Option<String>,
    /// Parsed positional arguments (excluding the command name itself).
    pub args: Vec<String>,
    /// Set for callback-interaction events.
    pub callback: Option<CallbackRef>,
}

impl EventCtx {
    fn from_message(api: Arc<TelegramApi>, msg: &Message, user: User) -> Self {
        Self {
            api,
            chat: msg.chat.clone(),
            user,
            text: msg.text.clone(),
            args: Vec::new(),
            callback: None,
        }
    }

    fn from_callback(api: Arc<TelegramApi>, cb: &CallbackQuery, data: String) -> Self {
        let chat = cb
            .message
            .as_ref()
            .map(|m| m.chat.clone())
            .unwrap_or(Chat {
                id: cb.from.id,
                chat_type: Some("private".into()),
                title: None,
            });
        Self {
            api,
            chat,
            user: cb.from.clone(),
            text: None,
            args: Vec::new(),
            callback: Some(CallbackRef {
                id: cb.id.clone(),
                data,
                message_id: cb.message.as_ref().map(|m| m.message_id),
            }),
        }
    }

    /// The sender's id as a typed value.
    pub fn user_id(&self) -> UserId {
        UserId(self.user.id)
    }

    /// Username if set, otherwise the first name.
    pub fn user_label(&self) -> &str {
        self.user
            .username
            .as_deref()
            .unwrap_or(&self.user.first_name)
    }

    /// Send a plain reply into the originating chat.
    pub async fn reply(&self, text: &str) -> Result<i64> {
        Ok(self.api.send_message(self.chat.id, text, None).await?)
    }

    /// Send a reply with an inline keyboard.
    pub async fn reply_with_keyboard(
        &self,
        text: &str,
        markup: InlineKeyboardMarkup,
    ) -> Result<i64> {
        Ok(self
            .api
            .send_message(self.chat.id, text, Some(markup))
            .await?)
    }

    /// Edit the message the callback button lives on, or send a fresh
    /// message when the event did not come from a button press.
    pub async fn edit_or_reply(
        &self,
        text: &str,
        markup: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        match self.callback.as_ref().and_then(|cb| cb.message_id) {
            Some(message_id) => {
                self.api
                    .edit_message_text(self.chat.id, message_id, text, markup)
                    .await?;
            }
            None => {
                self.api.send_message(self.chat.id, text, markup).await?;
            }
        }
        Ok(())
    }

    /// Answer the callback interaction this event came from. No-op for
    /// message-born events.
    pub async fn answer_callback(&self, text: Option<&str>, show_alert: bool) -> Result<()> {
        if let Some(cb) = &self.callback {
            self.api
                .answer_callback_query(&cb.id, text, show_alert)
                .await?;
        }
        Ok(())
    }
}

/// An inbound event, classified for routing.
///
/// Classification is separate from dispatch so a tenant-scoped wrapper (the
/// security gate) can inspect command-class events before they reach the
/// engine.
pub enum CommandEvent {
    /// A message whose text begins with the command prefix.
    Command { name: String, ctx: EventCtx },
    /// An inline keyboard button press.
    Callback { ctx: EventCtx },
    /// Any other text message.
    Text { ctx: EventCtx },
}

impl CommandEvent {
    /// Classify a raw update. Returns `None` for updates roost does not
    /// route (no sender, no text, no callback data).
    pub fn from_update(api: Arc<TelegramApi>, update: &Update) -> Option<Self> {
        if let Some(msg) = &update.message {
            let user = msg.from.clone()?;
            let text = msg.text.as_deref()?;
            let mut ctx = EventCtx::from_message(api, msg, user);

            if let Some(rest) = text.strip_prefix(COMMAND_PREFIX) {
                let mut parts = rest.split_whitespace();
                let name = parts.next().unwrap_or_default().to_string();
                ctx.args = parts.map(str::to_string).collect();
                return Some(CommandEvent::Command { name, ctx });
            }
            return Some(CommandEvent::Text { ctx });
        }

        if let Some(cb) = &update.callback_query {
            let data = cb.data.clone()?;
            let ctx = EventCtx::from_callback(api, cb, data);
            return Some(CommandEvent::Callback { ctx });
        }

        None
    }

    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            CommandEvent::Command { .. } => "command",
            CommandEvent::Callback { .. } => "callback",
            CommandEvent::Text { .. } => "text",
        }
    }
}

/// A guard that runs before a command's entry point.
///
/// Returning `Ok(false)` short-circuits the dispatch; the guard is expected
/// to have replied to the user itself if an explanation is warranted.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn allow(&self, ctx: &EventCtx) -> Result<bool>;
}

/// Handler for an engine-wide (global) callback action.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, ctx: &EventCtx) -> Result<()>;
}

/// Trait that all dispatchable commands implement.
///
/// A command is constructed once at process startup and lives for the
/// process lifetime. Besides the entry point it may expose:
///
/// - ordered [`Middleware`] guards run before the entry point,
/// - callback actions, exposed engine-wide as `<name>_<action_id>`,
/// - text handlers, consulted only while the command has an active session
///   for the sending user.
#[async_trait]
pub trait Command: Send + Sync {
    /// Unique command name (without the leading prefix).
    fn name(&self) -> &str;

    /// One-line description shown in help listings and the platform's
    /// command menu.
    fn description(&self) -> &str {
        ""
    }

    /// Ordered guards run before `execute`.
    fn middleware(&self) -> Vec<Arc<dyn Middleware>> {
        Vec::new()
    }

    /// Action ids this command exposes, in registration order. The engine
    /// namespaces them as `<name>_<action_id>`.
    fn action_ids(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Text-handler ids this command exposes, in registration order.
    fn text_handler_ids(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Whether this command currently holds a session for `user`.
    fn has_active_session(&self, _user: UserId) -> bool {
        false
    }

    /// Entry point for `/name` command events.
    async fn execute(&self, ctx: &EventCtx) -> Result<()>;

    /// Invoked when a callback matched one of this command's actions.
    async fn handle_action(&self, _action_id: &str, _ctx: &EventCtx) -> Result<()> {
        Ok(())
    }

    /// Invoked for free-text messages while a session is active. Returns
    /// `true` if the handler claimed the message.
    async fn handle_text(&self, _handler_id: &str, _ctx: &EventCtx) -> Result<bool> {
        Ok(false)
    }
}
