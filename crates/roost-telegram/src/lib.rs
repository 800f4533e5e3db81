//! Telegram Bot API collaborator.
//!
//! Wraps the Bot API with a typed [`api::TelegramApi`] client, serde wire
//! types, and a long-polling loop that forwards [`types::Update`]s through a
//! channel. The dispatch engine consumes the update stream; it never talks
//! HTTP directly.

pub mod api;
pub mod poller;
pub mod types;

pub use api::{build_keyboard, TelegramApi};

/// Errors from the Bot API collaborator.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    /// The API returned `ok: false` with a description.
    #[error("telegram api error: {0}")]
    Api(String),

    /// Transport-level failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Anything else (serialization, invalid arguments).
    #[error("{0}")]
    Other(String),
}
