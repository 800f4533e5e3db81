//! Built-in commands shared by the controller and tenant bots.
//!
//! Deliberately small: `help` and `menu` exercise the command and action
//! paths, `guess` exercises session-driven text routing, and `start` reads
//! the tenant's bot-info record. Everything heavier lives behind the
//! `tenants` admin command in roost-supervisor.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;

use roost_dispatch::{Command, EventCtx, SessionStore};
use roost_registry::tenant_data;
use roost_telegram::build_keyboard;
use roost_telegram::types::BotCommand;
use roost_types::UserId;

const GUESS_ATTEMPTS: u8 = 3;
const GUESS_MAX: u8 = 10;

/// `/help` — lists the registered command vocabulary.
///
/// The entry list is injected after engine assembly so help can describe
/// every command, including itself.
pub struct HelpCommand {
    entries: Mutex<Vec<BotCommand>>,
}

impl HelpCommand {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(Vec::new()),
        })
    }

    pub fn set_entries(&self, entries: Vec<BotCommand>) {
        *self.entries.lock().unwrap() = entries;
    }
}

#[async_trait]
impl Command for HelpCommand {
    fn name(&self) -> &str {
        "help"
    }

    fn description(&self) -> &str {
        "List available commands"
    }

    async fn execute(&self, ctx: &EventCtx) -> Result<()> {
        let entries = self.entries.lock().unwrap().clone();
        let mut lines = vec!["Available commands:".to_string()];
        for entry in entries {
            if entry.description.is_empty() {
                lines.push(format!("/{}", entry.command));
            } else {
                lines.push(format!("/{} — {}", entry.command, entry.description));
            }
        }
        ctx.reply(&lines.join("\n")).await?;
        Ok(())
    }
}

/// `/menu` — inline keyboard with info, game, and settings actions.
pub struct MenuCommand;

#[async_trait]
impl Command for MenuCommand {
    fn name(&self) -> &str {
        "menu"
    }

    fn description(&self) -> &str {
        "Show the main menu"
    }

    fn action_ids(&self) -> Vec<&'static str> {
        vec!["info", "game", "settings"]
    }

    async fn execute(&self, ctx: &EventCtx) -> Result<()> {
        let keyboard = build_keyboard(&[
            vec![("ℹ Info", "menu_info".to_string()), ("🎲 Game", "menu_game".to_string())],
            vec![("⚙ Settings", "menu_settings".to_string())],
        ]);
        ctx.reply_with_keyboard("What would you like to do?", keyboard)
            .await?;
        Ok(())
    }

    async fn handle_action(&self, action_id: &str, ctx: &EventCtx) -> Result<()> {
        ctx.answer_callback(None, false).await?;
        let text = match action_id {
            "info" => "This bot routes commands, buttons, and games. Try /help.",
            "game" => "Start a round with /guess — I pick a number, you have 3 tries.",
            "settings" => "Nothing to configure here yet.",
            _ => return Ok(()),
        };
        ctx.edit_or_reply(text, None).await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct GuessSession {
    target: u8,
    attempts: u8,
}

/// `/guess` — the number-guessing game driving session text routing.
pub struct GuessCommand {
    sessions: SessionStore<GuessSession>,
}

impl GuessCommand {
    pub fn new() -> Self {
        Self {
            sessions: SessionStore::new(),
        }
    }

    #[cfg(test)]
    fn session(&self, user: UserId) -> Option<(u8, u8)> {
        self.sessions.get(user).map(|s| (s.target, s.attempts))
    }
}

#[async_trait]
impl Command for GuessCommand {
    fn name(&self) -> &str {
        "guess"
    }

    fn description(&self) -> &str {
        "Play a number-guessing game"
    }

    fn text_handler_ids(&self) -> Vec<&'static str> {
        vec!["guess"]
    }

    fn has_active_session(&self, user: UserId) -> bool {
        self.sessions.has(user)
    }

    async fn execute(&self, ctx: &EventCtx) -> Result<()> {
        let target = rand::thread_rng().gen_range(1..=GUESS_MAX);
        self.sessions.set(
            ctx.user_id(),
            GuessSession {
                target,
                attempts: GUESS_ATTEMPTS,
            },
        );
        ctx.reply(&format!(
            "I picked a number between 1 and {GUESS_MAX}. You have {GUESS_ATTEMPTS} attempts — send me a guess."
        ))
        .await?;
        Ok(())
    }

    async fn handle_text(&self, _handler_id: &str, ctx: &EventCtx) -> Result<bool> {
        let user = ctx.user_id();
        let Some(mut session) = self.sessions.get(user) else {
            return Ok(false);
        };
        // Non-numeric chatter during a game is not a guess; let it pass
        // through to the next stage.
        let Some(guess) = ctx.text.as_deref().and_then(|t| t.trim().parse::<u8>().ok()) else {
            return Ok(false);
        };

        if guess == session.target {
            self.sessions.clear(user);
            ctx.reply(&format!("Correct! It was {}. 🎉", session.target))
                .await?;
            return Ok(true);
        }

        session.attempts -= 1;
        if session.attempts == 0 {
            let target = session.target;
            self.sessions.clear(user);
            ctx.reply(&format!("Out of attempts — it was {target}."))
                .await?;
            return Ok(true);
        }

        let hint = if guess < session.target { "higher" } else { "lower" };
        let attempts = session.attempts;
        self.sessions.set(user, session);
        ctx.reply(&format!("Try {hint}. {attempts} attempts left."))
            .await?;
        Ok(true)
    }
}

/// `/start` — the tenant bot's introduction, read from its bot-info record.
pub struct StartCommand {
    data_dir: PathBuf,
}

impl StartCommand {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }
}

#[async_trait]
impl Command for StartCommand {
    fn name(&self) -> &str {
        "start"
    }

    fn description(&self) -> &str {
        "About this bot"
    }

    async fn execute(&self, ctx: &EventCtx) -> Result<()> {
        let snap = tenant_data::snapshot(&self.data_dir)?;
        let owner = if snap.botinfo.owner_name.is_empty() {
            "my owner".to_string()
        } else {
            snap.botinfo.owner_name
        };
        ctx.reply(&format!(
            "Hello! I'm {}, run by {owner}. Send /help to see what I can do.",
            snap.botinfo.bot_name
        ))
        .await?;
        Ok(())
    }
}
