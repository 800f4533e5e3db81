//! The dispatch engine: registration and routing.
//!
//! Owns the set of registered commands plus engine-wide callback actions,
//! and routes classified events to the right handler:
//!
//! - command events: exact name lookup, middleware chain, entry point;
//! - callback events: scan engine-wide actions in registration order,
//!   first prefix match wins;
//! - text events: consult text handlers of commands holding an active
//!   session for the sender, in registration order.
//!
//! [`DispatchEngine::dispatch`] is the per-event error boundary: handler
//! failures are logged with the update kind, the user gets a generic
//! apology, and the process keeps running.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};

use roost_telegram::types::BotCommand;

use crate::command::{ActionHandler, Command, CommandEvent, EventCtx};

/// Prefix character that turns a text message into a command event.
pub const COMMAND_PREFIX: char = '/';

const CALLBACK_FAILED_REPLY: &str = "Something went wrong handling that action.";
const CALLBACK_NOT_FOUND_REPLY: &str = "Action not found.";
const GENERIC_APOLOGY: &str = "Sorry, something went wrong processing that message.";

/// Outcome of routing a free-text event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOutcome {
    /// A command's text handler claimed the message.
    Claimed,
    /// Nothing claimed it; the caller may pass it to the next stage
    /// (moderation and the like).
    Unclaimed,
}

/// Target of a callback-action scan entry.
enum ActionTarget {
    Global(Arc<dyn ActionHandler>),
    Command { index: usize, action_id: &'static str },
}

/// The router mapping inbound events to commands, actions, and handlers.
pub struct DispatchEngine {
    /// Commands in registration order. Re-registering a name replaces the
    /// entry in place, so insertion order is stable.
    commands: Vec<Arc<dyn Command>>,
    /// Name -> index into `commands`.
    index: HashMap<String, usize>,
    /// Engine-wide actions in registration order, scanned before command
    /// actions.
    global_actions: Vec<(String, Arc<dyn ActionHandler>)>,
}

impl DispatchEngine {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            index: HashMap::new(),
            global_actions: Vec::new(),
        }
    }

    /// Register a command.
    ///
    /// A name collision replaces the previous entry (last registration
    /// wins) while keeping its registration slot.
    pub fn register_command(&mut self, cmd: Arc<dyn Command>) {
        let name = cmd.name().to_string();
        match self.index.get(&name) {
            Some(&i) => {
                warn!(command = %name, "re-registering command, previous handler replaced");
                self.commands[i] = cmd;
            }
            None => {
                info!(command = %name, "command registered");
                self.index.insert(name, self.commands.len());
                self.commands.push(cmd);
            }
        }
    }

    /// Register an engine-wide callback action.
    pub fn register_global_action(&mut self, action_id: impl Into<String>, handler: Arc<dyn ActionHandler>) {
        let id = action_id.into();
        info!(action = %id, "global action registered");
        self.global_actions.push((id, handler));
    }

    /// Look up a command by exact name.
    pub fn command(&self, name: &str) -> Option<&Arc<dyn Command>> {
        self.index.get(name).map(|&i| &self.commands[i])
    }

    /// All registered commands in registration order.
    pub fn commands(&self) -> &[Arc<dyn Command>] {
        &self.commands
    }

    /// The command vocabulary for the platform's `setMyCommands`.
    pub fn bot_commands(&self) -> Vec<BotCommand> {
        self.commands
            .iter()
            .map(|c| BotCommand {
                command: c.name().to_string(),
                description: c.description().to_string(),
            })
            .collect()
    }

    /// Route a classified event, absorbing handler failures.
    pub async fn dispatch(&self, event: CommandEvent) {
        let kind = event.kind();
        match event {
            CommandEvent::Command { name, ctx } => {
                if let Err(e) = self.dispatch_command(&name, &ctx).await {
                    error!(update_kind = kind, command = %name, error = %e, "handler failed");
                    let _ = ctx.reply(GENERIC_APOLOGY).await;
                }
            }
            CommandEvent::Callback { ctx } => {
                if let Err(e) = self.dispatch_callback(&ctx).await {
                    error!(update_kind = kind, error = %e, "callback routing failed");
                }
            }
            CommandEvent::Text { ctx } => {
                if let Err(e) = self.dispatch_text(&ctx).await {
                    error!(update_kind = kind, error = %e, "text routing failed");
                    let _ = ctx.reply(GENERIC_APOLOGY).await;
                }
            }
        }
    }

    /// Route a command event. Returns `Ok(false)` if no command with that
    /// name is registered.
    pub async fn dispatch_command(&self, name: &str, ctx: &EventCtx) -> Result<bool> {
        info!(
            command = name,
            user_id = ctx.user.id,
            user = %ctx.user_label(),
            chat_id = ctx.chat.id,
            chat = ctx.chat.title.as_deref().unwrap_or(""),
            "command received"
        );

        let Some(cmd) = self.command(name) else {
            return Ok(false);
        };

        // Guards run in order; any guard declining ends the dispatch. The
        // guard itself is responsible for telling the user why.
        for mw in cmd.middleware() {
            if !mw.allow(ctx).await? {
                return Ok(true);
            }
        }

        cmd.execute(ctx).await?;
        Ok(true)
    }

    /// Route a callback-interaction event.
    ///
    /// Scans engine-wide actions (globals first, then every command's
    /// namespaced actions) in registration order; the first entry whose id
    /// is a prefix of the callback data wins. A handler failure answers the
    /// interaction with a generic acknowledgement and stops the scan; no
    /// match answers with "not found".
    pub async fn dispatch_callback(&self, ctx: &EventCtx) -> Result<()> {
        let Some(data) = ctx.callback.as_ref().map(|cb| cb.data.clone()) else {
            return Ok(());
        };

        for (full_id, target) in self.action_scan() {
            if !action_matches(&full_id, &data) {
                continue;
            }

            let result = match target {
                ActionTarget::Global(handler) => handler.handle(ctx).await,
                ActionTarget::Command { index, action_id } => {
                    self.commands[index].handle_action(action_id, ctx).await
                }
            };

            if let Err(e) = result {
                error!(action = %full_id, data = %data, error = %e, "action handler failed");
                let _ = ctx.answer_callback(Some(CALLBACK_FAILED_REPLY), false).await;
            }
            return Ok(());
        }

        let _ = ctx
            .answer_callback(Some(CALLBACK_NOT_FOUND_REPLY), false)
            .await;
        Ok(())
    }

    /// Route a free-text event.
    ///
    /// Text beginning with the command prefix is re-routed as a command.
    /// Otherwise, every command holding an active session for the sender is
    /// consulted in registration order; the first text handler returning
    /// `true` claims the message.
    pub async fn dispatch_text(&self, ctx: &EventCtx) -> Result<TextOutcome> {
        let Some(text) = ctx.text.clone() else {
            return Ok(TextOutcome::Unclaimed);
        };

        if let Some(rest) = text.trim().strip_prefix(COMMAND_PREFIX) {
            let mut parts = rest.split_whitespace();
            let name = parts.next().unwrap_or_default().to_string();
            let mut cmd_ctx = ctx.clone();
            cmd_ctx.args = parts.map(str::to_string).collect();
            return Ok(match self.dispatch_command(&name, &cmd_ctx).await? {
                true => TextOutcome::Claimed,
                false => TextOutcome::Unclaimed,
            });
        }

        let user = ctx.user_id();
        for cmd in &self.commands {
            if !cmd.has_active_session(user) {
                continue;
            }
            for handler_id in cmd.text_handler_ids() {
                match cmd.handle_text(handler_id, ctx).await {
                    Ok(true) => return Ok(TextOutcome::Claimed),
                    Ok(false) => {}
                    Err(e) => {
                        // A broken handler must not starve the rest.
                        error!(
                            command = cmd.name(),
                            handler = handler_id,
                            error = %e,
                            "text handler failed"
                        );
                    }
                }
            }
        }

        Ok(TextOutcome::Unclaimed)
    }

    /// Engine-wide action scan list: globals first, then each command's
    /// namespaced actions, all in registration order.
    fn action_scan(&self) -> Vec<(String, ActionTarget)> {
        let mut scan: Vec<(String, ActionTarget)> = self
            .global_actions
            .iter()
            .map(|(id, handler)| (id.clone(), ActionTarget::Global(Arc::clone(handler))))
            .collect();

        for (index, cmd) in self.commands.iter().enumerate() {
            for action_id in cmd.action_ids() {
                scan.push((
                    format!("{}_{}", cmd.name(), action_id),
                    ActionTarget::Command { index, action_id },
                ));
            }
        }

        scan
    }
}

impl Default for DispatchEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Prefix match on the namespaced action id.
///
/// Deliberately looser than requiring an underscore separator: both the
/// sub-action payload `menu_info_x` and the suffixed `menu_infoo` land on
/// the action registered as `menu_info`.
fn action_matches(action_id: &str, data: &str) -> bool {
    data == action_id || data.starts_with(action_id)
}
