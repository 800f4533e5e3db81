//! The operator-facing `tenants` command.
//!
//! One command carries the whole administrative surface: a button menu,
//! the 3-step creation wizard (token, owner id, display name), and the
//! per-tenant manage view with toggle/restart/reset/delete/data actions.
//! Only the controller admin passes the middleware gate.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use roost_dispatch::{Command, EventCtx, Middleware};
use roost_registry::{tenant_data, NewTenant};
use roost_telegram::build_keyboard;
use roost_types::{
    validate_bot_token, validate_display_name, validate_owner_id, RoostError, Tenant, TenantId,
    UserId,
};

use crate::supervisor::{CreationSession, CreationStep, Tally, TenantSupervisor, ToggleOutcome};

const NAMESPACE: &str = "tenants";

/// Restricts a command to the controller admin.
struct AdminOnly {
    admin: UserId,
}

#[async_trait]
impl Middleware for AdminOnly {
    async fn allow(&self, ctx: &EventCtx) -> Result<bool> {
        if ctx.user_id() == self.admin {
            return Ok(true);
        }
        ctx.reply("You are not authorized to manage tenants.").await?;
        Ok(false)
    }
}

/// `/tenants` — the supervisor's administrative surface.
pub struct TenantsCommand {
    supervisor: Arc<TenantSupervisor>,
    admin: UserId,
}

impl TenantsCommand {
    pub fn new(supervisor: Arc<TenantSupervisor>, admin: UserId) -> Self {
        Self { supervisor, admin }
    }

    /// Tenant id suffix of the callback data for a namespaced action, e.g.
    /// `tenants_manage_1700000000123` -> `1700000000123`.
    fn target_id(action_id: &str, ctx: &EventCtx) -> Option<TenantId> {
        let data = ctx.callback.as_ref()?.data.as_str();
        let id = data
            .strip_prefix(NAMESPACE)?
            .strip_prefix('_')?
            .strip_prefix(action_id)?
            .strip_prefix('_')?;
        (!id.is_empty()).then(|| TenantId::new(id))
    }

    async fn show_menu(&self, ctx: &EventCtx) -> Result<()> {
        let keyboard = build_keyboard(&[
            vec![
                ("➕ Create", action("create")),
                ("📋 List", action("list")),
            ],
            vec![
                ("▶ Start all", action("startall")),
                ("⏹ Stop all", action("stopall")),
            ],
            vec![("✖ Cancel wizard", action("cancel"))],
        ]);
        ctx.reply_with_keyboard("Tenant management:", keyboard)
            .await?;
        Ok(())
    }

    async fn show_list(&self, ctx: &EventCtx) -> Result<()> {
        let tenants = self.supervisor.registry().list().await?;
        if tenants.is_empty() {
            ctx.edit_or_reply(
                "No tenants yet. Use Create to add one.",
                Some(build_keyboard(&[vec![("➕ Create", action("create"))]])),
            )
            .await?;
            return Ok(());
        }

        let mut lines = vec![format!("Tenants ({}):", tenants.len())];
        let mut rows = Vec::new();
        for tenant in &tenants {
            lines.push(format!(
                "• {} ({}) — {}, {} commands",
                tenant.display_name,
                tenant.id,
                self.status(&tenant.id),
                tenant.stats.total_commands,
            ));
            rows.push(vec![(
                format!("Manage {} ·{}", tenant.display_name, tenant.id.short()),
                format!("{NAMESPACE}_manage_{}", tenant.id),
            )]);
        }
        rows.push(vec![("➕ Create".to_string(), action("create"))]);

        let borrowed: Vec<Vec<(&str, String)>> = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|(label, data)| (label.as_str(), data.clone()))
                    .collect()
            })
            .collect();
        ctx.edit_or_reply(&lines.join("\n"), Some(build_keyboard(&borrowed)))
            .await?;
        Ok(())
    }

    async fn show_manage(&self, id: &TenantId, ctx: &EventCtx) -> Result<()> {
        let Some(tenant) = self.supervisor.registry().get(id).await? else {
            ctx.edit_or_reply(&format!("Tenant {id} no longer exists."), None)
                .await?;
            return Ok(());
        };

        let text = manage_text(&tenant, self.status(id));
        let toggle_label = if self.supervisor.is_running(id) {
            "⏹ Stop"
        } else {
            "▶ Start"
        };
        let keyboard = build_keyboard(&[
            vec![
                (toggle_label, target("toggle", id)),
                ("🔄 Restart", target("restart", id)),
            ],
            vec![
                ("♻ Reset", target("reset", id)),
                ("🗑 Delete", target("delete", id)),
            ],
            vec![("🗂 Data", target("data", id)), ("⬅ Back", action("back"))],
        ]);
        ctx.edit_or_reply(&text, Some(keyboard)).await?;
        Ok(())
    }

    async fn show_data(&self, id: &TenantId, ctx: &EventCtx) -> Result<()> {
        let snapshot = tenant_data::snapshot(&self.supervisor.paths().tenant_data_dir(id));
        let text = match snapshot {
            Ok(snap) => format!(
                "Data for {id}:\nbot name: {}\nowner name: {}\nowners: {:?}\npremium users: {}\nwarned users: {}",
                snap.botinfo.bot_name,
                if snap.botinfo.owner_name.is_empty() {
                    "(unset)"
                } else {
                    &snap.botinfo.owner_name
                },
                snap.owners.iter().map(|u| u.0).collect::<Vec<_>>(),
                snap.premiums.len(),
                snap.warns.len(),
            ),
            Err(e) => format!("Could not read data for {id}: {e}"),
        };
        let keyboard = build_keyboard(&[vec![("⬅ Back", target("manage", id))]]);
        ctx.edit_or_reply(&text, Some(keyboard)).await?;
        Ok(())
    }

    async fn begin_wizard(&self, ctx: &EventCtx) -> Result<()> {
        let session = CreationSession::new();
        info!(user_id = ctx.user.id, session = %session.id, "creation wizard started");
        self.supervisor.sessions().set(ctx.user_id(), session);
        ctx.edit_or_reply("Step 1/3 — send me the bot token.", None)
            .await?;
        Ok(())
    }

    /// Run one lifecycle operation and refresh the manage view, or surface
    /// the failure as a message.
    async fn lifecycle(
        &self,
        id: &TenantId,
        ctx: &EventCtx,
        result: Result<&str, RoostError>,
    ) -> Result<()> {
        match result {
            Ok(done) => {
                ctx.answer_callback(Some(done), false).await?;
                self.show_manage(id, ctx).await
            }
            Err(e) => {
                ctx.answer_callback(None, false).await?;
                ctx.edit_or_reply(&format!("Operation failed: {e}"), None)
                    .await?;
                Ok(())
            }
        }
    }

    fn status(&self, id: &TenantId) -> &'static str {
        if self.supervisor.is_running(id) {
            "running"
        } else {
            "stopped"
        }
    }
}

#[async_trait]
impl Command for TenantsCommand {
    fn name(&self) -> &str {
        NAMESPACE
    }

    fn description(&self) -> &str {
        "Manage tenant bot instances"
    }

    fn middleware(&self) -> Vec<Arc<dyn Middleware>> {
        vec![Arc::new(AdminOnly { admin: self.admin })]
    }

    fn action_ids(&self) -> Vec<&'static str> {
        vec![
            "create", "list", "startall", "stopall", "cancel", "back", "manage", "toggle",
            "restart", "reset", "delete", "data",
        ]
    }

    fn text_handler_ids(&self) -> Vec<&'static str> {
        vec!["wizard"]
    }

    fn has_active_session(&self, user: UserId) -> bool {
        self.supervisor.sessions().has(user)
    }

    async fn execute(&self, ctx: &EventCtx) -> Result<()> {
        self.show_menu(ctx).await
    }

    async fn handle_action(&self, action_id: &str, ctx: &EventCtx) -> Result<()> {
        match action_id {
            "create" => {
                ctx.answer_callback(None, false).await?;
                self.begin_wizard(ctx).await
            }
            "list" | "back" => {
                ctx.answer_callback(None, false).await?;
                self.show_list(ctx).await
            }
            "cancel" => {
                ctx.answer_callback(None, false).await?;
                let had = self.supervisor.sessions().clear(ctx.user_id()).is_some();
                ctx.edit_or_reply(
                    if had {
                        "Creation cancelled."
                    } else {
                        "No creation in progress."
                    },
                    None,
                )
                .await?;
                Ok(())
            }
            "startall" => {
                ctx.answer_callback(None, false).await?;
                let tally = self.supervisor.start_all().await?;
                ctx.edit_or_reply(&tally_text("Started", tally), None).await?;
                Ok(())
            }
            "stopall" => {
                ctx.answer_callback(None, false).await?;
                let tally = self.supervisor.stop_all().await?;
                ctx.edit_or_reply(&tally_text("Stopped", tally), None).await?;
                Ok(())
            }
            op => {
                let Some(id) = Self::target_id(op, ctx) else {
                    ctx.answer_callback(Some("Missing tenant id"), true).await?;
                    return Ok(());
                };
                match op {
                    "manage" => {
                        ctx.answer_callback(None, false).await?;
                        self.show_manage(&id, ctx).await
                    }
                    "toggle" => {
                        let result = self.supervisor.toggle(&id).await.map(|o| match o {
                            ToggleOutcome::Started => "Started",
                            ToggleOutcome::Stopped => "Stopped",
                        });
                        self.lifecycle(&id, ctx, result).await
                    }
                    "restart" => {
                        let result = self.supervisor.restart(&id).await.map(|_| "Restarted");
                        self.lifecycle(&id, ctx, result).await
                    }
                    "reset" => {
                        let result = self.supervisor.reset(&id).await.map(|_| "Reset done");
                        self.lifecycle(&id, ctx, result).await
                    }
                    "delete" => match self.supervisor.delete(&id).await {
                        Ok(()) => {
                            ctx.answer_callback(Some("Deleted"), false).await?;
                            self.show_list(ctx).await
                        }
                        Err(e) => {
                            ctx.answer_callback(None, false).await?;
                            ctx.edit_or_reply(&format!("Operation failed: {e}"), None)
                                .await?;
                            Ok(())
                        }
                    },
                    "data" => {
                        ctx.answer_callback(None, false).await?;
                        self.show_data(&id, ctx).await
                    }
                    _ => Ok(()),
                }
            }
        }
    }

    async fn handle_text(&self, _handler_id: &str, ctx: &EventCtx) -> Result<bool> {
        let user = ctx.user_id();
        let Some(mut session) = self.supervisor.sessions().get(user) else {
            return Ok(false);
        };
        let Some(text) = ctx.text.as_deref().map(str::trim) else {
            return Ok(false);
        };

        match session.step {
            CreationStep::Token => {
                if let Err(e) = validate_bot_token(text) {
                    ctx.reply(&format!("{e}. Send the token again.")).await?;
                    return Ok(true);
                }
                session.bot_token = Some(text.to_string());
                session.step = CreationStep::OwnerId;
                self.supervisor.sessions().set(user, session);
                ctx.reply("Step 2/3 — send the numeric owner id.").await?;
            }
            CreationStep::OwnerId => {
                let owner = match validate_owner_id(text) {
                    Ok(owner) => owner,
                    Err(e) => {
                        ctx.reply(&format!("{e}. Send the owner id again.")).await?;
                        return Ok(true);
                    }
                };
                session.owner_id = Some(owner);
                session.step = CreationStep::DisplayName;
                self.supervisor.sessions().set(user, session);
                ctx.reply("Step 3/3 — send a display name (3-50 characters).")
                    .await?;
            }
            CreationStep::DisplayName => {
                if let Err(e) = validate_display_name(text) {
                    ctx.reply(&format!("{e}. Send the name again.")).await?;
                    return Ok(true);
                }
                let (Some(bot_token), Some(owner_id)) =
                    (session.bot_token.clone(), session.owner_id)
                else {
                    // Session payload out of shape; restart the wizard.
                    self.supervisor.sessions().clear(user);
                    ctx.reply("Creation state was lost, start again with Create.")
                        .await?;
                    return Ok(true);
                };

                self.supervisor.sessions().clear(user);
                match self
                    .supervisor
                    .create(NewTenant {
                        bot_token,
                        owner_id,
                        display_name: text.to_string(),
                        created_by: user,
                    })
                    .await
                {
                    Ok((tenant, started)) => {
                        let suffix = if started {
                            "and started"
                        } else {
                            "but it failed to start"
                        };
                        ctx.reply(&format!(
                            "Tenant {} (\"{}\") created {suffix}.",
                            tenant.id, tenant.display_name
                        ))
                        .await?;
                    }
                    Err(e) => {
                        ctx.reply(&format!("Creation failed: {e}")).await?;
                    }
                }
            }
        }
        Ok(true)
    }
}

fn action(id: &str) -> String {
    format!("{NAMESPACE}_{id}")
}

fn target(id: &str, tenant: &TenantId) -> String {
    format!("{NAMESPACE}_{id}_{tenant}")
}

fn tally_text(verb: &str, tally: Tally) -> String {
    format!("{verb} {} tenants, {} failed.", tally.ok, tally.failed)
}

fn manage_text(tenant: &Tenant, status: &str) -> String {
    let last_activity = tenant
        .stats
        .last_activity
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "never".to_string());
    format!(
        "Tenant {} (\"{}\")\nstatus: {status}\nowner: {}\ncreated: {} by {}\ncommands served: {}\nusers seen: {}\nlast activity: {}",
        tenant.id,
        tenant.display_name,
        tenant.owner_id,
        tenant.created_at.format("%Y-%m-%d"),
        tenant.created_by,
        tenant.stats.total_commands,
        tenant.stats.users.len(),
        last_activity,
    )
}
