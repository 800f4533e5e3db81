//! The tenant security gate.
//!
//! Runs before dispatch for every command-class event a tenant bot
//! receives. Order matters: configuration presence, then the blocklist
//! (refused commands are audited and never counted in stats), then the
//! rate limiter, and only then the best-effort stats update.

use std::collections::HashSet;
use std::sync::Mutex;

use tracing::{info, warn};

use roost_audit::{SecurityLog, SecurityRecord};
use roost_dispatch::EventCtx;
use roost_registry::RegistryHandle;
use roost_types::{TenantId, TenantPermissions, DANGEROUS_COMMANDS};

use crate::rate_limit::{RateDecision, RateLimiter};

const NOT_CONFIGURED_REPLY: &str = "This bot is not configured. Contact the administrator.";

/// Resolved policy for one tenant's gate.
#[derive(Debug, Clone)]
pub struct TenantGateConfig {
    pub tenant_id: TenantId,
    pub rate_limit_per_minute: u32,
    blocked: HashSet<String>,
}

impl TenantGateConfig {
    /// Build the gate policy from the tenant's registry permissions.
    ///
    /// The dangerous set is always blocked, whatever the tenant's own
    /// blocked list says; `permissions` can only add to it.
    pub fn new(tenant_id: TenantId, permissions: &TenantPermissions) -> Self {
        let mut blocked: HashSet<String> =
            DANGEROUS_COMMANDS.iter().map(|s| s.to_string()).collect();
        blocked.extend(permissions.blocked_commands.iter().cloned());
        Self {
            tenant_id,
            rate_limit_per_minute: permissions.rate_limit_per_minute,
            blocked,
        }
    }

    pub fn is_blocked(&self, command: &str) -> bool {
        self.blocked.contains(command)
    }
}

/// Per-tenant policy enforcement wrapping the dispatch path.
pub struct SecurityGate {
    /// `None` when the tenant's runtime config could not be resolved; the
    /// gate then rejects all traffic.
    config: Option<TenantGateConfig>,
    limiter: RateLimiter,
    registry: RegistryHandle,
    audit: Mutex<SecurityLog>,
}

impl SecurityGate {
    pub fn new(
        config: Option<TenantGateConfig>,
        registry: RegistryHandle,
        audit: SecurityLog,
    ) -> Self {
        Self::with_limiter(config, registry, audit, RateLimiter::new())
    }

    /// Gate with a custom limiter (shorter windows in tests).
    pub fn with_limiter(
        config: Option<TenantGateConfig>,
        registry: RegistryHandle,
        audit: SecurityLog,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            config,
            limiter,
            registry,
            audit: Mutex::new(audit),
        }
    }

    /// Decide whether `command` from this event may proceed to dispatch.
    ///
    /// Replies to the user itself on refusal; reply failures are logged and
    /// otherwise ignored, policy outcomes never depend on the messaging
    /// platform being reachable.
    pub async fn allow_command(&self, command: &str, ctx: &EventCtx) -> bool {
        let Some(cfg) = &self.config else {
            self.reply_best_effort(ctx, NOT_CONFIGURED_REPLY).await;
            return false;
        };

        if cfg.is_blocked(command) {
            info!(
                tenant = %cfg.tenant_id,
                command,
                user_id = ctx.user.id,
                "blocked command refused"
            );
            self.reply_best_effort(
                ctx,
                &format!("The /{command} command is not available on this bot."),
            )
            .await;
            self.append_audit(cfg, command, ctx);
            return false;
        }

        match self
            .limiter
            .check(&cfg.tenant_id, ctx.user_id(), cfg.rate_limit_per_minute)
        {
            RateDecision::Limited { retry_after_secs } => {
                self.reply_best_effort(
                    ctx,
                    &format!("Rate limit exceeded. Try again in {retry_after_secs} seconds."),
                )
                .await;
                false
            }
            RateDecision::Allowed => {
                // Best-effort by contract: a registry failure is logged by
                // the actor and never aborts the command.
                self.registry
                    .record_activity(&cfg.tenant_id, ctx.user_id())
                    .await;
                true
            }
        }
    }

    fn append_audit(&self, cfg: &TenantGateConfig, command: &str, ctx: &EventCtx) {
        let record = SecurityRecord::new(
            cfg.tenant_id.clone(),
            ctx.user_id(),
            ctx.user_label(),
            command,
            ctx.chat.id,
            ctx.chat.chat_type.as_deref().unwrap_or("private"),
        );
        let mut log = match self.audit.lock() {
            Ok(log) => log,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = log.append(&record) {
            warn!(tenant = %cfg.tenant_id, error = %e, "audit append failed");
        }
    }

    async fn reply_best_effort(&self, ctx: &EventCtx, text: &str) {
        if let Err(e) = ctx.reply(text).await {
            warn!(error = %e, "policy reply failed");
        }
    }
}
