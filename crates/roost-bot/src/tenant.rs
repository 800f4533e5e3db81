//! One tenant bot process.
//!
//! Spawned by the controller as `roost tenant <id>`. Loads the runtime
//! config artifact written before spawn, registers the restricted command
//! set (the dangerous vocabulary is skipped at registration, not merely
//! refused at runtime), and wraps every command-class event with the
//! security gate before the engine sees it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use roost_audit::SecurityLog;
use roost_dispatch::{Command, CommandEvent, DispatchEngine};
use roost_guard::{SecurityGate, TenantGateConfig};
use roost_registry::{RegistryHandle, TenantStore};
use roost_telegram::poller::poll_loop;
use roost_telegram::TelegramApi;
use roost_types::{DataPaths, TenantId, TenantRuntimeConfig, DANGEROUS_COMMANDS};

use crate::builtins::{GuessCommand, HelpCommand, MenuCommand, StartCommand};

const POLL_TIMEOUT_SECS: u64 = 30;

pub async fn run(data_dir: PathBuf, id: TenantId) -> anyhow::Result<()> {
    let paths = DataPaths::new(data_dir);
    let config = TenantRuntimeConfig::load(&paths, &id)
        .with_context(|| format!("tenant {id} has no runtime config"))?;

    let store = TenantStore::load(paths.registry_file()).context("load tenant registry")?;
    let (registry, _registry_task) = RegistryHandle::spawn(store);

    // Permissions come from the registry; a missing entry falls back to the
    // defaults so the gate still enforces the dangerous set.
    let permissions = registry
        .get(&id)
        .await?
        .map(|t| t.permissions)
        .unwrap_or_default();
    let gate = SecurityGate::new(
        Some(TenantGateConfig::new(id.clone(), &permissions)),
        registry,
        SecurityLog::open(paths.audit_log_file()).context("open security audit log")?,
    );

    let api = Arc::new(TelegramApi::new(&config.bot_token));

    let mut engine = DispatchEngine::new();
    let help = HelpCommand::new();
    let candidates: Vec<Arc<dyn Command>> = vec![
        Arc::clone(&help) as Arc<dyn Command>,
        Arc::new(StartCommand::new(config.data_dir.clone())),
        Arc::new(MenuCommand),
        Arc::new(GuessCommand::new()),
    ];
    for cmd in candidates {
        if DANGEROUS_COMMANDS.contains(&cmd.name()) {
            warn!(command = cmd.name(), "dangerous command not registered");
            continue;
        }
        engine.register_command(cmd);
    }
    help.set_entries(engine.bot_commands());

    if let Err(e) = api.set_my_commands(&engine.bot_commands()).await {
        warn!(error = %e, "could not publish command vocabulary");
    }

    info!(tenant = %id, owner = %config.owner_id, "tenant bot started");
    dispatch_loop(api, Arc::new(engine), gate).await;
    Ok(())
}

async fn dispatch_loop(api: Arc<TelegramApi>, engine: Arc<DispatchEngine>, gate: SecurityGate) {
    let (update_tx, mut update_rx) = mpsc::channel(64);
    let (_cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(poll_loop(
        Arc::clone(&api),
        POLL_TIMEOUT_SECS,
        update_tx,
        cancel_rx,
    ));

    while let Some(update) = update_rx.recv().await {
        let Some(event) = CommandEvent::from_update(Arc::clone(&api), &update) else {
            continue;
        };
        // The gate sees command-class events before the engine does.
        if let CommandEvent::Command { name, ctx } = &event {
            if !gate.allow_command(name, ctx).await {
                continue;
            }
        }
        engine.dispatch(event).await;
    }
}
