//! The controller bot process.
//!
//! Assembles the dispatch engine with the built-in commands plus the
//! `tenants` admin command, publishes the command vocabulary, auto-starts
//! every registered tenant after a short delay, and forwards abnormal
//! tenant exits to the admin who created them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use roost_dispatch::{Command, CommandEvent, DispatchEngine};
use roost_registry::{RegistryHandle, TenantStore};
use roost_supervisor::{
    self_spawn_command, start_session_sweep, TenantEvent, TenantSupervisor, TenantsCommand,
};
use roost_telegram::poller::poll_loop;
use roost_telegram::TelegramApi;
use roost_types::{DataPaths, UserId};

use crate::builtins::{GuessCommand, HelpCommand, MenuCommand};

const AUTOSTART_DELAY: Duration = Duration::from_secs(5);
const POLL_TIMEOUT_SECS: u64 = 30;

pub async fn run(data_dir: PathBuf, token: String, admin: UserId) -> anyhow::Result<()> {
    let paths = DataPaths::new(data_dir);
    let store = TenantStore::load(paths.registry_file()).context("load tenant registry")?;
    let (registry, _registry_task) = RegistryHandle::spawn(store);

    let (supervisor, tenant_events) =
        TenantSupervisor::new(paths, registry.clone(), self_spawn_command());
    start_session_sweep(Arc::clone(&supervisor));

    let api = Arc::new(TelegramApi::new(&token));

    let mut engine = DispatchEngine::new();
    let help = HelpCommand::new();
    engine.register_command(Arc::clone(&help) as Arc<dyn Command>);
    engine.register_command(Arc::new(MenuCommand));
    engine.register_command(Arc::new(GuessCommand::new()));
    engine.register_command(Arc::new(TenantsCommand::new(Arc::clone(&supervisor), admin)));
    help.set_entries(engine.bot_commands());

    if let Err(e) = api.set_my_commands(&engine.bot_commands()).await {
        warn!(error = %e, "could not publish command vocabulary");
    }

    spawn_autostart(Arc::clone(&supervisor));
    spawn_crash_reporter(Arc::clone(&api), registry, tenant_events);

    info!(admin = %admin, "controller started");
    dispatch_loop(api, Arc::new(engine)).await;
    Ok(())
}

/// Start every registered tenant once the controller has settled.
fn spawn_autostart(supervisor: Arc<TenantSupervisor>) {
    tokio::spawn(async move {
        tokio::time::sleep(AUTOSTART_DELAY).await;
        match supervisor.start_all().await {
            Ok(tally) => info!(ok = tally.ok, failed = tally.failed, "tenant auto-start"),
            Err(e) => warn!(error = %e, "tenant auto-start failed"),
        }
    });
}

/// Tell the creating admin when a tenant process dies with a non-zero
/// status. Clean exits and supervisor-initiated stops stay quiet.
fn spawn_crash_reporter(
    api: Arc<TelegramApi>,
    registry: RegistryHandle,
    mut events: mpsc::Receiver<TenantEvent>,
) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let TenantEvent::Exited {
                id,
                code: Some(code),
            } = event
            else {
                continue;
            };
            if code == 0 {
                continue;
            }
            match registry.get(&id).await {
                Ok(Some(tenant)) => {
                    let text = format!("Tenant {id} exited unexpectedly with code {code}.");
                    if let Err(e) = api.send_message(tenant.created_by.0, &text, None).await {
                        warn!(tenant = %id, error = %e, "crash report delivery failed");
                    }
                }
                Ok(None) => warn!(tenant = %id, "exit event for unknown tenant"),
                Err(e) => warn!(tenant = %id, error = %e, "crash report lookup failed"),
            }
        }
    });
}

async fn dispatch_loop(api: Arc<TelegramApi>, engine: Arc<DispatchEngine>) {
    let (update_tx, mut update_rx) = mpsc::channel(64);
    let (_cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(poll_loop(
        Arc::clone(&api),
        POLL_TIMEOUT_SECS,
        update_tx,
        cancel_rx,
    ));

    while let Some(update) = update_rx.recv().await {
        if let Some(event) = CommandEvent::from_update(Arc::clone(&api), &update) {
            engine.dispatch(event).await;
        }
    }
}
