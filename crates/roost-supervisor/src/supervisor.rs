//! Tenant lifecycle operations and creation-wizard state.
//!
//! [`TenantSupervisor`] owns the map of live [`TenantProcess`] handles and
//! applies the lifecycle operations against the registry and the on-disk
//! tenant layout. At most one live process per tenant id: `start` refuses
//! when a handle already exists, and the exit-routing task removes the
//! handle as soon as the process is gone.
//!
//! The 3-step creation wizard's sessions live here too, so the periodic
//! sweep and the admin command share one store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use roost_dispatch::SessionStore;
use roost_registry::{tenant_data, NewTenant, RegistryHandle};
use roost_types::{
    validate_bot_token, validate_display_name, validate_owner, DataPaths, RoostError, Tenant,
    TenantId, TenantRuntimeConfig, UserId,
};

use crate::process::{ProcessExit, TenantEvent, TenantProcess};

/// Creation sessions older than this are swept, whatever step they are on.
pub const SESSION_TTL: Duration = Duration::from_secs(30 * 60);

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Which input the creation wizard expects next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationStep {
    Token,
    OwnerId,
    DisplayName,
}

/// In-progress tenant creation, one per admin user.
#[derive(Debug, Clone)]
pub struct CreationSession {
    /// Correlates wizard log lines across steps.
    pub id: Uuid,
    pub step: CreationStep,
    pub bot_token: Option<String>,
    pub owner_id: Option<UserId>,
    pub started_at: DateTime<Utc>,
}

impl CreationSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            step: CreationStep::Token,
            bot_token: None,
            owner_id: None,
            started_at: Utc::now(),
        }
    }
}

impl Default for CreationSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a toggle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Started,
    Stopped,
}

/// Success/failure counts for a bulk operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub ok: usize,
    pub failed: usize,
}

/// Builds the spawn command for a tenant id. Injected so tests can spawn a
/// placeholder process instead of the real binary.
pub type SpawnFn = Box<dyn Fn(&TenantId) -> Command + Send + Sync>;

/// Spawn the controller's own binary as `<exe> tenant <id>`.
pub fn self_spawn_command() -> SpawnFn {
    Box::new(|id| {
        let mut cmd = match std::env::current_exe() {
            Ok(exe) => Command::new(exe),
            Err(_) => Command::new("roost"),
        };
        cmd.arg("tenant").arg(id.as_str());
        cmd
    })
}

/// Owns live tenant processes and applies lifecycle operations.
pub struct TenantSupervisor {
    paths: DataPaths,
    registry: RegistryHandle,
    spawn_command: SpawnFn,
    processes: Arc<Mutex<HashMap<TenantId, TenantProcess>>>,
    /// Every spawned process reports its exit here; a routing task drops
    /// the matching handle and forwards the event outward.
    exit_tx: mpsc::Sender<ProcessExit>,
    events_tx: mpsc::Sender<TenantEvent>,
    /// Spawn token source. A stop-then-start replaces the handle under the
    /// same tenant id; the generation tells the old exit from the new one.
    generations: AtomicU64,
    wizard: SessionStore<CreationSession>,
}

impl TenantSupervisor {
    /// Build the supervisor and its outward event stream. The returned
    /// receiver yields [`TenantEvent`]s; dropping it only discards events.
    pub fn new(
        paths: DataPaths,
        registry: RegistryHandle,
        spawn_command: SpawnFn,
    ) -> (Arc<Self>, mpsc::Receiver<TenantEvent>) {
        let (exit_tx, mut exit_rx) = mpsc::channel::<ProcessExit>(EVENT_CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let processes: Arc<Mutex<HashMap<TenantId, TenantProcess>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let routing_processes = Arc::clone(&processes);
        let routing_registry = registry.clone();
        let routing_events = events_tx.clone();
        tokio::spawn(async move {
            while let Some(exit) = exit_rx.recv().await {
                {
                    let mut processes = routing_processes.lock().unwrap();
                    // A replaced process's late exit must not evict the
                    // live handle; only the matching generation does.
                    if processes
                        .get(&exit.id)
                        .is_some_and(|live| live.generation() == exit.generation)
                    {
                        processes.remove(&exit.id);
                    }
                }
                routing_registry
                    .record_uptime(&exit.id, exit.uptime_secs)
                    .await;
                let _ = routing_events.try_send(TenantEvent::Exited {
                    id: exit.id,
                    code: exit.code,
                });
            }
        });

        let supervisor = Arc::new(Self {
            paths,
            registry,
            spawn_command,
            processes,
            exit_tx,
            events_tx,
            generations: AtomicU64::new(0),
            wizard: SessionStore::new(),
        });
        (supervisor, events_rx)
    }

    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }

    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    /// The creation-wizard sessions, keyed by admin user.
    pub fn sessions(&self) -> &SessionStore<CreationSession> {
        &self.wizard
    }

    pub fn is_running(&self, id: &TenantId) -> bool {
        self.processes.lock().unwrap().contains_key(id)
    }

    pub fn running(&self) -> Vec<TenantId> {
        self.processes.lock().unwrap().keys().cloned().collect()
    }

    /// Validate creation inputs, persist the tenant, then attempt to start
    /// it. Returns the tenant and whether the start succeeded; the two steps
    /// are separable by contract, so a failed start leaves a valid entry the
    /// operator can start later.
    pub async fn create(&self, input: NewTenant) -> Result<(Tenant, bool), RoostError> {
        validate_bot_token(&input.bot_token)?;
        validate_owner(input.owner_id)?;
        validate_display_name(&input.display_name)?;

        let tenant = self.registry.create(input).await?;
        let started = match self.start(&tenant.id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(tenant = %tenant.id, error = %e, "created but failed to start");
                false
            }
        };
        Ok((tenant, started))
    }

    /// Materialize the tenant's layout and spawn its process.
    ///
    /// Fails when the tenant is unknown or already running.
    pub async fn start(&self, id: &TenantId) -> Result<(), RoostError> {
        if self.is_running(id) {
            return Err(RoostError::SupervisorError(format!(
                "tenant {id} is already running"
            )));
        }

        let tenant = self
            .registry
            .get(id)
            .await?
            .ok_or_else(|| RoostError::SupervisorError(format!("unknown tenant {id}")))?;

        let data_dir = self.paths.tenant_data_dir(id);
        tenant_data::materialize(&data_dir, tenant.owner_id, &tenant.display_name)?;
        TenantRuntimeConfig {
            tenant_id: id.clone(),
            bot_token: tenant.bot_token.clone(),
            owner_id: tenant.owner_id,
            created_by: tenant.created_by,
            data_dir,
        }
        .save(&self.paths)?;

        let command = (self.spawn_command)(id);
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let process =
            TenantProcess::spawn(id.clone(), generation, command, self.exit_tx.clone())?;

        {
            let mut processes = self.processes.lock().unwrap();
            if processes.contains_key(id) {
                // Lost a start race; keep the incumbent.
                process.stop();
                return Err(RoostError::SupervisorError(format!(
                    "tenant {id} is already running"
                )));
            }
            processes.insert(id.clone(), process);
        }

        info!(tenant = %id, "tenant started");
        let _ = self.events_tx.try_send(TenantEvent::Started { id: id.clone() });
        Ok(())
    }

    /// Kill the tenant's process. Returns whether one was running.
    pub fn stop(&self, id: &TenantId) -> bool {
        let removed = self.processes.lock().unwrap().remove(id);
        match removed {
            Some(process) => {
                process.stop();
                info!(tenant = %id, "tenant stopped");
                true
            }
            None => false,
        }
    }

    pub async fn toggle(&self, id: &TenantId) -> Result<ToggleOutcome, RoostError> {
        if self.is_running(id) {
            self.stop(id);
            Ok(ToggleOutcome::Stopped)
        } else {
            self.start(id).await?;
            Ok(ToggleOutcome::Started)
        }
    }

    /// Stop then start. The two steps are not atomic; a concurrent start
    /// can win the gap and make this fail with "already running".
    pub async fn restart(&self, id: &TenantId) -> Result<(), RoostError> {
        self.stop(id);
        self.start(id).await
    }

    /// Stop, wipe the data directory back to defaults, zero stats, start.
    pub async fn reset(&self, id: &TenantId) -> Result<(), RoostError> {
        self.stop(id);
        let tenant = self
            .registry
            .get(id)
            .await?
            .ok_or_else(|| RoostError::SupervisorError(format!("unknown tenant {id}")))?;

        tenant_data::reset(
            &self.paths.tenant_data_dir(id),
            tenant.owner_id,
            &tenant.display_name,
        )?;
        self.registry.zero_stats(id).await?;
        self.start(id).await
    }

    /// Stop, delete the data directory and config artifact, remove the
    /// registry entry.
    pub async fn delete(&self, id: &TenantId) -> Result<(), RoostError> {
        self.stop(id);
        tenant_data::remove(&self.paths.tenant_data_dir(id))?;
        TenantRuntimeConfig::remove(&self.paths, id)?;
        self.registry
            .remove(id)
            .await?
            .ok_or_else(|| RoostError::SupervisorError(format!("unknown tenant {id}")))?;
        info!(tenant = %id, "tenant deleted");
        Ok(())
    }

    /// Start every registry entry, tallying failures (including "already
    /// running"). Used at controller startup and by the admin bulk action.
    pub async fn start_all(&self) -> Result<Tally, RoostError> {
        let mut tally = Tally::default();
        for tenant in self.registry.list().await? {
            match self.start(&tenant.id).await {
                Ok(()) => tally.ok += 1,
                Err(e) => {
                    warn!(tenant = %tenant.id, error = %e, "bulk start failed");
                    tally.failed += 1;
                }
            }
        }
        Ok(tally)
    }

    /// Stop every registry entry; entries with no live process count as
    /// failures in the tally.
    pub async fn stop_all(&self) -> Result<Tally, RoostError> {
        let mut tally = Tally::default();
        for tenant in self.registry.list().await? {
            if self.stop(&tenant.id) {
                tally.ok += 1;
            } else {
                tally.failed += 1;
            }
        }
        Ok(tally)
    }

    /// Drop creation sessions older than `ttl`. Returns how many were
    /// removed.
    pub fn sweep_expired(&self, ttl: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::minutes(30));
        self.wizard.retain(|_, session| session.started_at > cutoff)
    }
}

/// Periodic wizard-session sweep, at the TTL interval.
pub fn start_session_sweep(supervisor: Arc<TenantSupervisor>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_TTL);
        loop {
            ticker.tick().await;
            let removed = supervisor.sweep_expired(SESSION_TTL);
            if removed > 0 {
                info!(removed, "expired creation sessions swept");
            }
        }
    })
}
