//! Single-writer registry actor.
//!
//! A dedicated tokio task owns the [`TenantStore`] exclusively, so no mutex
//! guards the registry file and concurrent administrative operations within
//! this process are serialized instead of racing a read-modify-write.
//!
//! Callers hold a cloneable [`RegistryHandle`]. Mutations that the caller
//! must observe use a oneshot reply channel; activity recording is
//! fire-and-forget because stats are best-effort by contract.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::warn;

use roost_types::{RoostError, Tenant, TenantId, UserId};

use crate::store::{NewTenant, TenantStore};

const CHANNEL_CAPACITY: usize = 256;

enum RegistryMsg {
    Create {
        input: NewTenant,
        reply: oneshot::Sender<Result<Tenant, RoostError>>,
    },
    Get {
        id: TenantId,
        reply: oneshot::Sender<Option<Tenant>>,
    },
    List {
        reply: oneshot::Sender<Vec<Tenant>>,
    },
    /// Fire-and-forget; failures are logged inside the actor.
    RecordActivity { id: TenantId, user: UserId },
    /// Fire-and-forget, like activity recording.
    RecordUptime { id: TenantId, secs: u64 },
    ZeroStats {
        id: TenantId,
        reply: oneshot::Sender<Result<(), RoostError>>,
    },
    Remove {
        id: TenantId,
        reply: oneshot::Sender<Result<Option<Tenant>, RoostError>>,
    },
}

/// Cloneable handle to the registry actor task.
#[derive(Clone)]
pub struct RegistryHandle {
    tx: mpsc::Sender<RegistryMsg>,
}

impl RegistryHandle {
    /// Spawn the actor task owning `store`. The task exits once every handle
    /// has been dropped and the queue drains.
    pub fn spawn(store: TenantStore) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let task = tokio::spawn(actor_loop(store, rx));
        (Self { tx }, task)
    }

    /// Allocate an id and persist a new tenant.
    pub async fn create(&self, input: NewTenant) -> Result<Tenant, RoostError> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryMsg::Create { input, reply }).await?;
        rx.await.map_err(closed)?
    }

    pub async fn get(&self, id: &TenantId) -> Result<Option<Tenant>, RoostError> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryMsg::Get {
            id: id.clone(),
            reply,
        })
        .await?;
        rx.await.map_err(closed)
    }

    pub async fn list(&self) -> Result<Vec<Tenant>, RoostError> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryMsg::List { reply }).await?;
        rx.await.map_err(closed)
    }

    /// Record one served command. Fire-and-forget: stats updates never block
    /// or fail the triggering command.
    pub async fn record_activity(&self, id: &TenantId, user: UserId) {
        let _ = self
            .tx
            .send(RegistryMsg::RecordActivity {
                id: id.clone(),
                user,
            })
            .await;
    }

    /// Accrue process lifetime seconds. Fire-and-forget: exit bookkeeping
    /// never blocks the supervisor's event routing.
    pub async fn record_uptime(&self, id: &TenantId, secs: u64) {
        let _ = self
            .tx
            .send(RegistryMsg::RecordUptime {
                id: id.clone(),
                secs,
            })
            .await;
    }

    pub async fn zero_stats(&self, id: &TenantId) -> Result<(), RoostError> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryMsg::ZeroStats {
            id: id.clone(),
            reply,
        })
        .await?;
        rx.await.map_err(closed)?
    }

    pub async fn remove(&self, id: &TenantId) -> Result<Option<Tenant>, RoostError> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryMsg::Remove {
            id: id.clone(),
            reply,
        })
        .await?;
        rx.await.map_err(closed)?
    }

    async fn send(&self, msg: RegistryMsg) -> Result<(), RoostError> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| RoostError::RegistryError("registry actor has shut down".into()))
    }
}

fn closed<E>(_: E) -> RoostError {
    RoostError::RegistryError("registry actor dropped the reply".into())
}

async fn actor_loop(mut store: TenantStore, mut rx: mpsc::Receiver<RegistryMsg>) {
    while let Some(msg) = rx.recv().await {
        match msg {
            RegistryMsg::Create { input, reply } => {
                let _ = reply.send(store.create(input));
            }
            RegistryMsg::Get { id, reply } => {
                let _ = reply.send(store.get(&id).cloned());
            }
            RegistryMsg::List { reply } => {
                let _ = reply.send(store.list());
            }
            RegistryMsg::RecordActivity { id, user } => {
                if let Err(e) = store.record_activity(&id, user) {
                    warn!(tenant = %id, error = %e, "stats update failed");
                }
            }
            RegistryMsg::RecordUptime { id, secs } => {
                if let Err(e) = store.add_uptime(&id, secs) {
                    warn!(tenant = %id, error = %e, "uptime update failed");
                }
            }
            RegistryMsg::ZeroStats { id, reply } => {
                let _ = reply.send(store.zero_stats(&id));
            }
            RegistryMsg::Remove { id, reply } => {
                let _ = reply.send(store.remove(&id));
            }
        }
    }
}
