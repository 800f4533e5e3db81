//! Tenant supervisor.
//!
//! Manages the OS-level lifecycle of tenant bot processes: spawn with
//! output forwarding and exit notification ([`process`]), the lifecycle
//! operations and creation wizard state ([`supervisor`]), and the
//! operator-facing `tenants` command ([`admin`]).

pub mod admin;
pub mod process;
pub mod supervisor;

pub use admin::TenantsCommand;
pub use process::{ProcessExit, TenantEvent, TenantProcess};
pub use supervisor::{
    self_spawn_command, start_session_sweep, CreationSession, CreationStep, SpawnFn, Tally,
    TenantSupervisor, ToggleOutcome, SESSION_TTL,
};
