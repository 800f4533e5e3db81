//! Roost — multi-tenant Telegram bot controller.
//!
//! Facade crate re-exporting the workspace members:
//!
//! - [`types`]: ids, tenant records, validation, on-disk layout.
//! - [`telegram`]: the Bot API collaborator (client, wire types, poller).
//! - [`dispatch`]: the command dispatch engine and session stores.
//! - [`audit`]: the append-only security audit log.
//! - [`guard`]: the tenant security gate and rate limiter.
//! - [`registry`]: the persisted tenant registry and its actor.
//! - [`supervisor`]: tenant process lifecycle and the admin command.

pub use roost_audit as audit;
pub use roost_dispatch as dispatch;
pub use roost_guard as guard;
pub use roost_registry as registry;
pub use roost_supervisor as supervisor;
pub use roost_telegram as telegram;
pub use roost_types as types;
