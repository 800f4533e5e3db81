//! Core types shared across all roost crates.
//!
//! Defines tenant records, identifiers, the per-tenant runtime config
//! artifact, and error types used by the dispatch engine, security gate,
//! registry, and supervisor.

pub mod config;
pub mod error;
pub mod ids;
pub mod tenant;

pub use config::{DataPaths, TenantRuntimeConfig};
pub use error::RoostError;
pub use ids::{TenantId, UserId};
pub use tenant::{
    validate_bot_token, validate_display_name, validate_owner, validate_owner_id, Tenant,
    TenantPermissions, TenantStats, DANGEROUS_COMMANDS, OWNER_ADMIN_COMMANDS,
};
