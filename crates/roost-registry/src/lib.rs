//! Persisted tenant registry.
//!
//! The registry is one JSON file (`tenants.json`) mapping tenant id to
//! [`roost_types::Tenant`]. All mutation goes through a single-writer actor
//! task ([`RegistryHandle`]) that owns the [`TenantStore`] exclusively, so
//! two concurrent administrative operations within one process can never
//! lose each other's update. Tenant processes sharing the file from outside
//! this process are a documented limitation, not handled here.
//!
//! [`tenant_data`] materializes a tenant's isolated data directory with its
//! default record files.

pub mod actor;
pub mod store;
pub mod tenant_data;

pub use actor::RegistryHandle;
pub use store::{NewTenant, TenantStore};
