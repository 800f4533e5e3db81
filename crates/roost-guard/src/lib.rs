//! Tenant security and rate-limit policy.
//!
//! Every command-class event inside a tenant bot passes through the
//! [`SecurityGate`] before it reaches the dispatch engine: unconfigured
//! tenants reject all traffic, blocklisted commands are refused and
//! audited, and a per-user fixed-window quota caps the rest. Events that
//! pass update the tenant's usage stats best-effort.

pub mod policy;
pub mod rate_limit;

pub use policy::{SecurityGate, TenantGateConfig};
pub use rate_limit::{RateDecision, RateLimiter};
