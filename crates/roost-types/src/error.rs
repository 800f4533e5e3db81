//! Error types shared across all roost crates.

/// Errors that can occur across the roost runtime.
///
/// Each variant corresponds to a different subsystem: tenant registry,
/// process supervisor, security gate, audit log, or configuration.
#[derive(Debug, thiserror::Error)]
pub enum RoostError {
    #[error("registry error: {0}")]
    RegistryError(String),

    #[error("supervisor error: {0}")]
    SupervisorError(String),

    #[error("security gate error: {0}")]
    GuardError(String),

    #[error("audit log error: {0}")]
    AuditError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}
