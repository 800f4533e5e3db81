//! On-disk layout and the per-tenant runtime config artifact.
//!
//! The controller owns a single data root. Everything a tenant process needs
//! is written under it before spawn: the shared registry file, the tenant's
//! isolated data directory, and a [`TenantRuntimeConfig`] artifact the
//! spawned process loads using only the tenant id it receives on argv.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::RoostError;
use crate::ids::{TenantId, UserId};

/// Filename of the persisted tenant registry under the data root.
pub const REGISTRY_FILENAME: &str = "tenants.json";

/// Filename of the append-only security audit log under `logs/`.
pub const AUDIT_LOG_FILENAME: &str = "security.ndjson";

/// Resolved paths under the controller's data root.
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The shared persisted tenant registry file.
    pub fn registry_file(&self) -> PathBuf {
        self.root.join(REGISTRY_FILENAME)
    }

    /// A tenant's isolated data directory.
    pub fn tenant_data_dir(&self, id: &TenantId) -> PathBuf {
        self.root.join("tenant_data").join(id.as_str())
    }

    /// A tenant's runtime config artifact.
    pub fn tenant_config_file(&self, id: &TenantId) -> PathBuf {
        self.root
            .join("tenant_configs")
            .join(format!("{}.json", id.as_str()))
    }

    /// The append-only security audit log.
    pub fn audit_log_file(&self) -> PathBuf {
        self.root.join("logs").join(AUDIT_LOG_FILENAME)
    }
}

/// The isolated configuration artifact written for each tenant before its
/// process is spawned. The tenant process receives only its id on the
/// command line and loads the rest from this file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantRuntimeConfig {
    pub tenant_id: TenantId,
    pub bot_token: String,
    pub owner_id: UserId,
    /// Controller admin who created the tenant; abnormal exits are reported
    /// to this user when the controller is configured to do so.
    pub created_by: UserId,
    /// The tenant's isolated data directory.
    pub data_dir: PathBuf,
}

impl TenantRuntimeConfig {
    /// Load the artifact for `id` from under `paths`.
    ///
    /// A missing artifact means the tenant is not configured; the security
    /// gate rejects all traffic in that state.
    pub fn load(paths: &DataPaths, id: &TenantId) -> Result<Self, RoostError> {
        let path = paths.tenant_config_file(id);
        let raw = fs::read_to_string(&path).map_err(|e| {
            RoostError::ConfigError(format!("read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| RoostError::ConfigError(format!("parse {}: {e}", path.display())))
    }

    /// Write the artifact under `paths`, creating parent directories.
    pub fn save(&self, paths: &DataPaths) -> Result<(), RoostError> {
        let path = paths.tenant_config_file(&self.tenant_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| RoostError::ConfigError(format!("create {}: {e}", parent.display())))?;
        }
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| RoostError::ConfigError(format!("serialize tenant config: {e}")))?;
        fs::write(&path, raw)
            .map_err(|e| RoostError::ConfigError(format!("write {}: {e}", path.display())))
    }

    /// Remove the artifact. Missing files are not an error.
    pub fn remove(paths: &DataPaths, id: &TenantId) -> Result<(), RoostError> {
        let path = paths.tenant_config_file(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RoostError::ConfigError(format!(
                "remove {}: {e}",
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_rooted() {
        let paths = DataPaths::new("/var/lib/roost");
        let id = TenantId::new("1700000000123");
        assert_eq!(
            paths.registry_file(),
            PathBuf::from("/var/lib/roost/tenants.json")
        );
        assert_eq!(
            paths.tenant_data_dir(&id),
            PathBuf::from("/var/lib/roost/tenant_data/1700000000123")
        );
        assert_eq!(
            paths.tenant_config_file(&id),
            PathBuf::from("/var/lib/roost/tenant_configs/1700000000123.json")
        );
    }

    #[test]
    fn runtime_config_save_load_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(tmp.path());
        let id = TenantId::new("1700000000123");

        let cfg = TenantRuntimeConfig {
            tenant_id: id.clone(),
            bot_token: "1234567890:AABBCCDDeeFFggHHiiJJKKllMMnnOOppQQR".into(),
            owner_id: UserId(7),
            created_by: UserId(1),
            data_dir: paths.tenant_data_dir(&id),
        };
        cfg.save(&paths).unwrap();

        let loaded = TenantRuntimeConfig::load(&paths, &id).unwrap();
        assert_eq!(loaded.tenant_id, id);
        assert_eq!(loaded.owner_id, UserId(7));

        TenantRuntimeConfig::remove(&paths, &id).unwrap();
        assert!(TenantRuntimeConfig::load(&paths, &id).is_err());
        // Removing twice is fine.
        TenantRuntimeConfig::remove(&paths, &id).unwrap();
    }
}
