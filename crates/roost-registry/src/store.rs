//! The on-disk tenant store.
//!
//! Loads `tenants.json` into memory once and writes the whole map back on
//! every mutation. Writes go to a sibling temp file first and are renamed
//! into place, so a crash mid-write never leaves a truncated registry.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::info;

use roost_types::{RoostError, Tenant, TenantId, UserId};

/// Validated inputs for a new tenant entry.
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub bot_token: String,
    pub owner_id: UserId,
    pub display_name: String,
    pub created_by: UserId,
}

/// In-memory view of `tenants.json`, flushed on every mutation.
///
/// Keyed by tenant id; `BTreeMap` keeps the serialized file stable across
/// rewrites. Intended to be owned exclusively by the registry actor.
pub struct TenantStore {
    path: PathBuf,
    tenants: BTreeMap<TenantId, Tenant>,
}

impl TenantStore {
    /// Load the registry from `path`. A missing file is an empty registry.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RoostError> {
        let path = path.as_ref().to_path_buf();
        let tenants = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                RoostError::RegistryError(format!("parse {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(RoostError::RegistryError(format!(
                    "read {}: {e}",
                    path.display()
                )))
            }
        };
        Ok(Self { path, tenants })
    }

    /// Allocate an id and persist a new tenant with default permissions and
    /// zeroed stats.
    ///
    /// Ids are the creation-time millisecond timestamp; on collision the
    /// allocator bumps by one until the id is unused, so rapid consecutive
    /// creations still get unique, ordered ids.
    pub fn create(&mut self, input: NewTenant) -> Result<Tenant, RoostError> {
        let mut millis = Utc::now().timestamp_millis();
        while self.tenants.contains_key(TenantId::from_millis(millis).as_str()) {
            millis += 1;
        }
        let id = TenantId::from_millis(millis);

        let tenant = Tenant::new(
            id.clone(),
            input.bot_token,
            input.owner_id,
            input.display_name,
            input.created_by,
        );
        self.tenants.insert(id.clone(), tenant.clone());
        self.persist()?;
        info!(tenant = %id, owner = %tenant.owner_id, "tenant created");
        Ok(tenant)
    }

    pub fn get(&self, id: &TenantId) -> Option<&Tenant> {
        self.tenants.get(id.as_str())
    }

    /// All tenants, oldest first (ids are timestamp-ordered).
    pub fn list(&self) -> Vec<Tenant> {
        self.tenants.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }

    /// Record one served command: bump the counter, stamp the activity time,
    /// and remember the user if not seen before.
    pub fn record_activity(&mut self, id: &TenantId, user: UserId) -> Result<(), RoostError> {
        let tenant = self.get_mut(id)?;
        tenant.stats.total_commands += 1;
        tenant.stats.last_activity = Some(Utc::now());
        if !tenant.stats.users.contains(&user) {
            tenant.stats.users.push(user);
        }
        self.persist()
    }

    /// Accrue seconds of process lifetime, stamped when a run ends.
    pub fn add_uptime(&mut self, id: &TenantId, secs: u64) -> Result<(), RoostError> {
        let tenant = self.get_mut(id)?;
        tenant.stats.uptime_secs += secs;
        self.persist()
    }

    /// Zero a tenant's usage stats (the reset admin action).
    pub fn zero_stats(&mut self, id: &TenantId) -> Result<(), RoostError> {
        let tenant = self.get_mut(id)?;
        tenant.stats = Default::default();
        self.persist()
    }

    /// Remove a tenant entry. Returns the removed record, if any.
    pub fn remove(&mut self, id: &TenantId) -> Result<Option<Tenant>, RoostError> {
        let removed = self.tenants.remove(id.as_str());
        if removed.is_some() {
            self.persist()?;
            info!(tenant = %id, "tenant removed from registry");
        }
        Ok(removed)
    }

    fn get_mut(&mut self, id: &TenantId) -> Result<&mut Tenant, RoostError> {
        self.tenants
            .get_mut(id.as_str())
            .ok_or_else(|| RoostError::RegistryError(format!("unknown tenant {id}")))
    }

    /// Write the whole map via temp file + rename.
    fn persist(&self) -> Result<(), RoostError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                RoostError::RegistryError(format!("create {}: {e}", parent.display()))
            })?;
        }
        let raw = serde_json::to_string_pretty(&self.tenants)
            .map_err(|e| RoostError::RegistryError(format!("serialize registry: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw)
            .map_err(|e| RoostError::RegistryError(format!("write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            RoostError::RegistryError(format!("rename into {}: {e}", self.path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_input() -> NewTenant {
        NewTenant {
            bot_token: "1234567890:AABBCCDDeeFFggHHiiJJKKllMMnnOOppQQR".into(),
            owner_id: UserId(7),
            display_name: "Sample".into(),
            created_by: UserId(1),
        }
    }

    #[test]
    fn create_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tenants.json");

        let id = {
            let mut store = TenantStore::load(&path).unwrap();
            assert!(store.is_empty());
            store.create(sample_input()).unwrap().id
        };

        let store = TenantStore::load(&path).unwrap();
        assert_eq!(store.len(), 1);
        let tenant = store.get(&id).unwrap();
        assert_eq!(tenant.owner_id, UserId(7));
        assert_eq!(tenant.stats.total_commands, 0);
        assert_eq!(tenant.permissions.rate_limit_per_minute, 30);
    }

    #[test]
    fn consecutive_creations_get_distinct_ids() {
        let dir = TempDir::new().unwrap();
        let mut store = TenantStore::load(dir.path().join("tenants.json")).unwrap();

        let a = store.create(sample_input()).unwrap().id;
        let b = store.create(sample_input()).unwrap().id;
        let c = store.create(sample_input()).unwrap().id;
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn record_activity_tracks_distinct_users() {
        let dir = TempDir::new().unwrap();
        let mut store = TenantStore::load(dir.path().join("tenants.json")).unwrap();
        let id = store.create(sample_input()).unwrap().id;

        store.record_activity(&id, UserId(10)).unwrap();
        store.record_activity(&id, UserId(10)).unwrap();
        store.record_activity(&id, UserId(11)).unwrap();

        let stats = &store.get(&id).unwrap().stats;
        assert_eq!(stats.total_commands, 3);
        assert_eq!(stats.users, vec![UserId(10), UserId(11)]);
        assert!(stats.last_activity.is_some());
    }

    #[test]
    fn uptime_accrues_across_runs() {
        let dir = TempDir::new().unwrap();
        let mut store = TenantStore::load(dir.path().join("tenants.json")).unwrap();
        let id = store.create(sample_input()).unwrap().id;

        store.add_uptime(&id, 5).unwrap();
        store.add_uptime(&id, 7).unwrap();
        assert_eq!(store.get(&id).unwrap().stats.uptime_secs, 12);
    }

    #[test]
    fn zero_stats_resets_everything() {
        let dir = TempDir::new().unwrap();
        let mut store = TenantStore::load(dir.path().join("tenants.json")).unwrap();
        let id = store.create(sample_input()).unwrap().id;
        store.record_activity(&id, UserId(10)).unwrap();
        store.add_uptime(&id, 9).unwrap();

        store.zero_stats(&id).unwrap();
        let stats = &store.get(&id).unwrap().stats;
        assert_eq!(stats.total_commands, 0);
        assert!(stats.users.is_empty());
        assert!(stats.last_activity.is_none());
        assert_eq!(stats.uptime_secs, 0);
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut store = TenantStore::load(dir.path().join("tenants.json")).unwrap();
        let id = store.create(sample_input()).unwrap().id;

        assert!(store.remove(&id).unwrap().is_some());
        assert!(store.remove(&id).unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn unknown_tenant_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut store = TenantStore::load(dir.path().join("tenants.json")).unwrap();
        let err = store
            .record_activity(&TenantId::new("123"), UserId(1))
            .unwrap_err();
        assert!(err.to_string().contains("unknown tenant"));
    }
}
