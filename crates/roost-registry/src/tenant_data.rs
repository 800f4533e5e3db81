//! Per-tenant isolated data directory.
//!
//! Each tenant owns a directory holding its record files: the owners list
//! (seeded with the tenant owner), the premium-user list, the warn-count
//! map, and the bot-info record. Materialization is idempotent: only files
//! that are missing are created, so a restart never clobbers tenant data.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use roost_types::{RoostError, UserId};

pub const OWNERS_FILE: &str = "owners.json";
pub const PREMIUMS_FILE: &str = "premiums.json";
pub const WARNS_FILE: &str = "warns.json";
pub const BOTINFO_FILE: &str = "botinfo.json";

/// The tenant bot's display identity, editable by its owner at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotInfo {
    pub bot_name: String,
    pub owner_name: String,
}

/// Point-in-time view of a tenant's record files, for the admin data view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSnapshot {
    pub owners: Vec<UserId>,
    pub premiums: Vec<UserId>,
    pub warns: BTreeMap<String, u32>,
    pub botinfo: BotInfo,
}

/// Create the tenant's data directory and any missing default files.
///
/// Existing files are left untouched.
pub fn materialize(dir: &Path, owner_id: UserId, display_name: &str) -> Result<(), RoostError> {
    fs::create_dir_all(dir)
        .map_err(|e| RoostError::RegistryError(format!("create {}: {e}", dir.display())))?;

    write_if_missing(&dir.join(OWNERS_FILE), &vec![owner_id])?;
    write_if_missing(&dir.join(PREMIUMS_FILE), &Vec::<UserId>::new())?;
    write_if_missing(&dir.join(WARNS_FILE), &BTreeMap::<String, u32>::new())?;
    write_if_missing(
        &dir.join(BOTINFO_FILE),
        &BotInfo {
            bot_name: display_name.to_string(),
            owner_name: String::new(),
        },
    )?;

    debug!(dir = %dir.display(), "tenant data directory materialized");
    Ok(())
}

/// Delete the data directory and recreate it with default files (the reset
/// admin action). A missing directory is fine.
pub fn reset(dir: &Path, owner_id: UserId, display_name: &str) -> Result<(), RoostError> {
    remove(dir)?;
    materialize(dir, owner_id, display_name)
}

/// Delete the data directory entirely (the delete admin action).
pub fn remove(dir: &Path) -> Result<(), RoostError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(RoostError::RegistryError(format!(
            "remove {}: {e}",
            dir.display()
        ))),
    }
}

/// Read every record file for the admin data view.
pub fn snapshot(dir: &Path) -> Result<DataSnapshot, RoostError> {
    Ok(DataSnapshot {
        owners: read_file(&dir.join(OWNERS_FILE))?,
        premiums: read_file(&dir.join(PREMIUMS_FILE))?,
        warns: read_file(&dir.join(WARNS_FILE))?,
        botinfo: read_file(&dir.join(BOTINFO_FILE))?,
    })
}

fn write_if_missing<T: Serialize>(path: &Path, value: &T) -> Result<(), RoostError> {
    if path.exists() {
        return Ok(());
    }
    let raw = serde_json::to_string_pretty(value)
        .map_err(|e| RoostError::RegistryError(format!("serialize {}: {e}", path.display())))?;
    fs::write(path, raw)
        .map_err(|e| RoostError::RegistryError(format!("write {}: {e}", path.display())))
}

fn read_file<T: DeserializeOwned>(path: &Path) -> Result<T, RoostError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| RoostError::RegistryError(format!("read {}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| RoostError::RegistryError(format!("parse {}: {e}", path.display())))
}
