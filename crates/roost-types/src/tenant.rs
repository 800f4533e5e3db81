//! Tenant registry record schema and creation-input validation.
//!
//! A [`Tenant`] is one persisted registry entry: credential, ownership,
//! permission policy, and usage stats. The supervisor creates entries, the
//! security gate mutates stats, admin actions reset or delete entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RoostError;
use crate::ids::{TenantId, UserId};

/// Commands that are never allowed inside a tenant bot, regardless of the
/// tenant's own policy. Blocking is enforced both at registration time (the
/// tenant entry point skips them) and per-event by the security gate.
pub const DANGEROUS_COMMANDS: &[&str] = &[
    "eval", "shell", "exec", "restart", "cmd", "backup", "viewlogs", "clearlog", "tenants",
];

/// Owner-administration commands a tenant owner keeps access to. Carried in
/// [`TenantPermissions::allowed_commands`] as registry metadata; their
/// handlers live with the tenant bot, not in this core.
pub const OWNER_ADMIN_COMMANDS: &[&str] = &[
    "addowner",
    "delowner",
    "addprem",
    "delprem",
    "setbotname",
    "setownername",
];

/// Default cap on distinct users a tenant may serve.
pub const DEFAULT_MAX_USERS: u32 = 1000;

/// Default per-user command quota per minute.
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 30;

const MIN_DISPLAY_NAME_LEN: usize = 3;
const MAX_DISPLAY_NAME_LEN: usize = 50;

/// One persisted tenant registry entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    /// Bot API credential for this tenant's bot.
    pub bot_token: String,
    /// User who owns the tenant bot (seeded into its owners list).
    pub owner_id: UserId,
    /// Display name shown by the tenant bot.
    pub display_name: String,
    /// Controller admin who created this tenant.
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub permissions: TenantPermissions,
    pub stats: TenantStats,
}

impl Tenant {
    /// Build a fresh tenant with default permissions and zeroed stats.
    pub fn new(
        id: TenantId,
        bot_token: String,
        owner_id: UserId,
        display_name: String,
        created_by: UserId,
    ) -> Self {
        Self {
            id,
            bot_token,
            owner_id,
            display_name,
            created_by,
            created_at: Utc::now(),
            permissions: TenantPermissions::default(),
            stats: TenantStats::default(),
        }
    }
}

/// Per-tenant permission policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantPermissions {
    /// Owner-admin commands the tenant owner may run.
    pub allowed_commands: Vec<String>,
    /// Commands rejected by the security gate.
    pub blocked_commands: Vec<String>,
    /// Cap on distinct users served.
    pub max_users: u32,
    /// Per-user fixed-window quota.
    pub rate_limit_per_minute: u32,
}

impl Default for TenantPermissions {
    fn default() -> Self {
        Self {
            allowed_commands: OWNER_ADMIN_COMMANDS.iter().map(|s| s.to_string()).collect(),
            blocked_commands: DANGEROUS_COMMANDS.iter().map(|s| s.to_string()).collect(),
            max_users: DEFAULT_MAX_USERS,
            rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
        }
    }
}

/// Usage statistics for one tenant. Updated best-effort by the security
/// gate; zeroed by the reset admin action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenantStats {
    pub total_commands: u64,
    pub last_activity: Option<DateTime<Utc>>,
    /// Distinct user ids seen by this tenant.
    pub users: Vec<UserId>,
    pub uptime_secs: u64,
}

/// Validate the bot credential shape: an 8-10 digit numeric prefix, a
/// colon, then a 35-character token of `[A-Za-z0-9_-]`.
pub fn validate_bot_token(token: &str) -> Result<(), RoostError> {
    let Some((prefix, secret)) = token.split_once(':') else {
        return Err(RoostError::ValidationError(
            "bot token must contain a ':' separator".into(),
        ));
    };

    if !(8..=10).contains(&prefix.len()) || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RoostError::ValidationError(
            "bot token must start with an 8-10 digit bot id".into(),
        ));
    }

    if secret.len() != 35
        || !secret
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        return Err(RoostError::ValidationError(
            "bot token secret must be 35 characters of [A-Za-z0-9_-]".into(),
        ));
    }

    Ok(())
}

/// Validate an already-parsed owner id: must be positive.
pub fn validate_owner(owner: UserId) -> Result<(), RoostError> {
    if owner.0 <= 0 {
        return Err(RoostError::ValidationError(
            "owner id must be a positive integer".into(),
        ));
    }
    Ok(())
}

/// Validate the tenant owner id as entered in the creation wizard.
pub fn validate_owner_id(raw: &str) -> Result<UserId, RoostError> {
    let owner = raw
        .trim()
        .parse::<i64>()
        .map(UserId)
        .map_err(|_| RoostError::ValidationError("owner id must be a positive integer".into()))?;
    validate_owner(owner)?;
    Ok(owner)
}

/// Validate the tenant display name: 3 to 50 characters.
pub fn validate_display_name(name: &str) -> Result<(), RoostError> {
    let len = name.chars().count();
    if !(MIN_DISPLAY_NAME_LEN..=MAX_DISPLAY_NAME_LEN).contains(&len) {
        return Err(RoostError::ValidationError(format!(
            "display name must be {MIN_DISPLAY_NAME_LEN}-{MAX_DISPLAY_NAME_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_validation_accepts_well_formed() {
        assert!(validate_bot_token("1234567890:AABBCCDDeeFFggHHiiJJKKllMMnnOOppQQR").is_ok());
        assert!(validate_bot_token("12345678:AABBCCDDeeFFggHHiiJJKK_lMMnn-OppQQR").is_ok());
    }

    #[test]
    fn token_validation_rejects_malformed() {
        // No separator.
        assert!(validate_bot_token("1234567890AABBCC").is_err());
        // Prefix too short.
        assert!(validate_bot_token("1234567:AABBCCDDeeFFggHHiiJJKKllMMnnOOppQQR").is_err());
        // Prefix not numeric.
        assert!(validate_bot_token("12345678ab:AABBCCDDeeFFggHHiiJJKKllMMnnOOppQ").is_err());
        // Secret wrong length.
        assert!(validate_bot_token("1234567890:short").is_err());
        // Secret with forbidden character.
        assert!(validate_bot_token("1234567890:AABBCCDDeeFFggHHiiJJKKllMMnnOOpp!Q").is_err());
    }

    #[test]
    fn owner_id_validation() {
        assert_eq!(validate_owner_id("123456").unwrap(), UserId(123456));
        assert_eq!(validate_owner_id(" 42 ").unwrap(), UserId(42));
        assert!(validate_owner_id("abc").is_err());
        assert!(validate_owner_id("-5").is_err());
        assert!(validate_owner_id("0").is_err());
    }

    #[test]
    fn typed_owner_validation_matches_the_string_boundary() {
        assert!(validate_owner(UserId(1)).is_ok());
        assert!(validate_owner(UserId(0)).is_err());
        assert!(validate_owner(UserId(-3)).is_err());
    }

    #[test]
    fn display_name_length_bounds() {
        assert!(validate_display_name("ab").is_err());
        assert!(validate_display_name("abc").is_ok());
        assert!(validate_display_name(&"x".repeat(50)).is_ok());
        assert!(validate_display_name(&"x".repeat(51)).is_err());
    }

    #[test]
    fn default_permissions_carry_fixed_lists() {
        let perms = TenantPermissions::default();
        assert!(perms.blocked_commands.iter().any(|c| c == "eval"));
        assert!(perms.blocked_commands.iter().any(|c| c == "tenants"));
        assert!(perms.allowed_commands.iter().any(|c| c == "addowner"));
        assert_eq!(perms.max_users, 1000);
        assert_eq!(perms.rate_limit_per_minute, 30);
    }

    #[test]
    fn tenant_record_round_trips() {
        let t = Tenant::new(
            TenantId::from_millis(1700000000123),
            "1234567890:AABBCCDDeeFFggHHiiJJKKllMMnnOOppQQR".into(),
            UserId(7),
            "My Tenant".into(),
            UserId(1),
        );
        let json = serde_json::to_string(&t).unwrap();
        let back: Tenant = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, t.id);
        assert_eq!(back.stats.total_commands, 0);
        assert!(back.stats.last_activity.is_none());
    }
}
