//! The audit record shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use roost_types::{TenantId, UserId};

/// One blocked command attempt.
///
/// Written when a tenant's security gate refuses a command, whether because
/// the command is on the dangerous blocklist, outside the tenant's allowed
/// set, or explicitly blocked by its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityRecord {
    pub timestamp: DateTime<Utc>,
    pub tenant_id: TenantId,
    pub user_id: UserId,
    /// Username if the sender has one, otherwise their first name.
    pub username: String,
    /// The command that was refused, without the leading prefix.
    pub blocked_command: String,
    pub chat_id: i64,
    /// "private", "group", "supergroup", or "channel".
    pub chat_type: String,
}

impl SecurityRecord {
    pub fn new(
        tenant_id: TenantId,
        user_id: UserId,
        username: impl Into<String>,
        blocked_command: impl Into<String>,
        chat_id: i64,
        chat_type: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            tenant_id,
            user_id,
            username: username.into(),
            blocked_command: blocked_command.into(),
            chat_id,
            chat_type: chat_type.into(),
        }
    }
}
