use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An advisory issued to a user in a guild. Never deleted, only deactivated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub id: String,
    pub user_id: u64,
    pub username: String,
    pub guild_id: u64,
    pub guild_name: String,
    pub moderator_id: u64,
    pub moderator_username: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub active: bool,
    #[serde(flatten)]
    pub removal: Option<WarningRemoval>,
}

/// Present exactly when the warning has been removed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningRemoval {
    pub removed_by: u64,
    pub removed_by_username: String,
    pub removed_at: DateTime<Utc>,
    pub remove_reason: String,
}

impl Warning {
    pub fn belongs_to(&self, user_id: u64, guild_id: u64) -> bool {
        self.user_id == user_id && self.guild_id == guild_id
    }
}
