use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const REGISTRY_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeratorEntry {
    pub id: u64,
    pub display_name: String,
    pub added_at: DateTime<Utc>,
    pub added_by: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeratorRoleEntry {
    pub id: u64,
    pub name: String,
    pub member_count: u64,
    pub added_at: DateTime<Utc>,
    pub added_by: u64,
}

/// The whole registry document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeratorList {
    #[serde(default)]
    pub users: Vec<ModeratorEntry>,
    #[serde(default)]
    pub roles: Vec<ModeratorRoleEntry>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    REGISTRY_VERSION.to_string()
}

impl ModeratorList {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            users: Vec::new(),
            roles: Vec::new(),
            created_at: now,
            last_updated: now,
            version: default_version(),
        }
    }

    pub fn contains_user(&self, user_id: u64) -> bool {
        self.users.iter().any(|u| u.id == user_id)
    }

    pub fn contains_any_role<'a>(&self, role_ids: impl IntoIterator<Item = &'a u64>) -> bool {
        role_ids
            .into_iter()
            .any(|role_id| self.roles.iter().any(|r| r.id == *role_id))
    }
}
