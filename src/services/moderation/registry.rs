use chrono::{DateTime, Utc};
use tracing::info;

use crate::bot::error::Error;
use crate::db::models::{ModeratorEntry, ModeratorList, ModeratorRoleEntry};
use crate::db::store::{Store, StoreError};

pub const MODERATORS_COLLECTION: &str = "moderators";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotPresent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistrySummary {
    pub total_users: usize,
    pub total_roles: usize,
    pub last_updated: DateTime<Utc>,
}

/// Users and roles granted moderator privileges, kept as one document
#[derive(Debug, Clone)]
pub struct ModeratorRegistry {
    store: Store,
}

impl ModeratorRegistry {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn list_moderators(&self) -> Result<ModeratorList, Error> {
        match self.store.read_collection(MODERATORS_COLLECTION).await {
            Ok(value) => Ok(serde_json::from_value(value)?),
            Err(StoreError::NotFound(_)) => Ok(ModeratorList::empty(Utc::now())),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn is_moderator_user(&self, user_id: u64) -> Result<bool, Error> {
        Ok(self.list_moderators().await?.contains_user(user_id))
    }

    pub async fn has_moderator_role(&self, role_ids: &[u64]) -> Result<bool, Error> {
        Ok(self.list_moderators().await?.contains_any_role(role_ids))
    }

    pub async fn summary(&self) -> Result<RegistrySummary, Error> {
        let list = self.list_moderators().await?;
        Ok(RegistrySummary {
            total_users: list.users.len(),
            total_roles: list.roles.len(),
            last_updated: list.last_updated,
        })
    }

    pub async fn add_moderator_user(
        &self,
        user_id: u64,
        display_name: &str,
        added_by: u64,
    ) -> Result<AddOutcome, Error> {
        self.mutate(|list, now| {
            if list.contains_user(user_id) {
                return false;
            }
            list.users.push(ModeratorEntry {
                id: user_id,
                display_name: display_name.to_string(),
                added_at: now,
                added_by,
            });
            true
        })
        .await
        .map(|changed| {
            if changed {
                info!("User {} added as moderator by {}", user_id, added_by);
                AddOutcome::Added
            } else {
                AddOutcome::AlreadyPresent
            }
        })
    }

    pub async fn remove_moderator_user(&self, user_id: u64) -> Result<RemoveOutcome, Error> {
        let changed = self
            .mutate(|list, _| {
                let before = list.users.len();
                list.users.retain(|u| u.id != user_id);
                list.users.len() != before
            })
            .await?;

        if changed {
            info!("User {} removed from moderators", user_id);
            Ok(RemoveOutcome::Removed)
        } else {
            Ok(RemoveOutcome::NotPresent)
        }
    }

    pub async fn add_moderator_role(
        &self,
        role_id: u64,
        name: &str,
        member_count: u64,
        added_by: u64,
    ) -> Result<AddOutcome, Error> {
        let changed = self
            .mutate(|list, now| {
                if list.roles.iter().any(|r| r.id == role_id) {
                    return false;
                }
                list.roles.push(ModeratorRoleEntry {
                    id: role_id,
                    name: name.to_string(),
                    member_count,
                    added_at: now,
                    added_by,
                });
                true
            })
            .await?;

        if changed {
            info!("Role {} added as moderator role by {}", role_id, added_by);
            Ok(AddOutcome::Added)
        } else {
            Ok(AddOutcome::AlreadyPresent)
        }
    }

    pub async fn remove_moderator_role(&self, role_id: u64) -> Result<RemoveOutcome, Error> {
        let changed = self
            .mutate(|list, _| {
                let before = list.roles.len();
                list.roles.retain(|r| r.id != role_id);
                list.roles.len() != before
            })
            .await?;

        if changed {
            info!("Role {} removed from moderator roles", role_id);
            Ok(RemoveOutcome::Removed)
        } else {
            Ok(RemoveOutcome::NotPresent)
        }
    }

    /// Read-modify-write under the collection lock. `apply` returns whether
    /// it changed anything; unchanged documents are not rewritten.
    async fn mutate<F>(&self, apply: F) -> Result<bool, Error>
    where
        F: FnOnce(&mut ModeratorList, DateTime<Utc>) -> bool,
    {
        let _guard = self.store.lock(MODERATORS_COLLECTION).await;

        let now = Utc::now();
        let mut list = self.list_moderators().await?;

        if !apply(&mut list, now) {
            return Ok(false);
        }

        list.last_updated = now;
        self.store
            .write_collection(MODERATORS_COLLECTION, &serde_json::to_value(&list)?)
            .await?;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::memory_store::MemoryStore;

    fn registry() -> ModeratorRegistry {
        ModeratorRegistry::new(Store::new(Arc::new(MemoryStore::new())))
    }

    #[tokio::test]
    async fn test_empty_registry_without_document() {
        let list = registry().list_moderators().await.unwrap();
        assert!(list.users.is_empty());
        assert!(list.roles.is_empty());
    }

    #[tokio::test]
    async fn test_add_user_twice() {
        let registry = registry();

        assert_eq!(
            registry.add_moderator_user(111, "alice", 1).await.unwrap(),
            AddOutcome::Added
        );
        let first = registry.list_moderators().await.unwrap();

        assert_eq!(
            registry.add_moderator_user(111, "alice again", 2).await.unwrap(),
            AddOutcome::AlreadyPresent
        );
        let second = registry.list_moderators().await.unwrap();

        assert_eq!(second.users.len(), 1);
        assert_eq!(second.users[0].display_name, "alice");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_remove_user() {
        let registry = registry();
        registry.add_moderator_user(111, "alice", 1).await.unwrap();

        assert_eq!(
            registry.remove_moderator_user(111).await.unwrap(),
            RemoveOutcome::Removed
        );
        assert_eq!(
            registry.remove_moderator_user(111).await.unwrap(),
            RemoveOutcome::NotPresent
        );
        assert!(!registry.is_moderator_user(111).await.unwrap());
    }

    #[tokio::test]
    async fn test_roles_and_membership() {
        let registry = registry();
        assert_eq!(
            registry.add_moderator_role(500, "Helpers", 12, 1).await.unwrap(),
            AddOutcome::Added
        );
        assert_eq!(
            registry.add_moderator_role(500, "Helpers", 12, 1).await.unwrap(),
            AddOutcome::AlreadyPresent
        );

        assert!(registry.has_moderator_role(&[400, 500]).await.unwrap());
        assert!(!registry.has_moderator_role(&[400]).await.unwrap());
        assert!(!registry.has_moderator_role(&[]).await.unwrap());

        assert_eq!(
            registry.remove_moderator_role(500).await.unwrap(),
            RemoveOutcome::Removed
        );
        assert_eq!(
            registry.remove_moderator_role(500).await.unwrap(),
            RemoveOutcome::NotPresent
        );
    }

    #[tokio::test]
    async fn test_mutations_bump_last_updated() {
        let registry = registry();
        registry.add_moderator_user(1, "a", 9).await.unwrap();
        let before = registry.summary().await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        registry.add_moderator_role(2, "r", 3, 9).await.unwrap();
        let after = registry.summary().await.unwrap();

        assert_eq!(after.total_users, 1);
        assert_eq!(after.total_roles, 1);
        assert!(after.last_updated > before.last_updated);
    }

    #[tokio::test]
    async fn test_registry_document_shape() {
        let store = Store::new(Arc::new(MemoryStore::new()));
        let registry = ModeratorRegistry::new(store.clone());
        registry.add_moderator_user(111, "alice", 1).await.unwrap();

        let raw = store.read_collection(MODERATORS_COLLECTION).await.unwrap();
        assert_eq!(raw["users"][0]["id"], 111);
        assert_eq!(raw["users"][0]["displayName"], "alice");
        assert!(raw["roles"].as_array().unwrap().is_empty());
        assert_eq!(raw["version"], "1.0.0");
        assert!(raw.get("lastUpdated").is_some());
    }
}
