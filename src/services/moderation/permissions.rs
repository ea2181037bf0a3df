use std::collections::HashSet;
use std::fmt::Display;

use tracing::warn;

use crate::db::models::ModeratorList;
use crate::services::moderation::registry::ModeratorRegistry;

/// What the platform tells us about the member invoking a command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActorFacts {
    pub user_id: u64,
    pub role_ids: Vec<u64>,
    pub is_platform_admin: bool,
}

pub fn is_owner(user_id: u64, owners: &HashSet<u64>) -> bool {
    owners.contains(&user_id)
}

/// Decide whether an actor may run moderation commands. First match wins:
/// bot owner, registered user, registered role, platform administrator.
///
/// An unreadable registry grants nothing by itself but does not stop the
/// administrator check.
pub fn can_moderate<E: Display>(
    actor: &ActorFacts,
    owners: &HashSet<u64>,
    registry: Result<&ModeratorList, E>,
) -> bool {
    if is_owner(actor.user_id, owners) {
        return true;
    }

    match registry {
        Ok(list) => {
            if list.contains_user(actor.user_id) || list.contains_any_role(&actor.role_ids) {
                return true;
            }
        }
        Err(e) => {
            warn!(
                "Moderator registry unavailable while checking {}: {}",
                actor.user_id, e
            );
        }
    }

    actor.is_platform_admin
}

/// Load the registry and run [`can_moderate`]
pub async fn resolve(
    registry: &ModeratorRegistry,
    actor: &ActorFacts,
    owners: &HashSet<u64>,
) -> bool {
    if is_owner(actor.user_id, owners) {
        return true;
    }

    let list = registry.list_moderators().await;
    can_moderate(actor, owners, list.as_ref())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::db::memory_store::MemoryStore;
    use crate::db::models::{ModeratorEntry, ModeratorRoleEntry};
    use crate::db::store::Store;

    fn actor(user_id: u64, role_ids: &[u64], admin: bool) -> ActorFacts {
        ActorFacts {
            user_id,
            role_ids: role_ids.to_vec(),
            is_platform_admin: admin,
        }
    }

    fn list_with(users: &[u64], roles: &[u64]) -> ModeratorList {
        let now = Utc::now();
        let mut list = ModeratorList::empty(now);
        list.users = users
            .iter()
            .map(|id| ModeratorEntry {
                id: *id,
                display_name: format!("user{}", id),
                added_at: now,
                added_by: 1,
            })
            .collect();
        list.roles = roles
            .iter()
            .map(|id| ModeratorRoleEntry {
                id: *id,
                name: format!("role{}", id),
                member_count: 0,
                added_at: now,
                added_by: 1,
            })
            .collect();
        list
    }

    #[test]
    fn test_owner_always_passes() {
        let owners = HashSet::from([1]);
        let owner = actor(1, &[], false);

        assert!(can_moderate(&owner, &owners, Ok::<_, String>(&list_with(&[], &[]))));
        assert!(can_moderate(
            &owner,
            &owners,
            Err::<&ModeratorList, _>("registry unreadable")
        ));
    }

    #[test]
    fn test_registry_user_and_role() {
        let owners = HashSet::new();
        let list = list_with(&[10], &[500]);

        assert!(can_moderate(&actor(10, &[], false), &owners, Ok::<_, String>(&list)));
        assert!(can_moderate(&actor(11, &[400, 500], false), &owners, Ok::<_, String>(&list)));
        assert!(!can_moderate(&actor(12, &[400], false), &owners, Ok::<_, String>(&list)));
    }

    #[test]
    fn test_platform_admin() {
        let owners = HashSet::new();
        let list = list_with(&[], &[]);

        assert!(can_moderate(&actor(20, &[], true), &owners, Ok::<_, String>(&list)));
        assert!(!can_moderate(&actor(20, &[], false), &owners, Ok::<_, String>(&list)));
    }

    #[test]
    fn test_registry_failure_falls_through_to_admin() {
        let owners = HashSet::new();
        let failed = || Err::<&ModeratorList, _>("io error");

        assert!(!can_moderate(&actor(10, &[500], false), &owners, failed()));
        assert!(can_moderate(&actor(10, &[500], true), &owners, failed()));
    }

    #[tokio::test]
    async fn test_resolve_against_registry() {
        let registry = ModeratorRegistry::new(Store::new(Arc::new(MemoryStore::new())));
        registry.add_moderator_role(500, "Helpers", 3, 1).await.unwrap();
        let owners = HashSet::from([1]);

        assert!(resolve(&registry, &actor(1, &[], false), &owners).await);
        assert!(resolve(&registry, &actor(30, &[500], false), &owners).await);
        assert!(!resolve(&registry, &actor(31, &[], false), &owners).await);
    }
}
