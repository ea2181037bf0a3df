use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::bot::error::Error;
use crate::constants::limits::MAX_REASON_LENGTH;
use crate::db::models::{ActorSnapshot, Warning, WarningRemoval};
use crate::db::store::Store;
use crate::utils::formatting::truncate;

pub const WARNINGS_COLLECTION: &str = "warnings";

/// Everything needed to issue a warning
#[derive(Debug, Clone)]
pub struct NewWarning {
    pub user_id: u64,
    pub username: String,
    pub guild_id: u64,
    pub guild_name: String,
    pub moderator_id: u64,
    pub moderator_username: String,
    pub reason: String,
}

/// Append-only warning records in the `warnings` collection
#[derive(Debug, Clone)]
pub struct WarningLedger {
    store: Store,
}

impl WarningLedger {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn issue_warning(&self, new: NewWarning) -> Result<Warning, Error> {
        let warning = Warning {
            id: Uuid::now_v7().to_string(),
            user_id: new.user_id,
            username: new.username,
            guild_id: new.guild_id,
            guild_name: new.guild_name,
            moderator_id: new.moderator_id,
            moderator_username: new.moderator_username,
            reason: truncate(&new.reason, MAX_REASON_LENGTH),
            created_at: Utc::now(),
            active: true,
            removal: None,
        };

        self.store
            .append_record(WARNINGS_COLLECTION, serde_json::to_value(&warning)?)
            .await?;

        info!(
            "Warning {} issued to user {} in guild {} by {}",
            warning.id, warning.user_id, warning.guild_id, warning.moderator_id
        );

        Ok(warning)
    }

    /// Warnings of a user in a guild, in insertion order
    pub async fn list_warnings(
        &self,
        user_id: u64,
        guild_id: u64,
        active_only: bool,
    ) -> Result<Vec<Warning>, Error> {
        let warnings = self.load().await?;

        Ok(warnings
            .into_iter()
            .filter(|w| w.belongs_to(user_id, guild_id))
            .filter(|w| !active_only || w.active)
            .collect())
    }

    pub async fn count_active(&self, user_id: u64, guild_id: u64) -> Result<usize, Error> {
        Ok(self.list_warnings(user_id, guild_id, true).await?.len())
    }

    /// Deactivate one active warning.
    ///
    /// With `warning_id`, only an active warning with that id qualifies;
    /// without it, the most recently created active warning is removed.
    pub async fn remove_warning(
        &self,
        user_id: u64,
        guild_id: u64,
        warning_id: Option<&str>,
        removed_by: &ActorSnapshot,
        remove_reason: &str,
    ) -> Result<Warning, Error> {
        let _guard = self.store.lock(WARNINGS_COLLECTION).await;

        let mut warnings = self.load().await?;

        let candidates = warnings
            .iter()
            .enumerate()
            .filter(|(_, w)| w.active && w.belongs_to(user_id, guild_id));

        let target = match warning_id {
            Some(id) => candidates.filter(|(_, w)| w.id == id).map(|(i, _)| i).next(),
            None => candidates
                .max_by(|(_, a), (_, b)| {
                    a.created_at
                        .cmp(&b.created_at)
                        .then_with(|| a.id.cmp(&b.id))
                })
                .map(|(i, _)| i),
        };

        let index = target.ok_or_else(|| match warning_id {
            Some(id) => Error::not_found(format!("active warning {}", id)),
            None => Error::not_found("active warnings for this user"),
        })?;

        let warning = &mut warnings[index];
        warning.active = false;
        warning.removal = Some(WarningRemoval {
            removed_by: removed_by.id,
            removed_by_username: removed_by.username.clone(),
            removed_at: Utc::now(),
            remove_reason: truncate(remove_reason, MAX_REASON_LENGTH),
        });
        let removed = warning.clone();

        self.store
            .write_collection(WARNINGS_COLLECTION, &serde_json::to_value(&warnings)?)
            .await?;

        debug!(
            "Warning {} for user {} deactivated by {}",
            removed.id, user_id, removed_by.id
        );

        Ok(removed)
    }

    async fn load(&self) -> Result<Vec<Warning>, Error> {
        let records = self.store.read_records(WARNINGS_COLLECTION).await?;
        Ok(serde_json::from_value(Value::Array(records))?)
    }
}

/// Newest first, for display
pub fn sort_recent_first(warnings: &mut [Warning]) {
    warnings.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::memory_store::MemoryStore;

    const USER: u64 = 1001;
    const GUILD: u64 = 42;

    fn ledger() -> WarningLedger {
        WarningLedger::new(Store::new(Arc::new(MemoryStore::new())))
    }

    fn new_warning(user_id: u64, guild_id: u64, reason: &str) -> NewWarning {
        NewWarning {
            user_id,
            username: format!("user{}", user_id),
            guild_id,
            guild_name: "Test Guild".to_string(),
            moderator_id: 7,
            moderator_username: "mod".to_string(),
            reason: reason.to_string(),
        }
    }

    fn remover() -> ActorSnapshot {
        ActorSnapshot {
            id: 8,
            username: "senior-mod".to_string(),
        }
    }

    #[tokio::test]
    async fn test_issued_warning_is_active() {
        let ledger = ledger();
        let warning = ledger
            .issue_warning(new_warning(USER, GUILD, "spam"))
            .await
            .unwrap();

        assert!(warning.active);
        assert!(warning.removal.is_none());

        let stored = ledger.list_warnings(USER, GUILD, false).await.unwrap();
        assert_eq!(stored, vec![warning]);
    }

    #[tokio::test]
    async fn test_long_reason_is_truncated() {
        let ledger = ledger();
        let reason = "x".repeat(MAX_REASON_LENGTH + 100);
        let warning = ledger
            .issue_warning(new_warning(USER, GUILD, &reason))
            .await
            .unwrap();

        assert_eq!(warning.reason.chars().count(), MAX_REASON_LENGTH);
    }

    #[tokio::test]
    async fn test_list_filters_by_subject_and_guild() {
        let ledger = ledger();
        ledger.issue_warning(new_warning(USER, GUILD, "a")).await.unwrap();
        ledger.issue_warning(new_warning(USER, 99, "other guild")).await.unwrap();
        ledger.issue_warning(new_warning(2002, GUILD, "other user")).await.unwrap();
        ledger.issue_warning(new_warning(USER, GUILD, "b")).await.unwrap();

        let reasons: Vec<_> = ledger
            .list_warnings(USER, GUILD, false)
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.reason)
            .collect();
        assert_eq!(reasons, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_remove_most_recent_without_id() {
        let ledger = ledger();
        for reason in ["first", "second", "third"] {
            ledger.issue_warning(new_warning(USER, GUILD, reason)).await.unwrap();
        }

        let removed = ledger
            .remove_warning(USER, GUILD, None, &remover(), "appealed")
            .await
            .unwrap();
        assert_eq!(removed.reason, "third");

        let all = ledger.list_warnings(USER, GUILD, false).await.unwrap();
        let active = ledger.list_warnings(USER, GUILD, true).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(active.len(), 2);

        let inactive: Vec<_> = all.iter().filter(|w| !w.active).collect();
        assert_eq!(inactive.len(), 1);
        let removal = inactive[0].removal.as_ref().unwrap();
        assert_eq!(removal.remove_reason, "appealed");
        assert_eq!(removal.removed_by, 8);
        assert_eq!(removal.removed_by_username, "senior-mod");
    }

    #[tokio::test]
    async fn test_remove_by_id_twice_is_not_found() {
        let ledger = ledger();
        let warning = ledger
            .issue_warning(new_warning(USER, GUILD, "spam"))
            .await
            .unwrap();

        ledger
            .remove_warning(USER, GUILD, Some(&warning.id), &remover(), "ok")
            .await
            .unwrap();

        let second = ledger
            .remove_warning(USER, GUILD, Some(&warning.id), &remover(), "again")
            .await;
        assert!(matches!(second, Err(Error::NotFound(_))));

        // The first removal is left untouched
        let stored = ledger.list_warnings(USER, GUILD, false).await.unwrap();
        assert_eq!(stored[0].removal.as_ref().unwrap().remove_reason, "ok");
    }

    #[tokio::test]
    async fn test_remove_by_id_of_other_user_is_not_found() {
        let ledger = ledger();
        let warning = ledger
            .issue_warning(new_warning(2002, GUILD, "spam"))
            .await
            .unwrap();

        let result = ledger
            .remove_warning(USER, GUILD, Some(&warning.id), &remover(), "nope")
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_without_active_warnings_is_not_found() {
        let ledger = ledger();
        let result = ledger
            .remove_warning(USER, GUILD, None, &remover(), "nothing")
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_active_only_is_subset_of_all() {
        let ledger = ledger();
        for i in 0..5 {
            ledger
                .issue_warning(new_warning(USER, GUILD, &format!("w{}", i)))
                .await
                .unwrap();
        }
        ledger.remove_warning(USER, GUILD, None, &remover(), "r").await.unwrap();
        ledger.remove_warning(USER, GUILD, None, &remover(), "r").await.unwrap();

        let all = ledger.list_warnings(USER, GUILD, false).await.unwrap();
        let active = ledger.list_warnings(USER, GUILD, true).await.unwrap();
        assert_eq!(active.len(), 3);
        assert!(active.iter().all(|w| all.contains(w)));
        assert_eq!(ledger.count_active(USER, GUILD).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_sort_recent_first() {
        let ledger = ledger();
        for reason in ["old", "mid", "new"] {
            ledger.issue_warning(new_warning(USER, GUILD, reason)).await.unwrap();
        }

        let mut warnings = ledger.list_warnings(USER, GUILD, false).await.unwrap();
        sort_recent_first(&mut warnings);
        let reasons: Vec<_> = warnings.iter().map(|w| w.reason.as_str()).collect();
        assert_eq!(reasons, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_removal_fields_persist_as_flat_document() {
        let store = Store::new(Arc::new(MemoryStore::new()));
        let ledger = WarningLedger::new(store.clone());
        ledger.issue_warning(new_warning(USER, GUILD, "spam")).await.unwrap();
        ledger.remove_warning(USER, GUILD, None, &remover(), "done").await.unwrap();

        let raw = store.read_collection(WARNINGS_COLLECTION).await.unwrap();
        let record = &raw[0];
        assert_eq!(record["active"], false);
        assert_eq!(record["removeReason"], "done");
        assert_eq!(record["removedBy"], 8);
        assert!(record.get("removal").is_none());
    }
}
