use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::bot::error::Error;
use crate::db::models::ModeratorList;
use crate::db::store::Store;
use crate::services::audit::log::{MOD_LOG, RELOAD_LOG};
use crate::services::moderation::ledger::WARNINGS_COLLECTION;
use crate::services::moderation::registry::MODERATORS_COLLECTION;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, poise::ChoiceParameter)]
pub enum ComponentClass {
    #[name = "commands"]
    Commands,
    #[name = "events"]
    Events,
    #[name = "handlers"]
    Handlers,
    #[name = "collections"]
    Collections,
}

impl ComponentClass {
    /// Reload order used by a full reload
    pub const ALL: [ComponentClass; 4] = [
        ComponentClass::Commands,
        ComponentClass::Events,
        ComponentClass::Handlers,
        ComponentClass::Collections,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentClass::Commands => "commands",
            ComponentClass::Events => "events",
            ComponentClass::Handlers => "handlers",
            ComponentClass::Collections => "collections",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDescriptor {
    pub name: String,
    pub detail: Option<String>,
}

impl ComponentDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            detail: None,
        }
    }

    pub fn with_detail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            detail: Some(detail.into()),
        }
    }
}

/// Where the lifecycle manager finds the components of one class
#[async_trait]
pub trait ComponentSource: Send + Sync {
    fn class(&self) -> ComponentClass;

    async fn discover(&self) -> Result<Vec<ComponentDescriptor>, Error>;
}

/// A source backed by a fixed registry compiled into the binary
pub struct StaticSource {
    class: ComponentClass,
    registry: fn() -> Vec<ComponentDescriptor>,
}

impl StaticSource {
    pub fn new(class: ComponentClass, registry: fn() -> Vec<ComponentDescriptor>) -> Self {
        Self { class, registry }
    }
}

#[async_trait]
impl ComponentSource for StaticSource {
    fn class(&self) -> ComponentClass {
        self.class
    }

    async fn discover(&self) -> Result<Vec<ComponentDescriptor>, Error> {
        Ok((self.registry)())
    }
}

/// Gateway events the bot reacts to
pub const EVENTS: &[&str] = &[
    "ready",
    "cache_ready",
    "guild_create",
    "interaction_create",
    "ratelimit",
    "resume",
    "shard_stage_update",
];

/// Events that keep the connection healthy and survive event reloads
pub const PROTECTED_EVENTS: &[&str] = &["ratelimit", "resume", "shard_stage_update"];

pub const CALLBACK_SWEEPER: &str = "callback_sweeper";
pub const LOG_RETENTION: &str = "log_retention";

pub fn event_registry() -> Vec<ComponentDescriptor> {
    EVENTS.iter().map(|name| ComponentDescriptor::new(*name)).collect()
}

pub fn handler_registry() -> Vec<ComponentDescriptor> {
    vec![
        ComponentDescriptor::with_detail(CALLBACK_SWEEPER, "drops expired button callbacks"),
        ComponentDescriptor::with_detail(LOG_RETENTION, "purges old reload log entries daily"),
    ]
}

/// Makes sure the bot's collections exist and reports their sizes
pub struct CollectionSource {
    store: Store,
}

impl CollectionSource {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ComponentSource for CollectionSource {
    fn class(&self) -> ComponentClass {
        ComponentClass::Collections
    }

    async fn discover(&self) -> Result<Vec<ComponentDescriptor>, Error> {
        for sequence in [WARNINGS_COLLECTION, MOD_LOG, RELOAD_LOG] {
            self.store.create_collection(sequence, json!([])).await?;
        }
        self.store
            .create_collection(
                MODERATORS_COLLECTION,
                serde_json::to_value(ModeratorList::empty(Utc::now()))?,
            )
            .await?;

        let mut descriptors = Vec::new();
        for name in self.store.list_collections().await? {
            let count = self.store.count_records(&name).await?;
            descriptors.push(ComponentDescriptor::with_detail(
                name,
                format!("{} records", count),
            ));
        }

        Ok(descriptors)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::memory_store::MemoryStore;

    #[tokio::test]
    async fn test_collection_source_creates_defaults() {
        let store = Store::new(Arc::new(MemoryStore::new()));
        store.append_record(MOD_LOG, json!({"n": 1})).await.unwrap();

        let found = CollectionSource::new(store.clone()).discover().await.unwrap();
        let names: Vec<_> = found.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["databasereload", "mod", "moderators", "warnings"]);

        let mod_log = found.iter().find(|d| d.name == MOD_LOG).unwrap();
        assert_eq!(mod_log.detail.as_deref(), Some("1 records"));

        let registry = store.read_collection(MODERATORS_COLLECTION).await.unwrap();
        assert!(registry["users"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_protected_events_are_registered() {
        let events = event_registry();
        for protected in PROTECTED_EVENTS {
            assert!(events.iter().any(|d| d.name == *protected));
        }
    }
}
