use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::commands;
use crate::components::callbacks::{CallbackRegistry, ComponentCall};
use crate::config::Settings;
use crate::db::store::Store;
use crate::services::audit::log::AuditLog;
use crate::services::converter::slots::ConversionSlots;
use crate::services::converter::transcoder::Transcoder;
use crate::services::lifecycle::manager::LifecycleManager;
use crate::services::lifecycle::source::{
    event_registry, handler_registry, CollectionSource, ComponentClass, ComponentSource,
    StaticSource,
};
use crate::services::moderation::ledger::WarningLedger;
use crate::services::moderation::registry::ModeratorRegistry;

/// Shared data available to all commands and handlers
pub struct Data {
    pub settings: Settings,
    /// OWNER_IDS plus the application id
    pub owners: HashSet<u64>,
    pub store: Store,
    pub ledger: WarningLedger,
    pub registry: ModeratorRegistry,
    pub audit: AuditLog,
    pub lifecycle: LifecycleManager,
    /// Pending button callbacks (confirmations, pagination)
    pub callbacks: CallbackRegistry<ComponentCall>,
    pub transcoder: Transcoder,
    pub conversions: Arc<ConversionSlots>,
    pub started_at: Instant,
}

impl Data {
    pub fn new(store: Store, settings: Settings) -> Self {
        let audit = AuditLog::new(store.clone());

        let sources: Vec<Arc<dyn ComponentSource>> = vec![
            Arc::new(StaticSource::new(ComponentClass::Commands, commands::registry)),
            Arc::new(StaticSource::new(ComponentClass::Events, event_registry)),
            Arc::new(StaticSource::new(ComponentClass::Handlers, handler_registry)),
            Arc::new(CollectionSource::new(store.clone())),
        ];

        Self {
            owners: settings.bot_owners(),
            ledger: WarningLedger::new(store.clone()),
            registry: ModeratorRegistry::new(store.clone()),
            lifecycle: LifecycleManager::new(sources, audit.clone()),
            audit,
            callbacks: CallbackRegistry::new(),
            transcoder: Transcoder::new(
                settings.converter_binary.clone(),
                settings.converter_temp_dir.clone(),
            ),
            conversions: Arc::new(ConversionSlots::new()),
            started_at: Instant::now(),
            store,
            settings,
        }
    }

    pub fn is_owner(&self, user_id: u64) -> bool {
        self.owners.contains(&user_id)
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data")
            .field("store", &self.store)
            .field("owners", &self.owners.len())
            .field("pending_callbacks", &self.callbacks.len())
            .field("conversions", &self.conversions.len())
            .finish_non_exhaustive()
    }
}

pub type Context<'a> = poise::Context<'a, Arc<Data>, crate::bot::error::Error>;
