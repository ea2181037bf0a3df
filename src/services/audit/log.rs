use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::bot::error::Error;
use crate::db::models::{ActorSnapshot, AuditLogEntry, GuildSnapshot, LogError, LogType};
use crate::db::store::Store;
use crate::services::audit::stats::{self, LogStats};

/// Moderation actions
pub const MOD_LOG: &str = "mod";

/// Component reloads and other maintenance
pub const RELOAD_LOG: &str = "databasereload";

/// An entry before it gets an id and a timestamp
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub kind: LogType,
    pub category: String,
    pub action: String,
    pub user: Option<ActorSnapshot>,
    pub guild: Option<GuildSnapshot>,
    pub details: Value,
    pub success: bool,
    pub duration_ms: Option<u64>,
    pub changes: Vec<String>,
    pub errors: Vec<LogError>,
}

impl NewLogEntry {
    pub fn new(category: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            kind: LogType::Info,
            category: category.into(),
            action: action.into(),
            user: None,
            guild: None,
            details: Value::Null,
            success: true,
            duration_ms: None,
            changes: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn kind(mut self, kind: LogType) -> Self {
        self.kind = kind;
        self
    }

    pub fn user(mut self, user: ActorSnapshot) -> Self {
        self.user = Some(user);
        self
    }

    pub fn guild(mut self, guild: Option<GuildSnapshot>) -> Self {
        self.guild = guild;
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    pub fn changes(mut self, changes: Vec<String>) -> Self {
        self.changes = changes;
        self
    }

    /// Mark as failed with an error message
    pub fn failed(mut self, message: impl Into<String>) -> Self {
        self.kind = LogType::Error;
        self.success = false;
        self.errors.push(LogError {
            message: message.into(),
        });
        self
    }
}

/// Append-only audit trail, one store collection per log
#[derive(Debug, Clone)]
pub struct AuditLog {
    store: Store,
}

impl AuditLog {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn record(&self, collection: &str, new: NewLogEntry) -> Result<AuditLogEntry, Error> {
        let entry = AuditLogEntry {
            id: Uuid::now_v7().to_string(),
            timestamp: Utc::now(),
            kind: new.kind,
            category: new.category,
            action: new.action,
            user: new.user,
            guild: new.guild,
            details: new.details,
            success: new.success,
            duration_ms: new.duration_ms,
            changes: new.changes,
            errors: new.errors,
        };

        self.store.create_collection(collection, json!([])).await?;
        self.store
            .append_record(collection, serde_json::to_value(&entry)?)
            .await?;

        trace_entry(collection, &entry);

        Ok(entry)
    }

    /// Every well-formed entry of a collection, in insertion order
    pub async fn entries(&self, collection: &str) -> Result<Vec<AuditLogEntry>, Error> {
        let records = self.store.read_records(collection).await?;
        let total = records.len();

        let entries: Vec<AuditLogEntry> = records
            .into_iter()
            .filter_map(|record| serde_json::from_value(record).ok())
            .collect();

        if entries.len() != total {
            warn!(
                "Skipped {} malformed entries in {}",
                total - entries.len(),
                collection
            );
        }

        Ok(entries)
    }

    /// Newest first, at most `limit`, optionally of one type only
    pub async fn recent(
        &self,
        collection: &str,
        limit: usize,
        type_filter: Option<LogType>,
    ) -> Result<Vec<AuditLogEntry>, Error> {
        let mut entries: Vec<_> = self
            .entries(collection)
            .await?
            .into_iter()
            .filter(|e| type_filter.map_or(true, |kind| e.kind == kind))
            .collect();

        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        entries.truncate(limit);

        Ok(entries)
    }

    pub async fn stats(&self, collection: &str) -> Result<LogStats, Error> {
        let entries = self.entries(collection).await?;
        Ok(stats::compute(&entries, Utc::now()))
    }

    /// Drop entries older than `days`. Returns how many were removed; the
    /// collection is only rewritten when that is non-zero.
    pub async fn purge_older_than(&self, collection: &str, days: i64) -> Result<usize, Error> {
        let _guard = self.store.lock(collection).await;

        let cutoff = Duration::try_days(days)
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .ok_or_else(|| Error::validation(format!("{} days is outside the supported range", days)))?;
        let records = self.store.read_records(collection).await?;
        let before = records.len();

        // Malformed records have no usable timestamp and are kept as they are
        let kept: Vec<Value> = records
            .into_iter()
            .filter(|record| {
                serde_json::from_value::<AuditLogEntry>(record.clone())
                    .map(|e| e.timestamp >= cutoff)
                    .unwrap_or(true)
            })
            .collect();

        let removed = before - kept.len();
        if removed > 0 {
            self.store
                .write_collection(collection, &Value::Array(kept))
                .await?;
            info!("Purged {} entries older than {} days from {}", removed, days, collection);
        }

        Ok(removed)
    }
}

fn trace_entry(collection: &str, entry: &AuditLogEntry) {
    let who = entry
        .user
        .as_ref()
        .map(|u| u.username.as_str())
        .unwrap_or("system");

    match entry.kind {
        LogType::Error => error!("[{}] {} by {} failed", collection, entry.action, who),
        LogType::Warning => warn!("[{}] {} by {}", collection, entry.action, who),
        LogType::Debug => debug!("[{}] {} by {}", collection, entry.action, who),
        LogType::Info | LogType::Success => {
            info!("[{}] {} by {}", collection, entry.action, who)
        }
    }
}
