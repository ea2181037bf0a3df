use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::bot::error::Error;
use crate::db::models::{ActorSnapshot, GuildSnapshot, LogType};
use crate::services::audit::log::{AuditLog, NewLogEntry, RELOAD_LOG};
use crate::services::lifecycle::source::{
    ComponentClass, ComponentDescriptor, ComponentSource, PROTECTED_EVENTS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentState {
    Unloaded,
    Loaded,
    Reloading,
    Failed,
}

impl ComponentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentState::Unloaded => "unloaded",
            ComponentState::Loaded => "loaded",
            ComponentState::Reloading => "reloading",
            ComponentState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
struct LoadedSet {
    state: ComponentState,
    components: BTreeMap<String, ComponentDescriptor>,
    last_change: Option<DateTime<Utc>>,
}

impl LoadedSet {
    fn empty() -> Self {
        Self {
            state: ComponentState::Unloaded,
            components: BTreeMap::new(),
            last_change: None,
        }
    }
}

/// Outcome of reloading one class
#[derive(Debug, Clone, PartialEq)]
pub struct ReloadReport {
    pub class: ComponentClass,
    pub count: usize,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub duration: Duration,
}

impl ReloadReport {
    pub fn changes(&self) -> Vec<String> {
        let mut changes = vec![format!("{} {} reloaded", self.count, self.class.as_str())];
        if !self.added.is_empty() {
            changes.push(format!("added: {}", self.added.join(", ")));
        }
        if !self.removed.is_empty() {
            changes.push(format!("removed: {}", self.removed.join(", ")));
        }
        changes
    }
}

/// A full reload stopped at `class`; classes before it stay reloaded
#[derive(Debug, thiserror::Error)]
#[error("Reload failed at {}: {source}", .class.as_str())]
pub struct ReloadError {
    pub class: ComponentClass,
    pub completed: Vec<ReloadReport>,
    #[source]
    pub source: Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassStatus {
    pub class: ComponentClass,
    pub state: ComponentState,
    pub count: usize,
    pub last_change: Option<DateTime<Utc>>,
}

/// Who asked for a reload, for the audit trail
#[derive(Debug, Clone, Default)]
pub struct ReloadActor {
    pub user: Option<ActorSnapshot>,
    pub guild: Option<GuildSnapshot>,
}

/// Tracks which commands, events, handlers and collections are live and
/// swaps them on reload.
pub struct LifecycleManager {
    sources: HashMap<ComponentClass, Arc<dyn ComponentSource>>,
    sets: DashMap<ComponentClass, LoadedSet>,
    /// One reload at a time
    reload_lock: Mutex<()>,
    audit: AuditLog,
}

impl LifecycleManager {
    pub fn new(sources: Vec<Arc<dyn ComponentSource>>, audit: AuditLog) -> Self {
        let sets = DashMap::new();
        for class in ComponentClass::ALL {
            sets.insert(class, LoadedSet::empty());
        }

        Self {
            sources: sources.into_iter().map(|s| (s.class(), s)).collect(),
            sets,
            reload_lock: Mutex::new(()),
            audit,
        }
    }

    /// Initial discovery of every class, in reload order. Stops at the first
    /// class that fails to load.
    pub async fn load_all(&self) -> Result<Vec<ReloadReport>, ReloadError> {
        let _guard = self.reload_lock.lock().await;
        let mut completed = Vec::new();

        for class in ComponentClass::ALL {
            match self.swap(class).await {
                Ok(report) => {
                    info!("Loaded {} {}", report.count, class.as_str());
                    completed.push(report);
                }
                Err(source) => {
                    error!("Failed to load {}: {}", class.as_str(), source);
                    return Err(ReloadError {
                        class,
                        completed,
                        source,
                    });
                }
            }
        }

        Ok(completed)
    }

    pub async fn reload(&self, class: ComponentClass, actor: &ReloadActor) -> Result<ReloadReport, Error> {
        let _guard = self.reload_lock.lock().await;
        self.reload_audited(class, None, actor).await
    }

    /// Re-discover `class` and replace only the component called `name`.
    /// A component that is loaded but no longer discovered is removed.
    pub async fn reload_one(
        &self,
        class: ComponentClass,
        name: &str,
        actor: &ReloadActor,
    ) -> Result<ReloadReport, Error> {
        let _guard = self.reload_lock.lock().await;
        self.reload_audited(class, Some(name), actor).await
    }

    /// Reload every class in order. The first failure aborts the sequence;
    /// classes reloaded before it are not rolled back.
    pub async fn reload_all(&self, actor: &ReloadActor) -> Result<Vec<ReloadReport>, ReloadError> {
        let _guard = self.reload_lock.lock().await;
        let mut completed = Vec::new();

        for class in ComponentClass::ALL {
            match self.reload_audited(class, None, actor).await {
                Ok(report) => completed.push(report),
                Err(source) => {
                    return Err(ReloadError {
                        class,
                        completed,
                        source,
                    })
                }
            }
        }

        Ok(completed)
    }

    pub fn is_active(&self, class: ComponentClass, name: &str) -> bool {
        self.sets
            .get(&class)
            .map(|set| set.components.contains_key(name))
            .unwrap_or(false)
    }

    pub fn state(&self, class: ComponentClass) -> ComponentState {
        self.sets
            .get(&class)
            .map(|set| set.state)
            .unwrap_or(ComponentState::Unloaded)
    }

    pub fn names(&self, class: ComponentClass) -> Vec<String> {
        self.sets
            .get(&class)
            .map(|set| set.components.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn components(&self, class: ComponentClass) -> Vec<ComponentDescriptor> {
        self.sets
            .get(&class)
            .map(|set| set.components.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> Vec<ClassStatus> {
        ComponentClass::ALL
            .iter()
            .map(|class| {
                let set = self.sets.get(class);
                ClassStatus {
                    class: *class,
                    state: set.as_ref().map(|s| s.state).unwrap_or(ComponentState::Unloaded),
                    count: set.as_ref().map(|s| s.components.len()).unwrap_or(0),
                    last_change: set.as_ref().and_then(|s| s.last_change),
                }
            })
            .collect()
    }

    pub fn shutdown(&self) {
        for class in ComponentClass::ALL {
            self.sets.insert(class, LoadedSet::empty());
        }
        info!("All components unloaded");
    }

    async fn reload_audited(
        &self,
        class: ComponentClass,
        name: Option<&str>,
        actor: &ReloadActor,
    ) -> Result<ReloadReport, Error> {
        let started = Instant::now();
        let (result, action) = match name {
            Some(name) => (
                self.swap_one(class, name).await,
                format!("Reload {}/{}", class.as_str(), name),
            ),
            None => (self.swap(class).await, format!("Reload {}", class.as_str())),
        };

        let base = NewLogEntry::new("reload", action)
            .guild(actor.guild.clone())
            .details(json!({ "class": class.as_str(), "component": name }));
        let base = match &actor.user {
            Some(user) => base.user(user.clone()),
            None => base,
        };
        let elapsed = started.elapsed().as_millis() as u64;

        let entry = match &result {
            Ok(report) => base
                .kind(LogType::Success)
                .duration_ms(elapsed)
                .changes(report.changes()),
            Err(e) => base.duration_ms(elapsed).failed(e.to_string()),
        };

        // A reload that happened must not be reported as failed because the
        // audit write failed
        if let Err(e) = self.audit.record(RELOAD_LOG, entry).await {
            warn!("Could not record reload of {}: {}", class.as_str(), e);
        }

        result
    }

    /// Discover a class and replace its loaded set
    async fn swap(&self, class: ComponentClass) -> Result<ReloadReport, Error> {
        let started = Instant::now();
        let source = self
            .sources
            .get(&class)
            .cloned()
            .ok_or_else(|| Error::custom(format!("no source registered for {}", class.as_str())))?;

        let previous = self.begin(class);

        let discovered = match source.discover().await {
            Ok(found) => found,
            Err(e) => {
                self.fail(class);
                return Err(e);
            }
        };

        let mut components: BTreeMap<String, ComponentDescriptor> = discovered
            .into_iter()
            .map(|d| (d.name.clone(), d))
            .collect();

        if class == ComponentClass::Events {
            for name in PROTECTED_EVENTS {
                if let Some(kept) = previous.get(*name) {
                    components
                        .entry(name.to_string())
                        .or_insert_with(|| kept.clone());
                }
            }
        }

        let added = components
            .keys()
            .filter(|name| !previous.contains_key(*name))
            .cloned()
            .collect();
        let removed = previous
            .keys()
            .filter(|name| !components.contains_key(*name))
            .cloned()
            .collect();
        let count = components.len();

        self.sets.insert(
            class,
            LoadedSet {
                state: ComponentState::Loaded,
                components,
                last_change: Some(Utc::now()),
            },
        );

        Ok(ReloadReport {
            class,
            count,
            added,
            removed,
            duration: started.elapsed(),
        })
    }

    /// Discover a class and replace a single descriptor, leaving the rest of
    /// the loaded set untouched
    async fn swap_one(&self, class: ComponentClass, name: &str) -> Result<ReloadReport, Error> {
        let started = Instant::now();
        let source = self
            .sources
            .get(&class)
            .cloned()
            .ok_or_else(|| Error::custom(format!("no source registered for {}", class.as_str())))?;

        let was_loaded = self.is_active(class, name);
        let previous_state = {
            let mut set = self.sets.entry(class).or_insert_with(LoadedSet::empty);
            std::mem::replace(&mut set.state, ComponentState::Reloading)
        };

        let discovered = match source.discover().await {
            Ok(found) => found,
            Err(e) => {
                if let Some(mut set) = self.sets.get_mut(&class) {
                    set.state = ComponentState::Failed;
                    set.last_change = Some(Utc::now());
                }
                return Err(e);
            }
        };
        let replacement = discovered.into_iter().find(|d| d.name == name);

        let mut set = self.sets.entry(class).or_insert_with(LoadedSet::empty);
        let (added, removed) = match replacement {
            Some(descriptor) => {
                set.components.insert(name.to_string(), descriptor);
                let added = if was_loaded { Vec::new() } else { vec![name.to_string()] };
                (added, Vec::new())
            }
            None if was_loaded && !(class == ComponentClass::Events && PROTECTED_EVENTS.contains(&name)) => {
                set.components.remove(name);
                (Vec::new(), vec![name.to_string()])
            }
            None if was_loaded => (Vec::new(), Vec::new()),
            None => {
                set.state = previous_state;
                return Err(Error::not_found(format!("{} `{}`", class.as_str(), name)));
            }
        };

        set.state = ComponentState::Loaded;
        set.last_change = Some(Utc::now());

        Ok(ReloadReport {
            class,
            count: 1,
            added,
            removed,
            duration: started.elapsed(),
        })
    }

    /// Mark a class as reloading and return what was loaded before. Events
    /// other than the protected ones are torn down right away.
    fn begin(&self, class: ComponentClass) -> BTreeMap<String, ComponentDescriptor> {
        let mut set = self.sets.entry(class).or_insert_with(LoadedSet::empty);
        let previous = set.components.clone();

        set.state = ComponentState::Reloading;
        if class == ComponentClass::Events {
            set.components
                .retain(|name, _| PROTECTED_EVENTS.contains(&name.as_str()));
        }

        previous
    }

    fn fail(&self, class: ComponentClass) {
        if let Some(mut set) = self.sets.get_mut(&class) {
            set.state = ComponentState::Failed;
            set.last_change = Some(Utc::now());
        }
        if class == ComponentClass::Events {
            warn!("Event reload failed; only protected events remain until the next successful reload or a restart");
        }
    }
}
