use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serenity::all::{ComponentInteraction, Context};
use tracing::debug;
use uuid::Uuid;

use crate::bot::error::Error;

/// Custom ids routed through the registry look like `cb:<token>:<action>`
pub const CUSTOM_ID_PREFIX: &str = "cb";

pub type CallbackFuture = Pin<Box<dyn Future<Output = Result<(), Error>> + Send>>;
pub type Callback<A> = Arc<dyn Fn(A) -> CallbackFuture + Send + Sync>;

/// What a button press hands to its callback
#[derive(Clone)]
pub struct ComponentCall {
    pub ctx: Context,
    pub interaction: ComponentInteraction,
    pub action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteOutcome {
    Executed,
    Expired,
    NotFound,
}

struct Entry<A> {
    callback: Callback<A>,
    expires_at: Instant,
    /// Single-use entries are dropped when executed
    once: bool,
}

/// Pending interactive callbacks keyed by an opaque token
pub struct CallbackRegistry<A> {
    entries: DashMap<String, Entry<A>>,
}

impl<A> Default for CallbackRegistry<A> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<A: Send + 'static> CallbackRegistry<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a callback and return its token
    pub fn register<F, Fut>(&self, ttl: Duration, once: bool, callback: F) -> String
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        let token = Uuid::new_v4().simple().to_string();
        let callback: Callback<A> = Arc::new(move |args| Box::pin(callback(args)));

        self.entries.insert(
            token.clone(),
            Entry {
                callback,
                expires_at: Instant::now() + ttl,
                once,
            },
        );

        token
    }

    pub async fn execute(&self, token: &str, args: A) -> Result<ExecuteOutcome, Error> {
        let now = Instant::now();

        // Single-use and expired entries leave the map in the same step they
        // are looked up, so a second press can never claim them
        if let Some((_, entry)) = self
            .entries
            .remove_if(token, |_, entry| entry.once || now >= entry.expires_at)
        {
            if now >= entry.expires_at {
                return Ok(ExecuteOutcome::Expired);
            }
            (entry.callback)(args).await?;
            return Ok(ExecuteOutcome::Executed);
        }

        let callback = {
            let Some(entry) = self.entries.get(token) else {
                return Ok(ExecuteOutcome::NotFound);
            };
            if now >= entry.expires_at {
                drop(entry);
                self.entries.remove(token);
                return Ok(ExecuteOutcome::Expired);
            }
            entry.callback.clone()
        };

        callback(args).await?;
        Ok(ExecuteOutcome::Executed)
    }

    /// Drop every expired entry, returning how many were dropped
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let swept = before.saturating_sub(self.entries.len());

        if swept > 0 {
            debug!("Swept {} expired callbacks", swept);
        }
        swept
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn custom_id(token: &str, action: &str) -> String {
    format!("{}:{}:{}", CUSTOM_ID_PREFIX, token, action)
}

/// Split a registry custom id into `(token, action)`
pub fn parse_custom_id(custom_id: &str) -> Option<(&str, &str)> {
    let rest = custom_id.strip_prefix(CUSTOM_ID_PREFIX)?.strip_prefix(':')?;
    let (token, action) = rest.split_once(':')?;

    if token.is_empty() {
        return None;
    }
    Some((token, action))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting(registry: &CallbackRegistry<usize>, ttl: Duration, once: bool) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let token = registry.register(ttl, once, move |n: usize| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(n, Ordering::SeqCst);
                Ok(())
            }
        });
        (token, hits)
    }

    #[tokio::test]
    async fn test_execute_once() {
        let registry = CallbackRegistry::new();
        let (token, hits) = counting(&registry, Duration::from_secs(60), true);

        assert_eq!(registry.execute(&token, 2).await.unwrap(), ExecuteOutcome::Executed);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(registry.execute(&token, 2).await.unwrap(), ExecuteOutcome::NotFound);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_use_callback_runs_once_under_concurrent_presses() {
        let registry = Arc::new(CallbackRegistry::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let token = registry.register(Duration::from_secs(60), true, move |_: usize| {
            let counter = counter.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let presses: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                let token = token.clone();
                tokio::spawn(async move { registry.execute(&token, 1).await.unwrap() })
            })
            .collect();

        let mut executed = 0;
        for press in presses {
            if press.await.unwrap() == ExecuteOutcome::Executed {
                executed += 1;
            }
        }

        assert_eq!(executed, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_reusable_callback() {
        let registry = CallbackRegistry::new();
        let (token, hits) = counting(&registry, Duration::from_secs(300), false);

        for _ in 0..3 {
            assert_eq!(registry.execute(&token, 1).await.unwrap(), ExecuteOutcome::Executed);
        }
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_callback_is_not_run() {
        let registry = CallbackRegistry::new();
        let (token, hits) = counting(&registry, Duration::ZERO, true);

        assert_eq!(registry.execute(&token, 1).await.unwrap(), ExecuteOutcome::Expired);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let registry: CallbackRegistry<usize> = CallbackRegistry::new();
        assert_eq!(registry.execute("nope", 1).await.unwrap(), ExecuteOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_callback_error_propagates() {
        let registry = CallbackRegistry::new();
        let token = registry.register(Duration::from_secs(60), true, |_: usize| async {
            Err(Error::custom("failed"))
        });

        assert!(registry.execute(&token, 0).await.is_err());
    }

    #[test]
    fn test_sweep_expired() {
        let registry = CallbackRegistry::new();
        counting(&registry, Duration::ZERO, true);
        counting(&registry, Duration::ZERO, false);
        counting(&registry, Duration::from_secs(60), true);

        assert_eq!(registry.sweep_expired(), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_custom_id_round_trip() {
        let id = custom_id("abc123", "next");
        assert_eq!(id, "cb:abc123:next");
        assert_eq!(parse_custom_id(&id), Some(("abc123", "next")));
        assert_eq!(parse_custom_id("ban_select:1"), None);
        assert_eq!(parse_custom_id("cb::next"), None);
    }
}
