use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::bot::error::Error;
use crate::constants::timeouts::{FETCH_ATTEMPTS, FETCH_ATTEMPT_TIMEOUT, FETCH_BASE_BACKOFF};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub attempt_timeout: Duration,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: FETCH_ATTEMPTS,
            attempt_timeout: FETCH_ATTEMPT_TIMEOUT,
            base_backoff: FETCH_BASE_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Wait after the given failed attempt (1-based): base, 2x base, 4x base...
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.base_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Run `op` until it succeeds, giving each attempt `attempt_timeout` and
/// sleeping an exponential backoff in between. The last error is returned.
pub async fn retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T, Error>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let attempts = policy.attempts.max(1);

    for attempt in 1..=attempts {
        let outcome = tokio::time::timeout(policy.attempt_timeout, op(attempt)).await;

        let error = match outcome {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_) => Error::ExternalService(format!(
                "{} timed out after {}s",
                label,
                policy.attempt_timeout.as_secs()
            )),
        };

        if attempt == attempts {
            return Err(error);
        }

        let wait = policy.backoff_for(attempt);
        warn!(
            "{} failed (attempt {}/{}): {}. Retrying in {:?}",
            label, attempt, attempts, error, wait
        );
        tokio::time::sleep(wait).await;
    }

    Err(Error::ExternalService(format!("{}: no attempts made", label)))
}
