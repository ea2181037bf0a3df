use std::time::Duration;

/// Interactive confirmations (reload, destructive owner actions)
pub const CONFIRMATION_TTL: Duration = Duration::from_secs(60);

/// Paginated controls such as the case history
pub const PAGINATION_TTL: Duration = Duration::from_secs(5 * 60);

/// An interaction token can be used for follow-ups for 15 minutes
pub const INTERACTION_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

/// How often expired callbacks are dropped
pub const CALLBACK_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// How often the reload log retention runs
pub const LOG_RETENTION_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Remote fetches: attempts, per-attempt limit, first backoff step
pub const FETCH_ATTEMPTS: u32 = 3;
pub const FETCH_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);
pub const FETCH_BASE_BACKOFF: Duration = Duration::from_secs(2);

/// Minimum gap between progress edits of a conversion reply
pub const PROGRESS_EDIT_INTERVAL: Duration = Duration::from_secs(5);

/// Format duration for display
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();

    if total_secs < 60 {
        format!("{} seconds", total_secs)
    } else if total_secs < 3600 {
        let mins = total_secs / 60;
        format!("{} minute{}", mins, if mins == 1 { "" } else { "s" })
    } else if total_secs < 86400 {
        let hours = total_secs / 3600;
        format!("{} hour{}", hours, if hours == 1 { "" } else { "s" })
    } else {
        let days = total_secs / 86400;
        format!("{} day{}", days, if days == 1 { "" } else { "s" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(45)), "45 seconds");
        assert_eq!(format_duration(Duration::from_secs(60)), "1 minute");
        assert_eq!(format_duration(Duration::from_secs(90 * 60)), "1 hour");
        assert_eq!(format_duration(Duration::from_secs(28 * 86400)), "28 days");
    }
}
