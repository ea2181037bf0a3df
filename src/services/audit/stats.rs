use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::db::models::AuditLogEntry;

/// Aggregates over one audit collection
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogStats {
    pub total: usize,
    /// Since UTC midnight
    pub today: usize,
    /// Within the last 7 days
    pub this_week: usize,
    /// Percentage of successful entries, two decimals, 0 when empty
    pub success_rate: f64,
    /// Mean of recorded durations, rounded, 0 when none recorded
    pub average_duration_ms: u64,
    pub by_type: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
}

pub fn compute(entries: &[AuditLogEntry], now: DateTime<Utc>) -> LogStats {
    let mut stats = LogStats {
        total: entries.len(),
        ..LogStats::default()
    };

    if entries.is_empty() {
        return stats;
    }

    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|t| t.and_utc())
        .unwrap_or(now);
    let week_ago = now - Duration::days(7);

    let mut successes = 0usize;
    let mut duration_sum = 0u64;
    let mut duration_count = 0u64;

    for entry in entries {
        if entry.timestamp >= midnight {
            stats.today += 1;
        }
        if entry.timestamp >= week_ago {
            stats.this_week += 1;
        }
        if entry.success {
            successes += 1;
        }
        if let Some(ms) = entry.duration_ms {
            duration_sum += ms;
            duration_count += 1;
        }

        *stats.by_type.entry(entry.kind.to_string()).or_default() += 1;
        *stats.by_category.entry(entry.category.clone()).or_default() += 1;
    }

    let rate = successes as f64 / entries.len() as f64 * 100.0;
    stats.success_rate = (rate * 100.0).round() / 100.0;

    if duration_count > 0 {
        stats.average_duration_ms = (duration_sum as f64 / duration_count as f64).round() as u64;
    }

    stats
}
