//! Crowd aggregation engine.
//!
//! Reduces the reports for one office into a single [`AggregationResult`]:
//! reports are windowed by age, narrowed to the most trusted source tier, and
//! then voted on with user reports weighted double. Every function here is pure
//! and total; empty input yields the neutral defaults.

use crate::report::{CrowdLevel, Report};
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

pub mod policy;

pub use policy::{SourcePolicy, select_authoritative_subset};

pub const DEFAULT_WINDOW_MINUTES: u32 = 60;
pub const DEFAULT_LEVEL: CrowdLevel = CrowdLevel::Medium;
pub const DEFAULT_WAIT_MINUTES: u32 = 30;
/// Below this many windowed reports the estimate is flagged as low confidence.
pub const LOW_CONFIDENCE_REPORT_COUNT: usize = 3;

const MILLIS_PER_MINUTE: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregationResult {
    pub level: CrowdLevel,
    pub average_wait_minutes: u32,
    /// Reports inside the window, before source selection.
    pub total_report_count: usize,
    pub user_report_count: usize,
    pub last_updated_at: Option<u64>,
    pub window_minutes: u32,
}

impl AggregationResult {
    pub fn empty(window_minutes: u32) -> Self {
        Self {
            level: DEFAULT_LEVEL,
            average_wait_minutes: DEFAULT_WAIT_MINUTES,
            total_report_count: 0,
            user_report_count: 0,
            last_updated_at: None,
            window_minutes,
        }
    }

    pub fn is_low_confidence(&self) -> bool {
        self.total_report_count < LOW_CONFIDENCE_REPORT_COUNT
    }

    /// `"user"` when live reports contributed, `"seed"` otherwise.
    pub fn data_source(&self) -> &'static str {
        if self.user_report_count > 0 {
            "user"
        } else {
            "seed"
        }
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Reports no older than `window_minutes` relative to `now`.
///
/// Future-dated reports are kept; unknown timestamps count as `now`.
pub fn filter_by_window(reports: &[Report], window_minutes: u32, now: u64) -> Vec<&Report> {
    let window_ms = u64::from(window_minutes) * MILLIS_PER_MINUTE;
    reports
        .iter()
        .filter(|report| {
            let timestamp = report.effective_timestamp(now);
            if timestamp > now {
                debug!(
                    report_id = %report.id,
                    skew_ms = timestamp - now,
                    "Accepting future-dated report"
                );
            }
            now.saturating_sub(timestamp) <= window_ms
        })
        .collect()
}

/// Weighted plurality vote; ties resolve toward the more crowded level.
pub fn compute_level<'a>(subset: impl IntoIterator<Item = &'a Report>) -> CrowdLevel {
    let mut low = 0u64;
    let mut medium = 0u64;
    let mut high = 0u64;
    let mut seen = false;

    for report in subset {
        seen = true;
        let weight = report.source.weight();
        match report.level {
            CrowdLevel::Low => low += weight,
            CrowdLevel::Medium => medium += weight,
            CrowdLevel::High => high += weight,
        }
    }

    if !seen {
        return DEFAULT_LEVEL;
    }

    if high >= medium && high >= low {
        CrowdLevel::High
    } else if medium >= low {
        CrowdLevel::Medium
    } else {
        CrowdLevel::Low
    }
}

/// Weighted mean of canonical wait times, rounded half up.
pub fn compute_average_wait_minutes<'a>(subset: impl IntoIterator<Item = &'a Report>) -> u32 {
    let mut weighted_minutes = 0u64;
    let mut total_weight = 0u64;

    for report in subset {
        let weight = report.source.weight();
        weighted_minutes += u64::from(report.level.canonical_wait_minutes()) * weight;
        total_weight += weight;
    }

    if total_weight == 0 {
        return DEFAULT_WAIT_MINUTES;
    }

    round_half_up(weighted_minutes, total_weight) as u32
}

/// Canonical wait for a single level, without any report data.
pub fn estimate_wait_for_level(level: CrowdLevel) -> u32 {
    level.canonical_wait_minutes()
}

pub fn last_updated_at<'a>(
    reports: impl IntoIterator<Item = &'a Report>,
    now: u64,
) -> Option<u64> {
    reports
        .into_iter()
        .map(|report| report.effective_timestamp(now))
        .max()
}

pub fn aggregate(reports: &[Report], window_minutes: u32, now: u64) -> AggregationResult {
    aggregate_with_policy(reports, window_minutes, now, SourcePolicy::Override)
}

pub fn aggregate_now(reports: &[Report], window_minutes: u32) -> AggregationResult {
    aggregate(reports, window_minutes, now_millis())
}

pub fn aggregate_with_policy(
    reports: &[Report],
    window_minutes: u32,
    now: u64,
    policy: SourcePolicy,
) -> AggregationResult {
    let windowed = filter_by_window(reports, window_minutes, now);
    if windowed.is_empty() {
        debug!(
            supplied = reports.len(),
            window_minutes, "No reports inside aggregation window"
        );
        return AggregationResult::empty(window_minutes);
    }

    let subset = policy.select(&windowed);
    let user_report_count = windowed.iter().filter(|r| r.source.is_user()).count();

    debug!(
        total = windowed.len(),
        user = user_report_count,
        other = windowed.len() - user_report_count,
        used = subset.len(),
        window_minutes,
        ?policy,
        "Aggregating crowd reports"
    );

    AggregationResult {
        level: compute_level(subset.iter().copied()),
        average_wait_minutes: compute_average_wait_minutes(subset.iter().copied()),
        total_report_count: windowed.len(),
        user_report_count,
        last_updated_at: last_updated_at(windowed.iter().copied(), now),
        window_minutes,
    }
}

fn round_half_up(numerator: u64, denominator: u64) -> u64 {
    (2 * numerator + denominator) / (2 * denominator)
}
