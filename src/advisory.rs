//! Context handed to the external visit-advisory text generator.
//!
//! The generator explains and suggests; it never sees individual reports. The
//! only way to build an [`AdvisoryContext`] is from an [`AggregationResult`],
//! so report ids, submitter ids and raw levels cannot leak through it.

use crate::aggregation::AggregationResult;
use crate::report::{CrowdLevel, Office, OfficeKind};
use serde::Serialize;
use time::OffsetDateTime;

/// Coarse UTC part of the day the advisory is requested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
}

impl TimeOfDay {
    pub fn from_hour(hour: u8) -> Self {
        match hour {
            0..12 => TimeOfDay::Morning,
            12..17 => TimeOfDay::Afternoon,
            _ => TimeOfDay::Evening,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvisoryContext {
    pub office_kind: OfficeKind,
    pub city: String,
    pub level: CrowdLevel,
    pub average_wait_minutes: u32,
    pub total_report_count: usize,
    /// Whole minutes since the newest qualifying report.
    pub last_updated_minutes: Option<u64>,
    pub data_source: &'static str,
    pub low_confidence: bool,
    /// Absent when `now` is outside the representable calendar range.
    pub time_of_day: Option<TimeOfDay>,
    pub day_of_week: Option<String>,
}

impl AdvisoryContext {
    pub fn from_result(office: &Office, result: &AggregationResult, now: u64) -> Self {
        let requested_at =
            OffsetDateTime::from_unix_timestamp_nanos(i128::from(now) * 1_000_000).ok();
        Self {
            office_kind: office.kind,
            city: office.city.clone(),
            level: result.level,
            average_wait_minutes: result.average_wait_minutes,
            total_report_count: result.total_report_count,
            last_updated_minutes: result
                .last_updated_at
                .map(|updated| now.saturating_sub(updated) / 60_000),
            data_source: result.data_source(),
            low_confidence: result.is_low_confidence(),
            time_of_day: requested_at.map(|at| TimeOfDay::from_hour(at.hour())),
            day_of_week: requested_at.map(|at| at.weekday().to_string()),
        }
    }
}
