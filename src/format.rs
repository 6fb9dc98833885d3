//! Relative age labels for report timestamps.

use crate::aggregation::now_millis;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tracing::warn;

const MINUTE_MS: u64 = 60_000;
const HOUR_MS: u64 = 3_600_000;
const DAY_MS: u64 = 86_400_000;
const WEEK_MS: u64 = 7 * DAY_MS;

/// e.g. `5 Mar 2024`
const CALENDAR_DATE: &[BorrowedFormatItem<'static>] =
    format_description!("[day padding:none] [month repr:short] [year]");

/// Render the age of `timestamp` relative to `now`, both in epoch milliseconds.
///
/// Timestamps at or after `now` read as `"Just now"`. Anything a week or older
/// falls back to an absolute UTC calendar date.
pub fn format_age(timestamp: u64, now: u64) -> String {
    let age_ms = now.saturating_sub(timestamp);

    if age_ms < MINUTE_MS {
        "Just now".to_string()
    } else if age_ms < HOUR_MS {
        ago(age_ms / MINUTE_MS, "minute")
    } else if age_ms < DAY_MS {
        ago(age_ms / HOUR_MS, "hour")
    } else if age_ms < WEEK_MS {
        ago(age_ms / DAY_MS, "day")
    } else {
        calendar_date(timestamp)
    }
}

pub fn format_age_now(timestamp: u64) -> String {
    format_age(timestamp, now_millis())
}

fn ago(count: u64, unit: &str) -> String {
    if count == 1 {
        format!("{count} {unit} ago")
    } else {
        format!("{count} {unit}s ago")
    }
}

fn calendar_date(timestamp: u64) -> String {
    let nanos = i128::from(timestamp) * 1_000_000;
    let formatted = OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .map_err(|err| err.to_string())
        .and_then(|datetime| datetime.format(CALENDAR_DATE).map_err(|err| err.to_string()));

    match formatted {
        Ok(date) => date,
        Err(err) => {
            warn!(timestamp, error = %err, "Failed to format report date");
            "Unknown date".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-03-13T12:00:00Z
    const NOW: u64 = 1_710_331_200_000;

    #[test]
    fn under_a_minute_is_just_now() {
        assert_eq!(format_age(NOW - 30_000, NOW), "Just now");
        assert_eq!(format_age(NOW, NOW), "Just now");
    }

    #[test]
    fn future_timestamp_is_just_now() {
        assert_eq!(format_age(NOW + 3_600_000, NOW), "Just now");
    }

    #[test]
    fn minutes_are_floored_and_pluralized() {
        assert_eq!(format_age(NOW - 90_000, NOW), "1 minute ago");
        assert_eq!(format_age(NOW - 120_000, NOW), "2 minutes ago");
        assert_eq!(format_age(NOW - 3_599_999, NOW), "59 minutes ago");
    }

    #[test]
    fn hours_and_days() {
        assert_eq!(format_age(NOW - 3_600_000, NOW), "1 hour ago");
        assert_eq!(format_age(NOW - 7_200_000, NOW), "2 hours ago");
        assert_eq!(format_age(NOW - DAY_MS, NOW), "1 day ago");
        assert_eq!(format_age(NOW - 6 * DAY_MS, NOW), "6 days ago");
    }

    #[test]
    fn a_week_or_older_is_a_calendar_date() {
        assert_eq!(format_age(NOW - 8 * DAY_MS, NOW), "5 Mar 2024");
        assert_eq!(format_age(NOW - WEEK_MS, NOW), "6 Mar 2024");
    }

    #[test]
    fn epoch_formats_as_date() {
        assert_eq!(format_age(0, NOW), "1 Jan 1970");
    }

    #[test]
    fn format_age_now_reads_the_system_clock() {
        let now = now_millis();

        assert_eq!(format_age_now(now), "Just now");
        assert_eq!(format_age_now(now - 5 * MINUTE_MS - 1_000), "5 minutes ago");
        assert_eq!(format_age_now(0), "1 Jan 1970");
    }
}
