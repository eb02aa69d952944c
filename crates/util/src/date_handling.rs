//! # Date Handling Utilities
//!
//! This module provides utilities for rendering execution timestamps in the
//! log listings: a compact stamp for detailed views and a coarse relative age
//! for one-line summaries.

use chrono::{DateTime, Utc};

/// Formats a timestamp as a compact stamp such as `Mar  4 15:04:05`.
///
/// # Arguments
/// * `date_time` - The timestamp to format
///
/// # Returns
/// The month abbreviation, space-padded day and 24-hour time
///
/// # Example
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use runbook_util::date_handling::format_stamp;
///
/// let date_time = Utc.with_ymd_and_hms(2024, 3, 4, 15, 4, 5).unwrap();
/// assert_eq!(format_stamp(&date_time), "Mar  4 15:04:05");
/// ```
pub fn format_stamp(date_time: &DateTime<Utc>) -> String {
    date_time.format("%b %e %H:%M:%S").to_string()
}

/// Renders how long ago `then` happened relative to `now`.
///
/// Picks the largest whole unit (days, hours, minutes, seconds). Timestamps in
/// the future are reported as `0 seconds`.
///
/// # Arguments
/// * `then` - The earlier instant
/// * `now` - The reference instant
///
/// # Returns
/// A human readable duration without the trailing `ago`
///
/// # Example
/// ```rust
/// use chrono::{Duration, Utc};
/// use runbook_util::date_handling::humanize_age;
///
/// let now = Utc::now();
/// assert_eq!(humanize_age(now - Duration::minutes(3), now), "3 minutes");
/// assert_eq!(humanize_age(now - Duration::hours(1), now), "1 hour");
/// ```
pub fn humanize_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    let seconds = elapsed.num_seconds().max(0);

    let (amount, unit) = if seconds >= 86_400 {
        (seconds / 86_400, "day")
    } else if seconds >= 3_600 {
        (seconds / 3_600, "hour")
    } else if seconds >= 60 {
        (seconds / 60, "minute")
    } else {
        (seconds, "second")
    };

    if amount == 1 { format!("1 {unit}") } else { format!("{amount} {unit}s") }
}
