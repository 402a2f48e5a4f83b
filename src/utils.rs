/// Utility functions for unit conversion, aggregation and formatting
use time::{format_description, OffsetDateTime};

const DEGREES_PER_RADIAN: f64 = 57.2958;
const KELVIN_OFFSET: f64 = 273.15;

const SECONDS_PER_YEAR: u64 = 31_536_000;
const SECONDS_PER_MONTH: u64 = 2_592_000;
const SECONDS_PER_DAY: u64 = 86_400;
const SECONDS_PER_HOUR: u64 = 3_600;
const SECONDS_PER_MINUTE: u64 = 60;

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    match format_description::parse("[day].[month].[year] - [hour]:[minute]:[second]") {
        Ok(format) => dt.format(&format).unwrap_or_else(|_| dt.to_string()),
        Err(_) => dt.to_string(),
    }
}

/// Convert a time::Duration to seconds as u64
///
/// Negative durations (clock moved backwards) count as zero.
pub fn duration_to_seconds(duration: time::Duration) -> u64 {
    duration.whole_seconds().max(0) as u64
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn radians_to_degrees(rad: f64) -> f64 {
    rad * DEGREES_PER_RADIAN
}

pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - KELVIN_OFFSET
}

/// Median of a sample set
///
/// Odd-length sets yield the middle element after an ascending sort,
/// even-length sets the mean of the two middle elements.
/// Returns None for an empty set.
pub fn median(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Describe an elapsed duration using the largest calendar bucket it exceeds
///
/// Buckets are years, months, days, hours, minutes, seconds. A bucket
/// applies only when the elapsed time is strictly larger than one unit of
/// it, so exactly one hour reads as "60 minutes".
pub fn time_since(elapsed: time::Duration) -> String {
    let seconds = duration_to_seconds(elapsed);

    if seconds > SECONDS_PER_YEAR {
        return format!("{} years", seconds / SECONDS_PER_YEAR);
    }
    if seconds > SECONDS_PER_MONTH {
        return format!("{} months", seconds / SECONDS_PER_MONTH);
    }
    if seconds > SECONDS_PER_DAY {
        return format!("{} days", seconds / SECONDS_PER_DAY);
    }
    if seconds > SECONDS_PER_HOUR {
        return pluralize(seconds / SECONDS_PER_HOUR, "hour");
    }
    if seconds > SECONDS_PER_MINUTE {
        return pluralize(seconds / SECONDS_PER_MINUTE, "minute");
    }
    format!("{} seconds", seconds)
}

fn pluralize(count: u64, unit: &str) -> String {
    if count == 1 {
        format!("{} {}", count, unit)
    } else {
        format!("{} {}s", count, unit)
    }
}
