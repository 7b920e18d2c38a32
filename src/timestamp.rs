//! Conversion between store timestamps and UTC.
//!
//! The store counts from 2001-01-01T00:00:00Z. Current schemas use
//! nanoseconds; very old ones used whole seconds.

use chrono::{DateTime, Utc};

/// Seconds between the Unix epoch and 2001-01-01T00:00:00Z.
pub const APPLE_EPOCH_OFFSET_SECS: i64 = 978_307_200;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Values below this magnitude are legacy second counts. One hundred billion
/// seconds is roughly 3,000 years, while the same count in nanoseconds is
/// under two minutes past the epoch.
const LEGACY_SECONDS_THRESHOLD: i64 = 100_000_000_000;

/// Convert a raw store timestamp to UTC.
#[must_use]
pub fn from_store_time(raw: i64) -> DateTime<Utc> {
    let (secs, nanos) = if raw.abs() < LEGACY_SECONDS_THRESHOLD {
        (raw, 0)
    } else {
        (raw.div_euclid(NANOS_PER_SEC), raw.rem_euclid(NANOS_PER_SEC))
    };
    let nanos = u32::try_from(nanos).unwrap_or(0);
    DateTime::from_timestamp(secs + APPLE_EPOCH_OFFSET_SECS, nanos).unwrap_or_default()
}

/// Convert UTC to a store timestamp in nanoseconds.
#[must_use]
pub fn to_store_time(dt: DateTime<Utc>) -> i64 {
    let secs = dt.timestamp() - APPLE_EPOCH_OFFSET_SECS;
    secs.saturating_mul(NANOS_PER_SEC)
        .saturating_add(i64::from(dt.timestamp_subsec_nanos()))
}

/// SQL expression normalizing a raw store time `column` to nanoseconds, so
/// window bounds from [`to_store_time`] compare correctly against legacy rows.
#[must_use]
pub fn sql_nanos(column: &str) -> String {
    format!(
        "(CASE WHEN ABS({column}) < {LEGACY_SECONDS_THRESHOLD} \
         THEN {column} * {NANOS_PER_SEC} ELSE {column} END)"
    )
}
