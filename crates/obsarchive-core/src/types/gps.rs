//! GPS time helpers. Observation ids are GPS seconds.

use chrono::{DateTime, Utc};

/// Unix timestamp of the GPS epoch, 1980-01-06T00:00:00Z.
const GPS_EPOCH_UNIX: i64 = 315_964_800;

/// Leap seconds accumulated between the GPS epoch and now.
const LEAP_SECONDS: i64 = 18;

/// Convert a UTC instant to GPS seconds.
pub fn to_gps_seconds(at: DateTime<Utc>) -> i64 {
    at.timestamp() - GPS_EPOCH_UNIX + LEAP_SECONDS
}

/// Current GPS time in seconds.
pub fn gps_now() -> i64 {
    to_gps_seconds(Utc::now())
}
