//! Wall-clock timestamps.
//!
//! Token expirations, heartbeats and game start times are compared across
//! processes, so they use Unix time rather than a monotonic clock.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub type UnixMillis = u64;

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// A clock set before 1970 reads as `0`.
pub fn unix_millis() -> UnixMillis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as UnixMillis)
        .unwrap_or(0)
}
