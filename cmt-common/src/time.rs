//! Timestamp utilities

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert a (possibly fractional) number of seconds to a duration
///
/// Platforms send wait hints like `"2"` or `"1.5"`. Negative, NaN and
/// infinite values yield `None` so callers fall back to their default.
pub fn secs_f64_to_duration(secs: f64) -> Option<Duration> {
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}
