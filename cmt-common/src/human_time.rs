//! Human-readable duration formatting
//!
//! Used for progress lines and run summaries. Format is picked by magnitude:
//! - `< 100s`   → `X.Xs`
//! - `< 100m`   → `Mm SSs`
//! - `< 25h`    → `Hh MMm`
//! - otherwise  → `Dd HHh`

use std::time::Duration;

const SHORT_FORMAT_MAX: u64 = 100;
const MEDIUM_FORMAT_MAX: u64 = 6_000;
const LONG_FORMAT_MAX: u64 = 90_000;

/// Format a duration for operator display
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use cmt_common::human_time::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(4500)), "4.5s");
/// assert_eq!(format_duration(Duration::from_secs(330)), "5m 30s");
/// assert_eq!(format_duration(Duration::from_secs(7500)), "2h 05m");
/// assert_eq!(format_duration(Duration::from_secs(97_200)), "1d 03h");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();

    if secs < SHORT_FORMAT_MAX {
        format!("{:.1}s", duration.as_secs_f64())
    } else if secs < MEDIUM_FORMAT_MAX {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else if secs < LONG_FORMAT_MAX {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {:02}h", secs / 86_400, (secs % 86_400) / 3600)
    }
}

/// Format an optional estimate; `None` renders as `"unknown"`
pub fn format_eta(eta: Option<Duration>) -> String {
    match eta {
        Some(duration) => format_duration(duration),
        None => "unknown".to_string(),
    }
}
