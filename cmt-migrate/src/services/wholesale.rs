//! Wholesale/bulk listing detection
//!
//! Bulk listings (packs, cases, lots, piece counts) are not migrated. When
//! enabled they are recorded in `skipped` before work is distributed; this is
//! the only place that produces `skipped` entries.

use crate::models::{MigrationState, SourceRecord};
use regex::RegexSet;
use std::sync::LazyLock;
use tracing::{debug, info};

/// Matched against the lowercased title
static WHOLESALE_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\bpack\b",
        r"\bpacks\b",
        r"\bbulk\b",
        r"\bwholesale\b",
        r"\b\d+[\-\s]?pack\b",
        r"\b\d+[\-\s]?packs\b",
        r"\bcase\b",
        r"\bbox\b",
        r"\blot\b",
        r"\b\d+\s*(pc|pcs|piece|pieces|ct|count)\b",
    ])
    .expect("wholesale patterns are valid")
});

/// Whether a title describes a wholesale or bulk listing
///
/// Matches whole words (`pack`, `bulk`, `case`, ...), `12-pack` /
/// `12pack` forms, and piece counts such as `50 pcs` or `10ct`.
pub fn is_wholesale(title: &str) -> bool {
    WHOLESALE_PATTERNS.is_match(&title.to_lowercase())
}

/// Record wholesale listings in `skipped`; returns how many were newly skipped
///
/// Records already decided are left untouched.
pub fn mark_wholesale_skips(records: &[SourceRecord], state: &mut MigrationState) -> usize {
    let mut newly_skipped = 0;
    for record in records {
        if state.is_decided(&record.id) || !is_wholesale(&record.name) {
            continue;
        }
        debug!(source_id = %record.id, title = %record.name, "Skipping wholesale listing");
        state.record_skipped(&record.id);
        newly_skipped += 1;
    }

    if newly_skipped > 0 {
        info!(count = newly_skipped, "Wholesale listings marked as skipped");
    }
    newly_skipped
}
