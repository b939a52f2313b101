//! Persisted migration state
//!
//! Three disjoint maps keyed by source id. Every mutator removes the id from
//! the other two maps before inserting, so an id is never in more than one.
//!
//! On-disk shape (camelCase):
//! ```json
//! {
//!   "completed": { "<sourceId>": { "targetId": "...", "status": "draft", "subResourceCount": 2, "timestamp": "..." } },
//!   "failed":    { "<sourceId>": { "error": "...", "timestamp": "..." } },
//!   "skipped":   { "<sourceId>": { "timestamp": "..." } },
//!   "startedAt": "...",
//!   "lastUpdate": "..."
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Visibility of a target record on the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    /// Visible to shoppers
    Active,
    /// Created but hidden
    Draft,
}

impl PublishStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStatus::Active => "active",
            PublishStatus::Draft => "draft",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedEntry {
    pub target_id: String,
    pub status: PublishStatus,
    pub sub_resource_count: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedEntry {
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub timestamp: DateTime<Utc>,
}

/// Counts per map, for status output and summaries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl StateCounts {
    pub fn total(&self) -> usize {
        self.completed + self.failed + self.skipped
    }
}

/// The sole mutable, persisted entity of a migration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationState {
    #[serde(default)]
    completed: BTreeMap<String, CompletedEntry>,
    #[serde(default)]
    failed: BTreeMap<String, FailedEntry>,
    #[serde(default)]
    skipped: BTreeMap<String, SkippedEntry>,
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    last_update: Option<DateTime<Utc>>,
}

impl MigrationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp `startedAt` the first time a run begins; later runs keep it
    pub fn mark_started(&mut self) {
        let now = Utc::now();
        self.started_at.get_or_insert(now);
        self.last_update = Some(now);
    }

    /// Completed or skipped: no further work on this id
    pub fn is_decided(&self, source_id: &str) -> bool {
        self.completed.contains_key(source_id) || self.skipped.contains_key(source_id)
    }

    pub fn is_failed(&self, source_id: &str) -> bool {
        self.failed.contains_key(source_id)
    }

    pub fn record_completed(
        &mut self,
        source_id: &str,
        target_id: impl Into<String>,
        status: PublishStatus,
        sub_resource_count: usize,
    ) {
        let timestamp = self.touch();
        self.failed.remove(source_id);
        self.skipped.remove(source_id);
        self.completed.insert(
            source_id.to_string(),
            CompletedEntry {
                target_id: target_id.into(),
                status,
                sub_resource_count,
                timestamp,
            },
        );
    }

    pub fn record_failed(&mut self, source_id: &str, error: impl Into<String>) {
        let timestamp = self.touch();
        self.completed.remove(source_id);
        self.skipped.remove(source_id);
        self.failed.insert(
            source_id.to_string(),
            FailedEntry {
                error: error.into(),
                timestamp,
            },
        );
    }

    pub fn record_skipped(&mut self, source_id: &str) {
        let timestamp = self.touch();
        self.completed.remove(source_id);
        self.failed.remove(source_id);
        self.skipped
            .insert(source_id.to_string(), SkippedEntry { timestamp });
    }

    pub fn completed(&self) -> &BTreeMap<String, CompletedEntry> {
        &self.completed
    }

    pub fn failed(&self) -> &BTreeMap<String, FailedEntry> {
        &self.failed
    }

    pub fn skipped(&self) -> &BTreeMap<String, SkippedEntry> {
        &self.skipped
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn counts(&self) -> StateCounts {
        StateCounts {
            completed: self.completed.len(),
            failed: self.failed.len(),
            skipped: self.skipped.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts().total() == 0
    }

    /// Ids present in more than one map
    ///
    /// Always empty for states built through the mutators; a hand-edited or
    /// foreign state file can violate it, so loaders check.
    pub fn overlapping_ids(&self) -> Vec<String> {
        let mut overlaps: Vec<String> = self
            .completed
            .keys()
            .filter(|id| self.failed.contains_key(*id) || self.skipped.contains_key(*id))
            .cloned()
            .collect();
        overlaps.extend(
            self.failed
                .keys()
                .filter(|id| self.skipped.contains_key(*id))
                .cloned(),
        );
        overlaps.sort();
        overlaps.dedup();
        overlaps
    }

    fn touch(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        self.last_update = Some(now);
        now
    }
}
