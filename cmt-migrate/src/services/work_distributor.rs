//! Work distribution across workers
//!
//! The to-do list is fixed when the distributor is built. A single atomic
//! cursor is the only point of mutation: each `next()` is one `fetch_add`,
//! so concurrent callers never receive the same position and never skip one.

use crate::models::{MigrationState, SourceRecord};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Which previously-seen records to hand out again
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DistributionFilter {
    /// Leave records in `failed` alone instead of retrying them
    pub exclude_failed: bool,
}

/// One record assigned to one worker
#[derive(Debug, Clone)]
pub struct Assignment<'a> {
    /// Position in the to-do list (0-based, unique per distributor)
    pub position: usize,
    /// Position in the original input slice
    pub source_index: usize,
    pub record: &'a SourceRecord,
}

pub struct WorkDistributor {
    records: Arc<[SourceRecord]>,
    todo: Vec<usize>,
    cursor: AtomicUsize,
}

impl WorkDistributor {
    /// Distribute every record in input order
    pub fn new(records: Arc<[SourceRecord]>) -> Self {
        let todo = (0..records.len()).collect();
        Self {
            records,
            todo,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Distribute only records the state has not decided yet
    ///
    /// Completed and skipped records are left out; failed records stay in
    /// unless the filter excludes them.
    pub fn from_state(
        records: Arc<[SourceRecord]>,
        state: &MigrationState,
        filter: DistributionFilter,
    ) -> Self {
        let todo = records
            .iter()
            .enumerate()
            .filter(|(_, record)| !state.is_decided(&record.id))
            .filter(|(_, record)| !(filter.exclude_failed && state.is_failed(&record.id)))
            .map(|(index, _)| index)
            .collect();

        Self {
            records,
            todo,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Next unassigned record, or `None` once exhausted
    pub fn next(&self) -> Option<Assignment<'_>> {
        let position = self.cursor.fetch_add(1, Ordering::Relaxed);
        let source_index = *self.todo.get(position)?;
        Some(Assignment {
            position,
            source_index,
            record: &self.records[source_index],
        })
    }

    /// Records this distributor will hand out in total
    pub fn total(&self) -> usize {
        self.todo.len()
    }

    /// Records in the input that were filtered out up front
    pub fn excluded(&self) -> usize {
        self.records.len() - self.todo.len()
    }
}
