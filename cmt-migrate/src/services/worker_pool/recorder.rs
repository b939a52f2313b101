//! Single writer for migration state
//!
//! Every worker outcome goes through [`StateRecorder::record`], which holds
//! one lock while it updates the state, the progress counters and, when due,
//! saves a checkpoint. Two workers finishing at once are applied one after
//! the other; neither can overwrite the other's update.

use super::progress::ProgressCounters;
use crate::models::{MigrationState, PublishStatus, WorkerResult};
use crate::services::state_store::StateStore;
use cmt_common::events::{EventBus, MigrationEvent, RecordOutcome};
use cmt_common::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error};
use uuid::Uuid;

/// When to flush state to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    EveryRecord,
    /// After every `k` recorded outcomes
    Every(usize),
}

impl Checkpoint {
    /// 0 and 1 both mean every record
    pub fn from_interval(every: usize) -> Self {
        if every <= 1 {
            Checkpoint::EveryRecord
        } else {
            Checkpoint::Every(every)
        }
    }

    fn interval(&self) -> usize {
        match self {
            Checkpoint::EveryRecord => 1,
            Checkpoint::Every(k) => *k,
        }
    }
}

/// Source id and error text of a record that failed in this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    pub source_id: String,
    pub error: String,
}

struct RecorderInner {
    state: MigrationState,
    counters: ProgressCounters,
    failures: Vec<RecordFailure>,
    since_checkpoint: usize,
}

pub struct StateRecorder {
    inner: Mutex<RecorderInner>,
    store: Arc<dyn StateStore>,
    checkpoint: Checkpoint,
    events: EventBus,
    run_id: Uuid,
}

impl StateRecorder {
    pub fn new(
        mut state: MigrationState,
        store: Arc<dyn StateStore>,
        checkpoint: Checkpoint,
        events: EventBus,
        run_id: Uuid,
    ) -> Self {
        state.mark_started();
        Self {
            inner: Mutex::new(RecorderInner {
                state,
                counters: ProgressCounters::default(),
                failures: Vec::new(),
                since_checkpoint: 0,
            }),
            store,
            checkpoint,
            events,
            run_id,
        }
    }

    /// Apply one worker outcome; saves while still holding the lock when due
    pub async fn record(&self, worker: usize, result: &WorkerResult) {
        let mut inner = self.inner.lock().await;

        match (&result.target_id, result.success) {
            (Some(target_id), true) => {
                let status = result.status.unwrap_or(PublishStatus::Draft);
                inner.state.record_completed(
                    &result.source_id,
                    target_id,
                    status,
                    result.sub_resources_attached,
                );
                inner.counters.completed += 1;
                match status {
                    PublishStatus::Active => inner.counters.published += 1,
                    PublishStatus::Draft => inner.counters.kept_as_draft += 1,
                }
                if result.adopted_existing {
                    inner.counters.adopted += 1;
                }
            }
            _ => {
                let error = result
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string());
                inner.state.record_failed(&result.source_id, error.clone());
                inner.counters.failed += 1;
                inner.failures.push(RecordFailure {
                    source_id: result.source_id.clone(),
                    error,
                });
            }
        }
        inner.counters.processed += 1;
        inner.counters.sub_resources_uploaded += result.sub_resources_attached;
        inner.counters.sub_resources_failed += result.sub_resources_failed;
        inner.since_checkpoint += 1;

        if inner.since_checkpoint >= self.checkpoint.interval() {
            let saved = self.store.save(&inner.state).await;
            match saved {
                Ok(()) => {
                    inner.since_checkpoint = 0;
                    self.emit_checkpoint(&inner.state);
                }
                // retried on the next recorded outcome
                Err(e) => error!(error = %e, "Checkpoint save failed"),
            }
        }

        let outcome = result.outcome();
        debug!(source_id = %result.source_id, worker, ?outcome, "Outcome recorded");
        self.events.emit_lossy(MigrationEvent::RecordFinished {
            run_id: self.run_id,
            source_id: result.source_id.clone(),
            worker,
            outcome,
            target_id: match outcome {
                RecordOutcome::Failed => None,
                _ => result.target_id.clone(),
            },
            timestamp: cmt_common::time::now(),
        });
    }

    pub async fn counters(&self) -> ProgressCounters {
        self.inner.lock().await.counters
    }

    pub async fn failures(&self) -> Vec<RecordFailure> {
        self.inner.lock().await.failures.clone()
    }

    /// Final save; returns the state as persisted
    pub async fn finish(&self) -> Result<MigrationState> {
        let mut inner = self.inner.lock().await;
        self.store.save(&inner.state).await?;
        inner.since_checkpoint = 0;
        self.emit_checkpoint(&inner.state);
        Ok(inner.state.clone())
    }

    fn emit_checkpoint(&self, state: &MigrationState) {
        self.events.emit_lossy(MigrationEvent::CheckpointSaved {
            run_id: self.run_id,
            completed: state.completed().len(),
            failed: state.failed().len(),
            timestamp: cmt_common::time::now(),
        });
    }
}
