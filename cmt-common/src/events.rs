//! Migration event types and EventBus
//!
//! Events are broadcast while a migration runs so that observers (progress
//! displays, tests) can follow along without touching engine state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Final outcome of one source record, as seen by observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    /// Created (or adopted) and published
    Published,
    /// Created (or adopted) and left as draft
    KeptAsDraft,
    /// Item-level failure
    Failed,
}

/// Migration event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MigrationEvent {
    /// Workers are about to start
    RunStarted {
        run_id: Uuid,
        /// Records handed to the work distributor
        pending: usize,
        /// Records skipped because the persisted state already decided them
        already_decided: usize,
        workers: usize,
        timestamp: DateTime<Utc>,
    },

    /// A worker finished one record
    RecordFinished {
        run_id: Uuid,
        source_id: String,
        worker: usize,
        outcome: RecordOutcome,
        target_id: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Periodic progress sample
    Progress {
        run_id: Uuid,
        processed: usize,
        total: usize,
        items_per_minute: f64,
        eta_seconds: Option<u64>,
        timestamp: DateTime<Utc>,
    },

    /// In-memory state was flushed to durable storage
    CheckpointSaved {
        run_id: Uuid,
        completed: usize,
        failed: usize,
        timestamp: DateTime<Utc>,
    },

    /// All workers exited
    RunCompleted {
        run_id: Uuid,
        created: usize,
        failed: usize,
        sub_resources_uploaded: usize,
        elapsed_seconds: u64,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for [`MigrationEvent`]s
///
/// Cloning is cheap; all clones share one channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MigrationEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<MigrationEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Migration events are informational; the engine never depends on
    /// anyone receiving them.
    pub fn emit_lossy(&self, event: MigrationEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
