//! Progress reporting
//!
//! Counters are updated by the state recorder inside its critical section;
//! the reporter only samples them. Nothing here affects control flow.

use super::recorder::StateRecorder;
use cmt_common::events::{EventBus, MigrationEvent};
use cmt_common::human_time::{format_duration, format_eta};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

/// Running totals for the current run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressCounters {
    /// Records with a recorded outcome (completed + failed)
    pub processed: usize,
    pub completed: usize,
    pub failed: usize,
    pub published: usize,
    pub kept_as_draft: usize,
    /// Completed by adopting an existing target record
    pub adopted: usize,
    pub sub_resources_uploaded: usize,
    pub sub_resources_failed: usize,
}

/// Derived throughput figures
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub processed: usize,
    pub total: usize,
    pub percent: f64,
    pub items_per_minute: f64,
    /// `None` until at least one record finished
    pub eta: Option<Duration>,
}

impl ProgressSnapshot {
    pub fn compute(counters: &ProgressCounters, total: usize, elapsed: Duration) -> Self {
        let processed = counters.processed.min(total);
        let percent = if total == 0 {
            100.0
        } else {
            processed as f64 / total as f64 * 100.0
        };

        let minutes = elapsed.as_secs_f64() / 60.0;
        let items_per_minute = if minutes > 0.0 {
            processed as f64 / minutes
        } else {
            0.0
        };

        let remaining = total - processed;
        let eta = if remaining == 0 {
            Some(Duration::ZERO)
        } else if processed == 0 || elapsed.is_zero() {
            None
        } else {
            let per_item = elapsed.as_secs_f64() / processed as f64;
            Some(Duration::from_secs_f64(per_item * remaining as f64))
        };

        Self {
            processed,
            total,
            percent,
            items_per_minute,
            eta,
        }
    }
}

/// Sample the recorder every `interval` until the run is done
///
/// The caller aborts the task once all workers have exited.
pub(super) fn spawn_reporter(
    recorder: Arc<StateRecorder>,
    events: EventBus,
    run_id: Uuid,
    total: usize,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let started = Instant::now();
        let mut last_processed = 0;

        loop {
            tokio::time::sleep(interval).await;

            let counters = recorder.counters().await;
            if counters.processed == last_processed {
                continue;
            }
            last_processed = counters.processed;

            let snapshot = ProgressSnapshot::compute(&counters, total, started.elapsed());
            tracing::info!(
                processed = snapshot.processed,
                total,
                failed = counters.failed,
                "Progress {:.1}% | {:.1} items/min | elapsed {} | ETA {}",
                snapshot.percent,
                snapshot.items_per_minute,
                format_duration(started.elapsed()),
                format_eta(snapshot.eta)
            );

            events.emit_lossy(MigrationEvent::Progress {
                run_id,
                processed: snapshot.processed,
                total,
                items_per_minute: snapshot.items_per_minute,
                eta_seconds: snapshot.eta.map(|d| d.as_secs()),
                timestamp: cmt_common::time::now(),
            });

            if snapshot.processed >= total {
                break;
            }
        }
    })
}
