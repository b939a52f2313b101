//! Fixed-size worker pool
//!
//! N workers share one [`WorkDistributor`], one [`ItemPipeline`] and one
//! [`StateRecorder`]. Each worker owns its own [`RateLimitedClient`], so
//! pacing is per worker. `run()` returns once every worker has seen the
//! distributor exhausted.

mod progress;
mod recorder;

pub use progress::{ProgressCounters, ProgressSnapshot};
pub use recorder::{Checkpoint, RecordFailure, StateRecorder};

use crate::models::MigrationState;
use crate::services::item_pipeline::ItemPipeline;
use crate::services::platform_transport::PlatformTransport;
use crate::services::rate_limited_client::{RateLimitedClient, RetryPolicy};
use crate::services::state_store::StateStore;
use crate::services::work_distributor::WorkDistributor;
use cmt_common::events::{EventBus, MigrationEvent};
use cmt_common::human_time::format_duration;
use cmt_common::{Error, Result};
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Pool tuning
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub workers: usize,
    /// Per-worker minimum spacing between platform requests
    pub min_request_interval: Duration,
    pub retry: RetryPolicy,
    pub checkpoint: Checkpoint,
    pub progress_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            min_request_interval: Duration::from_millis(500),
            retry: RetryPolicy::default(),
            checkpoint: Checkpoint::EveryRecord,
            progress_interval: Duration::from_secs(10),
        }
    }
}

/// What a finished run did
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationSummary {
    pub run_id: Uuid,
    /// Records handed to workers in this run
    pub attempted: usize,
    /// Records left out because the loaded state already decided them
    pub already_decided: usize,
    pub counters: ProgressCounters,
    /// Per-record error text, in completion order
    pub failures: Vec<RecordFailure>,
    pub elapsed: Duration,
    /// State as persisted by the final save
    pub state: MigrationState,
}

impl MigrationSummary {
    pub fn created(&self) -> usize {
        self.counters.completed
    }

    pub fn failed(&self) -> usize {
        self.counters.failed
    }
}

impl fmt::Display for MigrationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.counters;
        writeln!(f, "Migration finished in {}", format_duration(self.elapsed))?;
        writeln!(
            f,
            "  attempted: {} (already decided: {})",
            self.attempted, self.already_decided
        )?;
        writeln!(
            f,
            "  created:   {} ({} published, {} draft, {} adopted existing)",
            c.completed, c.published, c.kept_as_draft, c.adopted
        )?;
        writeln!(f, "  failed:    {}", c.failed)?;
        writeln!(
            f,
            "  sub-resources uploaded: {} ({} failed)",
            c.sub_resources_uploaded, c.sub_resources_failed
        )?;
        for failure in &self.failures {
            writeln!(f, "    {}: {}", failure.source_id, failure.error)?;
        }
        Ok(())
    }
}

pub struct WorkerPool {
    config: PoolConfig,
    transport: Arc<dyn PlatformTransport>,
    pipeline: Arc<ItemPipeline>,
    store: Arc<dyn StateStore>,
    events: EventBus,
}

impl WorkerPool {
    pub fn new(
        config: PoolConfig,
        transport: Arc<dyn PlatformTransport>,
        pipeline: Arc<ItemPipeline>,
        store: Arc<dyn StateStore>,
        events: EventBus,
    ) -> Self {
        Self {
            config,
            transport,
            pipeline,
            store,
            events,
        }
    }

    /// Run every distributed record through the pipeline
    ///
    /// `state` is the state the distributor was built from. Checkpoint
    /// failures are logged and retried; a failed final save is returned.
    pub async fn run(&self, distributor: WorkDistributor, state: MigrationState) -> Result<MigrationSummary> {
        if self.config.workers == 0 {
            return Err(Error::Config("worker count must be at least 1".to_string()));
        }

        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let total = distributor.total();
        let already_decided = distributor.excluded();

        info!(
            %run_id,
            pending = total,
            already_decided,
            workers = self.config.workers,
            "Starting migration run"
        );
        self.events.emit_lossy(MigrationEvent::RunStarted {
            run_id,
            pending: total,
            already_decided,
            workers: self.config.workers,
            timestamp: cmt_common::time::now(),
        });

        let recorder = Arc::new(StateRecorder::new(
            state,
            Arc::clone(&self.store),
            self.config.checkpoint,
            self.events.clone(),
            run_id,
        ));

        let reporter = progress::spawn_reporter(
            Arc::clone(&recorder),
            self.events.clone(),
            run_id,
            total,
            self.config.progress_interval,
        );

        let workers = (0..self.config.workers).map(|worker| {
            let client = RateLimitedClient::new(
                Arc::clone(&self.transport),
                self.config.min_request_interval,
                self.config.retry.clone(),
                worker,
            );
            self.worker_loop(worker, client, &distributor, &recorder)
        });
        let handled: Vec<usize> = join_all(workers).await;
        debug!(?handled, "All workers exited");

        reporter.abort();

        let final_state = recorder.finish().await?;
        let counters = recorder.counters().await;
        let summary = MigrationSummary {
            run_id,
            attempted: total,
            already_decided,
            counters,
            failures: recorder.failures().await,
            elapsed: started.elapsed(),
            state: final_state,
        };

        info!(
            %run_id,
            created = summary.created(),
            failed = summary.failed(),
            sub_resources = counters.sub_resources_uploaded,
            elapsed = %format_duration(summary.elapsed),
            "Migration run complete"
        );
        self.events.emit_lossy(MigrationEvent::RunCompleted {
            run_id,
            created: summary.created(),
            failed: summary.failed(),
            sub_resources_uploaded: counters.sub_resources_uploaded,
            elapsed_seconds: summary.elapsed.as_secs(),
            timestamp: cmt_common::time::now(),
        });

        Ok(summary)
    }

    /// Pull, process, record until exhausted; returns records handled
    async fn worker_loop(
        &self,
        worker: usize,
        mut client: RateLimitedClient,
        distributor: &WorkDistributor,
        recorder: &StateRecorder,
    ) -> usize {
        let mut handled = 0;
        while let Some(assignment) = distributor.next() {
            debug!(
                worker,
                position = assignment.position,
                source_id = %assignment.record.id,
                "Record assigned"
            );
            let result = self.pipeline.run(&mut client, assignment.record).await;
            recorder.record(worker, &result).await;
            handled += 1;
        }
        debug!(worker, handled, "Worker exiting");
        handled
    }
}
