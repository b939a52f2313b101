//! Data models for catalog migration

pub mod migration_state;
pub mod source_record;
pub mod worker_result;

pub use migration_state::{
    CompletedEntry, FailedEntry, MigrationState, PublishStatus, SkippedEntry, StateCounts,
};
pub use source_record::{SourceRecord, SubResourceRef};
pub use worker_result::{ItemStage, QaReport, WorkerResult};
