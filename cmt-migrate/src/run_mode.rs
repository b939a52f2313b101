//! Run mode and the persisted state a run starts from
//!
//! A dry run never writes to the state store: `--reset` only makes it plan
//! from an empty state. An execute run resets on request, and otherwise
//! refuses to start over a non-empty state unless it was asked to resume.

use crate::models::MigrationState;
use crate::services::state_store::StateStore;
use cmt_common::{Error, Result};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Print the plan; no platform calls, no state writes
    DryRun,
    Execute,
}

impl RunMode {
    pub fn from_flags(execute: bool, dry_run: bool) -> Self {
        if execute && !dry_run {
            RunMode::Execute
        } else {
            RunMode::DryRun
        }
    }
}

/// Operator choices about existing state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateOptions {
    /// Continue over the persisted state
    pub resume: bool,
    /// Discard the persisted state first
    pub reset: bool,
}

/// Load (or, when executing with `reset`, clear) the state for this run
pub async fn prepare_state(
    store: &dyn StateStore,
    mode: RunMode,
    options: StateOptions,
) -> Result<MigrationState> {
    match mode {
        RunMode::DryRun if options.reset => {
            info!("Dry run with --reset: planning from an empty state, saved state untouched");
            Ok(MigrationState::new())
        }
        RunMode::DryRun => store.load().await,
        RunMode::Execute if options.reset => {
            store.reset().await?;
            Ok(MigrationState::new())
        }
        RunMode::Execute => {
            let state = store.load().await?;
            if !options.resume && !state.is_empty() {
                return Err(Error::State(format!(
                    "saved state already has {} entries; pass --resume to continue or --reset to start over",
                    state.counts().total()
                )));
            }
            Ok(state)
        }
    }
}
