//! Durable migration state
//!
//! [`StateStore::load`] returns an empty state when nothing was saved yet;
//! [`StateStore::save`] replaces what was saved before. Callers serialize
//! access (see `StateRecorder`); stores only guarantee that a save is
//! all-or-nothing.

use crate::models::MigrationState;
use async_trait::async_trait;
use cmt_common::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self) -> Result<MigrationState>;
    async fn save(&self, state: &MigrationState) -> Result<()>;

    /// Forget everything saved so far
    async fn reset(&self) -> Result<()> {
        self.save(&MigrationState::new()).await
    }
}

/// JSON file store with atomic replace (temp file + rename)
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateStore for JsonFileStateStore {
    async fn load(&self) -> Result<MigrationState> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No saved state, starting empty");
                return Ok(MigrationState::new());
            }
            Err(e) => return Err(e.into()),
        };

        let state: MigrationState = serde_json::from_slice(&bytes).map_err(|e| {
            Error::State(format!("failed to parse {}: {}", self.path.display(), e))
        })?;

        let overlaps = state.overlapping_ids();
        if !overlaps.is_empty() {
            return Err(Error::State(format!(
                "{} lists ids in more than one of completed/failed/skipped: {}",
                self.path.display(),
                overlaps.join(", ")
            )));
        }

        Ok(state)
    }

    async fn save(&self, state: &MigrationState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(
            path = %self.path.display(),
            completed = state.completed().len(),
            failed = state.failed().len(),
            "State saved"
        );
        Ok(())
    }

    /// Remove the state file if present
    async fn reset(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "Migration state reset");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store for dry runs and tests
///
/// Keeps every saved snapshot so checkpoint behavior can be inspected.
#[derive(Default)]
pub struct MemoryStateStore {
    current: Mutex<MigrationState>,
    saves: Mutex<Vec<MigrationState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: MigrationState) -> Self {
        Self {
            current: Mutex::new(state),
            saves: Mutex::new(Vec::new()),
        }
    }

    /// Every state passed to `save`, oldest first
    pub fn saves(&self) -> Vec<MigrationState> {
        self.saves.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|s| s.len()).unwrap_or_default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<MigrationState> {
        self.current
            .lock()
            .map(|s| s.clone())
            .map_err(|_| Error::Internal("memory state lock poisoned".to_string()))
    }

    async fn save(&self, state: &MigrationState) -> Result<()> {
        let mut current = self
            .current
            .lock()
            .map_err(|_| Error::Internal("memory state lock poisoned".to_string()))?;
        *current = state.clone();
        drop(current);

        self.saves
            .lock()
            .map_err(|_| Error::Internal("memory state lock poisoned".to_string()))?
            .push(state.clone());
        Ok(())
    }
}
