//! Checkpoint storage abstraction
//!
//! The orchestrator writes a [`RunSnapshot`] at every phase change and reads it
//! back to resume a run parked at `awaiting_approval`.
//!
//! # Example
//!
//! ```rust,ignore
//! use agora::db::CheckpointProvider;
//!
//! // Ephemeral, process-local
//! let store = CheckpointProvider::Memory.create_store().await?;
//!
//! // File-backed libSQL, survives restarts (needed by the CLI's `decide`)
//! let store = CheckpointProvider::Local { path: "data/agora.db".into() }.create_store().await?;
//! ```

use crate::research::run::RunSnapshot;
use crate::types::{Result, RunPhase, RunSummary};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Insert or replace the snapshot for `snapshot.run_id`.
    async fn save(&self, snapshot: &RunSnapshot) -> Result<()>;

    /// Replace the snapshot only while the stored run is still in `expected`.
    ///
    /// Returns `false`, leaving the stored row untouched, when another writer
    /// already moved the run (or the run does not exist). The check and the
    /// write are a single atomic step.
    async fn save_if_phase(&self, snapshot: &RunSnapshot, expected: RunPhase) -> Result<bool>;

    /// Latest snapshot for a run, or `AppError::NotFound`.
    async fn load(&self, run_id: &str) -> Result<RunSnapshot>;

    /// All stored runs, most recently updated first.
    async fn list(&self) -> Result<Vec<RunSummary>>;
}

/// Checkpoint backend selection
#[derive(Debug, Clone, Default)]
pub enum CheckpointProvider {
    /// In-process map, lost on exit
    #[default]
    Memory,
    /// libSQL database file
    Local { path: String },
}

impl CheckpointProvider {
    /// `:memory:` selects the in-process store; anything else is a file path.
    pub fn from_url(url: &str) -> Self {
        if url.trim() == ":memory:" {
            CheckpointProvider::Memory
        } else {
            CheckpointProvider::Local {
                path: url.to_string(),
            }
        }
    }

    pub async fn create_store(&self) -> Result<Arc<dyn CheckpointStore>> {
        match self {
            CheckpointProvider::Memory => Ok(Arc::new(super::memory::MemoryCheckpointStore::new())),
            CheckpointProvider::Local { path } => Ok(Arc::new(
                super::turso::TursoCheckpointStore::new_local(path).await?,
            )),
        }
    }
}
