use crate::db::traits::CheckpointStore;
use crate::research::run::RunSnapshot;
use crate::types::{AppError, Result, RunPhase, RunSummary};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Process-local checkpoint store.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    snapshots: RwLock<HashMap<String, RunSnapshot>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.read().is_empty()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, snapshot: &RunSnapshot) -> Result<()> {
        self.snapshots
            .write()
            .insert(snapshot.run_id.clone(), snapshot.clone());
        Ok(())
    }

    async fn save_if_phase(&self, snapshot: &RunSnapshot, expected: RunPhase) -> Result<bool> {
        let mut snapshots = self.snapshots.write();
        match snapshots.get_mut(&snapshot.run_id) {
            Some(stored) if stored.phase == expected => {
                *stored = snapshot.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn load(&self, run_id: &str) -> Result<RunSnapshot> {
        self.snapshots
            .read()
            .get(run_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Run {} not found", run_id)))
    }

    async fn list(&self) -> Result<Vec<RunSummary>> {
        let mut runs: Vec<RunSummary> = self
            .snapshots
            .read()
            .values()
            .map(RunSnapshot::summary)
            .collect();
        runs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(runs)
    }
}
