use crate::db::traits::CheckpointStore;
use crate::research::run::RunSnapshot;
use crate::types::{AppError, Result, RunPhase, RunSummary};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Builder, Connection};
use std::path::Path;

/// libSQL-backed checkpoint store.
///
/// Snapshots are stored as JSON next to a few indexed columns used for
/// listing. A single connection is kept so that `:memory:` databases stay
/// alive for the lifetime of the store.
pub struct TursoCheckpointStore {
    conn: Connection,
}

impl TursoCheckpointStore {
    pub async fn new_local(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::Database(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        Self::open(path).await
    }

    pub async fn new_memory() -> Result<Self> {
        Self::open(":memory:").await
    }

    async fn open(path: &str) -> Result<Self> {
        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| AppError::Database(format!("Failed to open database {}: {}", path, e)))?;

        let conn = db
            .connect()
            .map_err(|e| AppError::Database(format!("Failed to get connection: {}", e)))?;

        let store = Self { conn };
        store.initialize_schema().await?;

        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<()> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS run_checkpoints (
                    run_id TEXT PRIMARY KEY,
                    topic TEXT NOT NULL,
                    phase TEXT NOT NULL,
                    snapshot TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                )",
                (),
            )
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to create run_checkpoints table: {}", e))
            })?;

        Ok(())
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

#[async_trait]
impl CheckpointStore for TursoCheckpointStore {
    async fn save(&self, snapshot: &RunSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)
            .map_err(|e| AppError::Internal(format!("Failed to serialize snapshot: {}", e)))?;

        self.conn
            .execute(
                "INSERT INTO run_checkpoints (run_id, topic, phase, snapshot, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(run_id) DO UPDATE SET
                    phase = excluded.phase,
                    snapshot = excluded.snapshot,
                    updated_at = excluded.updated_at",
                (
                    snapshot.run_id.as_str(),
                    snapshot.topic.as_str(),
                    snapshot.phase.as_str(),
                    json,
                    snapshot.created_at.timestamp_millis(),
                    snapshot.updated_at.timestamp_millis(),
                ),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to save checkpoint: {}", e)))?;

        Ok(())
    }

    async fn save_if_phase(&self, snapshot: &RunSnapshot, expected: RunPhase) -> Result<bool> {
        let json = serde_json::to_string(snapshot)
            .map_err(|e| AppError::Internal(format!("Failed to serialize snapshot: {}", e)))?;

        let updated = self
            .conn
            .execute(
                "UPDATE run_checkpoints
                 SET phase = ?, snapshot = ?, updated_at = ?
                 WHERE run_id = ? AND phase = ?",
                (
                    snapshot.phase.as_str(),
                    json,
                    snapshot.updated_at.timestamp_millis(),
                    snapshot.run_id.as_str(),
                    expected.as_str(),
                ),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to update checkpoint: {}", e)))?;

        Ok(updated == 1)
    }

    async fn load(&self, run_id: &str) -> Result<RunSnapshot> {
        let mut rows = self
            .conn
            .query(
                "SELECT snapshot FROM run_checkpoints WHERE run_id = ?",
                [run_id],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query checkpoint: {}", e)))?;

        let row = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound(format!("Run {} not found", run_id)))?;

        let json: String = row.get(0).map_err(|e| AppError::Database(e.to_string()))?;
        serde_json::from_str(&json)
            .map_err(|e| AppError::Database(format!("Corrupt checkpoint for {}: {}", run_id, e)))
    }

    async fn list(&self) -> Result<Vec<RunSummary>> {
        let mut rows = self
            .conn
            .query(
                "SELECT run_id, topic, phase, updated_at
                 FROM run_checkpoints ORDER BY updated_at DESC",
                (),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to list checkpoints: {}", e)))?;

        let mut runs = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            let phase: String = row.get(2).map_err(|e| AppError::Database(e.to_string()))?;
            let updated_at: i64 = row.get(3).map_err(|e| AppError::Database(e.to_string()))?;
            runs.push(RunSummary {
                run_id: row.get(0).map_err(|e| AppError::Database(e.to_string()))?,
                topic: row.get(1).map_err(|e| AppError::Database(e.to_string()))?,
                phase: phase.parse::<RunPhase>()?,
                updated_at: from_millis(updated_at),
            });
        }

        Ok(runs)
    }
}
