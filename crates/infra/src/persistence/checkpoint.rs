//! File-backed checkpoint store.
//!
//! Stores the history snapshot as versioned JSON under the host's data
//! directory. Writes go through a temporary file and an atomic rename, so a
//! crash mid-write leaves the previous checkpoint intact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use dozearc_core::CheckpointStore;
use dozearc_domain::{DozeArcError, Result, StandbySnapshot};

const CHECKPOINT_FILE: &str = "standby-checkpoint.json";

/// Checkpoint store rooted in a data directory.
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    /// Store checkpoints under `data_dir` (created on first save).
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self { path: data_dir.as_ref().join(CHECKPOINT_FILE) }
    }

    /// Where the checkpoint lives on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, snapshot: &StandbySnapshot) -> Result<()> {
        let json = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| DozeArcError::Snapshot(format!("serialize failed: {e}")))?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DozeArcError::Snapshot(format!("create dir failed: {e}")))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| DozeArcError::Snapshot(format!("write failed: {e}")))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| DozeArcError::Snapshot(format!("rename failed: {e}")))?;

        info!(path = %self.path.display(), bytes = json.len(), "checkpoint saved");
        Ok(())
    }

    async fn load(&self) -> Result<Option<StandbySnapshot>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no checkpoint on disk");
                return Ok(None);
            }
            Err(e) => return Err(DozeArcError::Snapshot(format!("read failed: {e}"))),
        };

        let snapshot: StandbySnapshot = serde_json::from_slice(&bytes)
            .map_err(|e| DozeArcError::Snapshot(format!("parse failed: {e}")))?;
        snapshot.check_version()?;

        debug!(path = %self.path.display(), users = snapshot.users.len(), "checkpoint loaded");
        Ok(Some(snapshot))
    }
}
