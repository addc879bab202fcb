//! JSON file checkpoint storage.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ReconcileError, Result};
use crate::traits::store::{Checkpoint, CheckpointStore};

/// Stores one checkpoint as a JSON file.
///
/// Saves write a sibling temp file and rename it over the target, so a
/// crash mid-save leaves the previous checkpoint intact.
#[derive(Debug, Clone)]
pub struct JsonFileCheckpointStore {
    path: PathBuf,
}

impl JsonFileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CheckpointStore for JsonFileCheckpointStore {
    async fn load(&self) -> Result<Option<Checkpoint>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ReconcileError::storage(e)),
        }
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ReconcileError::storage)?;
        }
        let json = serde_json::to_vec_pretty(checkpoint)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, json)
            .await
            .map_err(ReconcileError::storage)?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(ReconcileError::storage)?;
        debug!(
            path = %self.path.display(),
            last_cluster_id = %checkpoint.last_cluster_id,
            "Saved checkpoint"
        );
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ReconcileError::storage(e)),
        }
    }
}
