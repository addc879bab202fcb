//! In-memory checkpoint storage for testing and development.

use async_trait::async_trait;
use std::sync::RwLock;

use crate::error::Result;
use crate::traits::store::{Checkpoint, CheckpointStore};

/// In-memory checkpoint storage.
///
/// Not suitable for resuming across processes: data is lost on exit.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    checkpoint: RwLock<Option<Checkpoint>>,
    saves: RwLock<usize>,
}

impl MemoryCheckpointStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-loaded with a checkpoint.
    pub fn with_checkpoint(checkpoint: Checkpoint) -> Self {
        Self {
            checkpoint: RwLock::new(Some(checkpoint)),
            saves: RwLock::new(0),
        }
    }

    /// The currently stored checkpoint.
    pub fn current(&self) -> Option<Checkpoint> {
        self.checkpoint
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of saves since creation.
    pub fn save_count(&self) -> usize {
        *self.saves.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> Result<Option<Checkpoint>> {
        Ok(self.current())
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        *self.checkpoint.write().unwrap_or_else(|e| e.into_inner()) = Some(checkpoint.clone());
        *self.saves.write().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.checkpoint.write().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}
