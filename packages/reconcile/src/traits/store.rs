//! Checkpoint storage for interruptible runs.
//!
//! A run saves a checkpoint after every processed cluster. A resumed run
//! loads it, checks the fingerprint against its own cluster layout, and
//! skips clusters already done.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::cluster::{ClusterId, ClusterOutcome};

/// Progress of a run up to and including `last_cluster_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Hash of the cluster layout this progress belongs to.
    pub fingerprint: String,
    pub last_cluster_id: ClusterId,
    /// Outcomes of every completed cluster, in cluster order.
    pub extracted: Vec<ClusterOutcome>,
}

impl Checkpoint {
    /// True if this checkpoint was taken for the given layout.
    pub fn matches(&self, fingerprint: &str) -> bool {
        self.fingerprint == fingerprint
    }
}

/// Storage backend for checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the last saved checkpoint, if any.
    async fn load(&self) -> Result<Option<Checkpoint>>;

    /// Replace the saved checkpoint.
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// Remove any saved checkpoint.
    async fn clear(&self) -> Result<()>;
}
