//! Interpretation capability for cluster text.
//!
//! An interpreter turns a cluster's free-form text into zero or more
//! candidate entity descriptions. Implementations typically wrap a hosted
//! completion service; tests substitute a scripted stub.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::InterpretResult;
use crate::types::entity::{Confidence, DamageStatus};

/// Media present in a cluster, passed as context to the interpreter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCounts {
    pub photos: usize,
    pub videos: usize,
    pub map_links: usize,
}

impl MediaCounts {
    pub fn total(&self) -> usize {
        self.photos + self.videos + self.map_links
    }
}

/// A candidate entity description returned by an interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub damage_status: DamageStatus,
    pub confidence: Confidence,
}

impl Candidate {
    pub fn new(name: impl Into<String>, confidence: Confidence) -> Self {
        Self {
            name: name.into(),
            area: None,
            damage_status: DamageStatus::Unknown,
            confidence,
        }
    }

    pub fn with_area(mut self, area: impl Into<String>) -> Self {
        self.area = Some(area.into());
        self
    }

    pub fn with_damage_status(mut self, status: DamageStatus) -> Self {
        self.damage_status = status;
        self
    }
}

/// Cluster interpretation.
///
/// Failures are reported, never panicked; the caller degrades a failed
/// call to "no candidates".
#[async_trait]
pub trait Interpreter: Send + Sync {
    /// Interpret a cluster's joined text.
    async fn interpret(
        &self,
        cluster_text: &str,
        category: &str,
        media: MediaCounts,
    ) -> InterpretResult<Vec<Candidate>>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "interpreter"
    }
}

#[async_trait]
impl<I: Interpreter + ?Sized> Interpreter for Arc<I> {
    async fn interpret(
        &self,
        cluster_text: &str,
        category: &str,
        media: MediaCounts,
    ) -> InterpretResult<Vec<Candidate>> {
        (**self).interpret(cluster_text, category, media).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Raw text completion, the capability a prompted interpreter is built on.
#[async_trait]
pub trait Completion: Send + Sync {
    /// Complete a prompt and return the raw reply.
    async fn complete(&self, system: &str, user: &str) -> InterpretResult<String>;
}
