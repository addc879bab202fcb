//! Conversational clusters produced by the segmenter.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::entity::{EntityRecord, MediaSet};
use super::message::{MessageId, TopicId};

/// Arena index of a cluster within a run, assigned in run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(pub u32);

impl ClusterId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{:04}", self.0)
    }
}

/// A contiguous run of same-topic messages.
///
/// Immutable once the run has assigned its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,
    pub topic_id: Option<TopicId>,
    /// Category resolved from the topic.
    pub category: String,
    /// Member message ids, in input order.
    pub message_ids: Vec<MessageId>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.message_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.message_ids.is_empty()
    }

    pub fn first_message(&self) -> Option<MessageId> {
        self.message_ids.first().copied()
    }
}

/// Structural pattern of a cluster's text/media ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pattern {
    /// At most one caption; all media belong to it.
    SingleEntity,
    /// Captions lead, media follow their caption.
    EntityThenMedia,
    /// Media lead; attribution needs review.
    MediaThenEntity,
    /// Nothing to classify.
    Unresolved,
}

impl Pattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleEntity => "single-entity",
            Self::EntityThenMedia => "entity-then-media",
            Self::MediaThenEntity => "media-then-entity",
            Self::Unresolved => "unresolved",
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a cluster produced no entity records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Pattern was `unresolved`.
    Unresolved,
    /// Extraction yielded no candidates.
    NoCandidates,
}

/// Result of processing one cluster: its pattern, the entity records it
/// produced with their bound media, and the media it could not bind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterOutcome {
    pub cluster_id: ClusterId,
    pub pattern: Pattern,
    pub entities: Vec<EntityRecord>,

    /// Media held at cluster level pending review.
    #[serde(default)]
    pub shared_media: MediaSet,

    /// Media with no entity to bind to.
    #[serde(default)]
    pub unassigned_media: MediaSet,

    #[serde(default)]
    pub skipped: Option<SkipReason>,

    /// Media were distributed by an adjudicator.
    #[serde(default)]
    pub adjudicated: bool,
}

impl ClusterOutcome {
    /// True if this cluster needs human adjudication.
    pub fn needs_review(&self) -> bool {
        !self.shared_media.is_empty() || self.entities.iter().any(|e| e.needs_review)
    }
}
