//! Media adjudication for clusters whose media could not be bound.
//!
//! When a cluster's media are held at cluster level for review, an
//! adjudicator may be asked which entity each item belongs to. It sees the
//! entity names and the conversation in message order.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::InterpretResult;
use crate::types::cluster::ClusterId;
use crate::types::entity::MediaSet;

/// What an adjudicator is asked about one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjudicationRequest {
    pub cluster_id: ClusterId,
    pub category: String,
    /// Names of the cluster's entities, in extraction order.
    pub entity_names: Vec<String>,
    /// One line per message item, in order.
    pub conversation: String,
    /// The media to distribute.
    pub media: MediaSet,
}

/// Media per entity, keyed by entity name as given in the request.
///
/// An entity absent from the map was not adjudicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjudication {
    pub assignments: IndexMap<String, MediaSet>,
}

impl Adjudication {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(mut self, entity_name: impl Into<String>, media: MediaSet) -> Self {
        self.assignments.insert(entity_name.into(), media);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// Cluster media adjudication.
///
/// A failed call leaves the cluster flagged for review.
#[async_trait]
pub trait Adjudicator: Send + Sync {
    /// Decide which entity each media item of the request belongs to.
    async fn adjudicate(&self, request: &AdjudicationRequest) -> InterpretResult<Adjudication>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "adjudicator"
    }
}

#[async_trait]
impl<A: Adjudicator + ?Sized> Adjudicator for Arc<A> {
    async fn adjudicate(&self, request: &AdjudicationRequest) -> InterpretResult<Adjudication> {
        (**self).adjudicate(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
