//! The Reconciler - main entry point for the reconciliation library.
//!
//! A run segments the stream into clusters, processes each cluster
//! (classify, extract, assign media, optionally adjudicate media held for
//! review), then merges the resulting stream
//! entities against the catalog. Clusters and stream entities live in a
//! [`Run`] arena addressed by [`ClusterId`] and [`EntityId`].
//!
//! Progress is checkpointed after every cluster. Cancellation is honored
//! between clusters, never inside one.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::adjudicate::{adjudicate_cluster, adjudication_request, apply_adjudication};
use super::assign::assign_media;
use super::classify::{classify, type_sequence, TypedItem};
use super::extract::{candidate_record, extract_from_captions, interpret_cluster};
use super::links::first_coordinates;
use super::merge::{MergeOutcome, Merger};
use super::normalize::Normalizer;
use super::prompts::prompt_hash;
use super::segment::{segment_topics, segment_topics_parallel, Segment};
use super::topics::{group_by_topic, TopicGroup};
use crate::error::{ReconcileError, Result};
use crate::interpreters::CallPacer;
use crate::stores::MemoryCheckpointStore;
use crate::traits::{
    adjudicator::Adjudicator,
    interpreter::Interpreter,
    similarity::{Levenshtein, Similarity},
    store::{Checkpoint, CheckpointStore},
};
use crate::types::{
    catalog::CatalogEntity,
    cluster::{Cluster, ClusterId, ClusterOutcome, Pattern, SkipReason},
    config::ReconcileConfig,
    entity::{EntityId, EntityRecord},
    message::{Message, MessageId, TopicId},
};

/// Arena of one run's clusters, stream entities and per-cluster outcomes.
#[derive(Debug, Clone)]
pub struct Run {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub fingerprint: String,
    pub clusters: Vec<Cluster>,
    /// Indexed by `ClusterId`.
    pub outcomes: Vec<ClusterOutcome>,
    /// Stream entities, indexed by `EntityId`.
    pub entities: Vec<EntityRecord>,
    /// Last cluster restored from a checkpoint, if the run resumed.
    pub resumed_after: Option<ClusterId>,
}

impl Run {
    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id.index())
    }

    pub fn outcome(&self, id: ClusterId) -> Option<&ClusterOutcome> {
        self.outcomes.get(id.index())
    }

    pub fn entity(&self, id: EntityId) -> Option<&EntityRecord> {
        self.entities.get(id.index())
    }

    /// Outcomes that need human adjudication, in cluster order.
    pub fn needs_review(&self) -> impl Iterator<Item = &ClusterOutcome> {
        self.outcomes.iter().filter(|o| o.needs_review())
    }

    /// Number of clusters with the given pattern.
    pub fn count_pattern(&self, pattern: Pattern) -> usize {
        self.outcomes.iter().filter(|o| o.pattern == pattern).count()
    }
}

/// A finished reconciliation: the run arena and the merge result.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub run: Run,
    pub merge: MergeOutcome,
}

/// SHA-256 over the extraction method and the cluster layout (topic and
/// member ids of every cluster).
pub fn run_fingerprint(clusters: &[Cluster], method: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"|");
    for cluster in clusters {
        match cluster.topic_id {
            Some(topic) => hasher.update(topic.to_le_bytes()),
            None => hasher.update(b"none"),
        }
        hasher.update(b":");
        for id in &cluster.message_ids {
            hasher.update(id.to_le_bytes());
        }
        hasher.update(b";");
    }
    format!("{:x}", hasher.finalize())
}

/// Runs the reconciliation pipeline.
///
/// # Example
///
/// ```rust,ignore
/// let reconciler = Reconciler::new(ReconcileConfig::default());
/// let result = reconciler
///     .reconcile(messages, &categories, &catalog, CancellationToken::new())
///     .await?;
/// println!("{}", Summary::from_reconciliation(&result));
/// ```
pub struct Reconciler<S: CheckpointStore = MemoryCheckpointStore> {
    config: ReconcileConfig,
    normalizer: Normalizer,
    similarity: Box<dyn Similarity>,
    interpreter: Option<Arc<dyn Interpreter>>,
    adjudicator: Option<Arc<dyn Adjudicator>>,
    /// Paces every interpreter and adjudicator call of the run.
    pacer: CallPacer,
    store: S,
}

impl Reconciler<MemoryCheckpointStore> {
    /// Create a reconciler with in-memory checkpoints.
    pub fn new(config: ReconcileConfig) -> Self {
        Self::with_store(config, MemoryCheckpointStore::new())
    }
}

impl<S: CheckpointStore> Reconciler<S> {
    /// Create with a checkpoint store.
    pub fn with_store(config: ReconcileConfig, store: S) -> Self {
        Self {
            normalizer: Normalizer::new(&config.normalize),
            pacer: CallPacer::new(Duration::from_millis(config.extract.call_delay_ms)),
            config,
            similarity: Box::new(Levenshtein),
            interpreter: None,
            adjudicator: None,
            store,
        }
    }

    /// Extract entities with an interpreter instead of caption parsing.
    ///
    /// Calls are spaced by `extract.call_delay_ms`.
    pub fn with_interpreter<I: Interpreter + 'static>(mut self, interpreter: I) -> Self {
        self.interpreter = Some(Arc::new(interpreter));
        self
    }

    /// Ask an adjudicator about clusters whose media are held for review.
    ///
    /// Shares the interpreter's call pacing.
    pub fn with_adjudicator<A: Adjudicator + 'static>(mut self, adjudicator: A) -> Self {
        self.adjudicator = Some(Arc::new(adjudicator));
        self
    }

    /// Replace the similarity scorer used by the merge.
    pub fn with_similarity<T: Similarity + 'static>(mut self, similarity: T) -> Self {
        self.similarity = Box::new(similarity);
        self
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Get a reference to the checkpoint store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Names the way this reconciler extracts and adjudicates, so progress
    /// made one way is never resumed another way.
    pub fn method(&self) -> String {
        let mut method = match &self.interpreter {
            Some(interpreter) => format!("interpreter:{}", interpreter.name()),
            None => "captions".to_string(),
        };
        if let Some(adjudicator) = &self.adjudicator {
            method.push_str(&format!("+adjudicator:{}", adjudicator.name()));
        }
        if self.interpreter.is_some() || self.adjudicator.is_some() {
            method.push_str(&format!("+prompts:{}", prompt_hash()));
        }
        method
    }

    /// Checkpoint fingerprint for `clusters` under this reconciler.
    pub fn fingerprint(&self, clusters: &[Cluster]) -> String {
        run_fingerprint(clusters, &self.method())
    }

    // =========================================================================
    // Stage Primitives
    // =========================================================================

    /// Group by topic and segment into clusters with sequential ids.
    pub fn segment(
        &self,
        messages: Vec<Message>,
        categories: &HashMap<TopicId, String>,
    ) -> (Vec<TopicGroup>, Vec<Cluster>) {
        let groups = group_by_topic(messages, categories, &self.config.unknown_category);
        let segments = segment_topics(&groups, &self.config.segment);
        let clusters = number_clusters(&groups, segments);
        (groups, clusters)
    }

    /// Like [`Self::segment`], with one worker task per topic.
    pub async fn segment_parallel(
        &self,
        messages: Vec<Message>,
        categories: &HashMap<TopicId, String>,
    ) -> (Vec<TopicGroup>, Vec<Cluster>) {
        let groups = group_by_topic(messages, categories, &self.config.unknown_category);
        let segments = segment_topics_parallel(&groups, &self.config.segment).await;
        let clusters = number_clusters(&groups, segments);
        (groups, clusters)
    }

    /// Classify, extract, assign media and adjudicate one cluster.
    ///
    /// New entity ids start at `first_entity_id`. Entities get coordinates
    /// from the first bound map link that carries a position.
    pub async fn process_cluster(
        &self,
        cluster: &Cluster,
        messages: &HashMap<MessageId, &Message>,
        first_entity_id: u32,
    ) -> ClusterOutcome {
        let members = cluster
            .message_ids
            .iter()
            .filter_map(|id| messages.get(id).copied());
        let sequence = type_sequence(members);
        let pattern = classify(&sequence);

        if pattern == Pattern::Unresolved {
            debug!(cluster_id = %cluster.id, "Unresolved cluster dropped");
            return ClusterOutcome {
                cluster_id: cluster.id,
                pattern,
                entities: Vec::new(),
                shared_media: Default::default(),
                unassigned_media: Default::default(),
                skipped: Some(SkipReason::Unresolved),
                adjudicated: false,
            };
        }

        let candidates = match &self.interpreter {
            Some(interpreter) => {
                interpret_cluster(
                    interpreter.as_ref(),
                    &self.pacer,
                    cluster.id,
                    &sequence,
                    &cluster.category,
                    &self.config.extract,
                    &self.normalizer,
                )
                .await
            }
            None => extract_from_captions(&sequence, &self.config.extract, &self.normalizer),
        };

        let mut next_id = first_entity_id;
        let mut records = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match candidate_record(EntityId(next_id), candidate, &cluster.category, cluster.id) {
                Ok(record) => {
                    records.push(record);
                    next_id += 1;
                }
                Err(e) => warn!(cluster_id = %cluster.id, error = %e, "Candidate rejected"),
            }
        }

        let assignment = assign_media(cluster.id, pattern, &sequence, records, &self.normalizer);
        let skipped = assignment
            .entities
            .is_empty()
            .then_some(SkipReason::NoCandidates);

        let mut outcome = ClusterOutcome {
            cluster_id: cluster.id,
            pattern,
            entities: assignment.entities,
            shared_media: assignment.shared_media,
            unassigned_media: assignment.unassigned_media,
            skipped,
            adjudicated: false,
        };
        self.adjudicate(cluster, &sequence, &mut outcome).await;

        for entity in &mut outcome.entities {
            entity.coordinates = first_coordinates(&entity.media.map_links);
        }

        debug!(
            cluster_id = %cluster.id,
            pattern = %pattern,
            entities = outcome.entities.len(),
            shared = outcome.shared_media.len(),
            unassigned = outcome.unassigned_media.len(),
            adjudicated = outcome.adjudicated,
            "Processed cluster"
        );
        outcome
    }

    /// Settle a cluster's shared media with the adjudicator, if one is set.
    async fn adjudicate(
        &self,
        cluster: &Cluster,
        sequence: &[TypedItem],
        outcome: &mut ClusterOutcome,
    ) {
        let Some(adjudicator) = &self.adjudicator else {
            return;
        };
        if outcome.shared_media.is_empty() || outcome.entities.is_empty() {
            return;
        }

        let request = adjudication_request(cluster, sequence, outcome);
        if let Some(answer) = adjudicate_cluster(
            adjudicator.as_ref(),
            &self.pacer,
            &request,
            &self.config.extract,
        )
        .await
        {
            apply_adjudication(outcome, &answer, &self.normalizer);
        }
    }

    /// Merge stream entities into the catalog.
    pub fn merge(&self, catalog: &[CatalogEntity], stream: &[EntityRecord]) -> MergeOutcome {
        Merger::new(self.config.merge, &self.normalizer, &self.similarity).merge(catalog, stream)
    }

    // =========================================================================
    // High-Level API
    // =========================================================================

    /// Segment and process every cluster, checkpointing after each.
    ///
    /// A checkpoint for the same cluster layout and extraction method is
    /// resumed; any other, or one that cannot be read, is discarded. The
    /// checkpoint is cleared when the run completes.
    pub async fn extract(
        &self,
        messages: Vec<Message>,
        categories: &HashMap<TopicId, String>,
        cancel: CancellationToken,
    ) -> Result<Run> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        // First copy of a repeated id wins, matching topic grouping
        let mut message_index: HashMap<MessageId, Message> = HashMap::with_capacity(messages.len());
        for message in &messages {
            message_index
                .entry(message.id)
                .or_insert_with(|| message.clone());
        }

        let (groups, clusters) = self.segment_parallel(messages, categories).await;
        let fingerprint = self.fingerprint(&clusters);
        info!(
            run_id = %run_id,
            topics = groups.len(),
            clusters = clusters.len(),
            "Segmented stream"
        );

        let mut outcomes = self.restore(&fingerprint, clusters.len()).await?;
        let resumed_after = outcomes.last().map(|o| o.cluster_id);
        let by_id: HashMap<MessageId, &Message> =
            message_index.iter().map(|(id, m)| (*id, m)).collect();

        for cluster in clusters.iter().skip(outcomes.len()) {
            if cancel.is_cancelled() {
                let last_completed = outcomes.last().map(|o| o.cluster_id.0);
                info!(run_id = %run_id, ?last_completed, "Run cancelled");
                return Err(ReconcileError::Cancelled { last_completed });
            }

            let first_entity_id: usize = outcomes.iter().map(|o| o.entities.len()).sum();
            let outcome = self
                .process_cluster(cluster, &by_id, first_entity_id as u32)
                .await;
            outcomes.push(outcome);

            self.store
                .save(&Checkpoint {
                    fingerprint: fingerprint.clone(),
                    last_cluster_id: cluster.id,
                    extracted: outcomes.clone(),
                })
                .await?;
        }

        self.store.clear().await?;

        let entities: Vec<EntityRecord> = outcomes
            .iter()
            .flat_map(|o| o.entities.iter().cloned())
            .collect();

        info!(
            run_id = %run_id,
            clusters = clusters.len(),
            entities = entities.len(),
            needs_review = outcomes.iter().filter(|o| o.needs_review()).count(),
            "Extraction complete"
        );

        Ok(Run {
            id: run_id,
            started_at,
            fingerprint,
            clusters,
            outcomes,
            entities,
            resumed_after,
        })
    }

    /// Full pipeline: extract from the stream, then merge with the catalog.
    pub async fn reconcile(
        &self,
        messages: Vec<Message>,
        categories: &HashMap<TopicId, String>,
        catalog: &[CatalogEntity],
        cancel: CancellationToken,
    ) -> Result<Reconciliation> {
        let run = self.extract(messages, categories, cancel).await?;
        let merge = self.merge(catalog, &run.entities);
        Ok(Reconciliation { run, merge })
    }

    /// Load completed outcomes for this run, discarding stale or unreadable
    /// checkpoints.
    async fn restore(&self, fingerprint: &str, cluster_count: usize) -> Result<Vec<ClusterOutcome>> {
        let checkpoint = match self.store.load().await {
            Ok(Some(checkpoint)) => checkpoint,
            Ok(None) => return Ok(Vec::new()),
            Err(ReconcileError::JsonParse(e)) => {
                warn!(error = %e, "Checkpoint unreadable, discarding");
                self.store.clear().await?;
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let done = checkpoint.last_cluster_id.index() + 1;
        let consistent = checkpoint.matches(fingerprint)
            && checkpoint.extracted.len() == done
            && done <= cluster_count;
        if !consistent {
            warn!(
                last_cluster_id = %checkpoint.last_cluster_id,
                "Checkpoint does not match this run, discarding"
            );
            self.store.clear().await?;
            return Ok(Vec::new());
        }

        info!(
            last_cluster_id = %checkpoint.last_cluster_id,
            "Resuming from checkpoint"
        );
        Ok(checkpoint.extracted)
    }
}

fn number_clusters(groups: &[TopicGroup], segments: Vec<Segment>) -> Vec<Cluster> {
    let categories: HashMap<Option<TopicId>, &str> = groups
        .iter()
        .map(|g| (g.topic_id, g.category.as_str()))
        .collect();

    segments
        .into_iter()
        .enumerate()
        .map(|(index, segment)| Cluster {
            id: ClusterId(index as u32),
            topic_id: segment.topic_id,
            category: categories
                .get(&segment.topic_id)
                .map(|c| c.to_string())
                .unwrap_or_default(),
            message_ids: segment.message_ids,
        })
        .collect()
}
