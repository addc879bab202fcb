//! Stream/Catalog Reconciliation Library
//!
//! Reconstructs a catalog of physical sites from two noisy sources: a
//! chronological chat stream (text, photos, videos, map links, grouped
//! into topic channels) and independently compiled spreadsheet catalogs.
//!
//! # Pipeline
//!
//! 1. Segment each topic's messages into clusters by time and id gaps
//! 2. Classify each cluster's text/media ordering
//! 3. Extract entities and bind media to them, flagging ambiguous clusters
//!    (an optional adjudicator may settle them)
//! 4. Merge stream entities into the catalog by fuzzy name/area matching
//!
//! # Usage
//!
//! ```rust,ignore
//! use reconcile::{Reconciler, ReconcileConfig, Summary};
//! use tokio_util::sync::CancellationToken;
//!
//! let reconciler = Reconciler::new(ReconcileConfig::default());
//! let result = reconciler
//!     .reconcile(messages, &categories, &catalog, CancellationToken::new())
//!     .await?;
//!
//! for record in &result.merge.canonical {
//!     println!("{} ({})", record.name, record.source);
//! }
//! println!("{}", Summary::from_reconciliation(&result));
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Capability seams (Similarity, Interpreter, Adjudicator, CheckpointStore)
//! - [`types`] - Data model and configuration
//! - [`pipeline`] - Components and run orchestration
//! - [`stores`] - Checkpoint backends
//! - [`interpreters`] - Call pacing and prompted completion
//! - [`testing`] - Mock implementations for testing

pub mod error;
pub mod interpreters;
pub mod pipeline;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{InterpretError, InterpretResult, ReconcileError, Result};
pub use traits::{
    adjudicator::{Adjudication, AdjudicationRequest, Adjudicator},
    interpreter::{Candidate, Completion, Interpreter, MediaCounts},
    similarity::{JaroWinkler, Levenshtein, Similarity},
    store::{Checkpoint, CheckpointStore},
};
pub use types::{
    catalog::CatalogEntity,
    cluster::{Cluster, ClusterId, ClusterOutcome, Pattern, SkipReason},
    config::{ExtractConfig, MergeConfig, NormalizeConfig, ReconcileConfig, SegmentConfig},
    entity::{
        CatalogRowRef, Confidence, Coordinates, DamageStatus, EntityId, EntityRecord, MediaSet,
        Provenance, Source,
    },
    message::{MediaItem, MediaKind, MediaRef, Message, MessageId, TopicId},
};

// Re-export the Reconciler from pipeline
pub use pipeline::{Reconciler, Reconciliation, Run};

// Re-export pipeline components
pub use pipeline::{
    // Stages
    adjudicate_cluster, apply_adjudication, assign_media, classify, extract_coordinates,
    extract_links, group_by_topic, segment_topic, type_sequence,
    // Merge
    DropReason, DroppedEntity, MatchAudit, MergeOutcome, Merger,
    // Normalization
    Normalizer,
    // Reporting
    review_rows, FlatRecord, ReviewRow, Summary,
};

// Re-export stores
pub use stores::{JsonFileCheckpointStore, MemoryCheckpointStore};

// Re-export interpreters
pub use interpreters::{CallPacer, CompletionInterpreter};

// Re-export testing utilities
pub use testing::{MockAdjudicator, MockCompletion, MockInterpreter};
