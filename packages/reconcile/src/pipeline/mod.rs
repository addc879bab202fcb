//! Reconciliation pipeline - the core of the library.
//!
//! The pipeline runs, per stream:
//! - Topic grouping and segmentation into clusters
//! - Pattern classification of each cluster's text/media sequence
//! - Entity extraction (caption parsing or an interpreter)
//! - Media assignment within each cluster, with optional adjudication of
//!   clusters held for review
//! - Catalog-anchored deduplication and merge
//! - Summary and flat export rows

pub mod adjudicate;
pub mod assign;
pub mod classify;
pub mod extract;
pub mod links;
pub mod merge;
pub mod normalize;
pub mod prompts;
pub mod report;
pub mod run;
pub mod segment;
pub mod topics;

pub use adjudicate::{
    adjudicate_cluster, adjudication_request, apply_adjudication, conversation_text,
};
pub use assign::{assign_media, Assignment};
pub use classify::{classify, type_sequence, ItemKind, TypedItem};
pub use extract::{
    bounded_call, candidate_record, cluster_text, extract_from_captions, infer_damage,
    interpret_cluster, media_counts, parse_caption,
};
pub use links::{extract_coordinates, extract_links, first_coordinates, is_map_link};
pub use merge::{DropReason, DroppedEntity, MatchAudit, MergeOutcome, Merger, PairScore};
pub use normalize::{category_key, Normalizer};
pub use prompts::{
    fill_template, format_adjudicate_prompt, format_interpret_prompt, prompt_hash,
    ADJUDICATE_PROMPT, INTERPRET_PROMPT,
};
pub use report::{review_rows, FlatRecord, ReviewRow, Summary, LIST_SEPARATOR};
pub use run::{run_fingerprint, Reconciler, Reconciliation, Run};
pub use segment::{segment_topic, segment_topics, segment_topics_parallel, starts_new_cluster, Segment};
pub use topics::{group_by_topic, TopicGroup};
