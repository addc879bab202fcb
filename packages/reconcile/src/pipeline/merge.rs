//! Catalog-anchored deduplication of stream entities.
//!
//! Greedy and order-dependent: catalog rows are visited in input order and
//! each takes its best-scoring unconsumed stream entity of the same
//! category, if the score reaches the threshold. This does not find a
//! globally optimal assignment when one stream entity is the best match for
//! two catalog rows.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use super::normalize::{category_key, Normalizer};
use crate::traits::similarity::Similarity;
use crate::types::catalog::CatalogEntity;
use crate::types::config::MergeConfig;
use crate::types::entity::{
    CatalogRowRef, Confidence, EntityId, EntityRecord, MediaSet, Provenance, Source,
};

/// One accepted match, kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchAudit {
    pub catalog_row: CatalogRowRef,
    pub stream_entity: EntityId,
    pub name_similarity: f64,
    pub area_similarity: f64,
    pub score: f64,
}

/// Why a stream entity was left out of the canonical catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Unmatched and at the lowest confidence tier.
    LowConfidence,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowConfidence => write!(f, "low_confidence"),
        }
    }
}

/// A stream entity excluded from the canonical catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedEntity {
    pub record: EntityRecord,
    pub reason: DropReason,
}

/// Everything the merge produced. Every input is accounted for: each
/// catalog row is in `canonical` exactly once, and each stream entity is
/// either merged, appended to `canonical`, or in `low_confidence`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub canonical: Vec<EntityRecord>,
    pub low_confidence: Vec<DroppedEntity>,
    pub matches: Vec<MatchAudit>,
}

/// Component scores for one catalog/stream pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairScore {
    pub name_similarity: f64,
    pub area_similarity: f64,
    pub score: f64,
}

/// Deduplicates stream entities against a catalog.
pub struct Merger<'a, S: Similarity> {
    config: MergeConfig,
    normalizer: &'a Normalizer,
    similarity: S,
}

impl<'a, S: Similarity> Merger<'a, S> {
    pub fn new(config: MergeConfig, normalizer: &'a Normalizer, similarity: S) -> Self {
        Self {
            config,
            normalizer,
            similarity,
        }
    }

    /// Score a catalog row against a stream entity.
    ///
    /// Area similarity is 0 when either side has no area.
    pub fn score(&self, catalog: &CatalogEntity, stream: &EntityRecord) -> PairScore {
        let name_similarity = self.text_similarity(&catalog.name, &stream.name);
        let area_similarity = match (catalog.area.as_deref(), stream.area.as_deref()) {
            (Some(a), Some(b)) => self.text_similarity(a, b),
            _ => 0.0,
        };
        PairScore {
            name_similarity,
            area_similarity,
            score: self.config.name_weight * name_similarity
                + self.config.area_weight * area_similarity,
        }
    }

    fn text_similarity(&self, a: &str, b: &str) -> f64 {
        let a = self.normalizer.normalize(a);
        let b = self.normalizer.normalize(b);
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        self.similarity.similarity(&a, &b).clamp(0.0, 1.0)
    }

    /// Merge `stream` into `catalog`.
    ///
    /// Canonical order: catalog rows in input order, then unmatched stream
    /// entities in input order. Canonical ids are positions in that list.
    pub fn merge(&self, catalog: &[CatalogEntity], stream: &[EntityRecord]) -> MergeOutcome {
        let mut consumed = vec![false; stream.len()];
        let mut outcome = MergeOutcome::default();
        let stream_keys: Vec<String> = stream.iter().map(|e| category_key(&e.category)).collect();

        for row in catalog {
            let row_key = category_key(&row.category);
            let mut best: Option<(usize, PairScore)> = None;

            for (index, candidate) in stream.iter().enumerate() {
                if consumed[index] || stream_keys[index] != row_key {
                    continue;
                }
                let pair = self.score(row, candidate);
                // Strict comparison: ties keep the earlier candidate
                if best.map_or(true, |(_, b)| pair.score > b.score) {
                    best = Some((index, pair));
                }
            }

            let id = EntityId(outcome.canonical.len() as u32);
            match best {
                Some((index, pair)) if pair.score >= self.config.threshold => {
                    consumed[index] = true;
                    let candidate = &stream[index];
                    debug!(
                        catalog_row = %row.row_ref(),
                        stream_entity = %candidate.id,
                        name_similarity = pair.name_similarity,
                        area_similarity = pair.area_similarity,
                        score = pair.score,
                        "Matched catalog row"
                    );
                    outcome.matches.push(MatchAudit {
                        catalog_row: row.row_ref(),
                        stream_entity: candidate.id,
                        name_similarity: pair.name_similarity,
                        area_similarity: pair.area_similarity,
                        score: pair.score,
                    });
                    outcome.canonical.push(merge_pair(id, row, candidate));
                }
                other => {
                    if let Some((_, pair)) = other {
                        debug!(
                            catalog_row = %row.row_ref(),
                            best_score = pair.score,
                            threshold = self.config.threshold,
                            "Best candidate below threshold"
                        );
                    }
                    outcome.canonical.push(catalog_only(id, row));
                }
            }
        }

        for (index, entity) in stream.iter().enumerate() {
            if consumed[index] {
                continue;
            }
            if entity.confidence.is_lowest() {
                outcome.low_confidence.push(DroppedEntity {
                    record: entity.clone(),
                    reason: DropReason::LowConfidence,
                });
                continue;
            }
            let mut record = entity.clone();
            record.id = EntityId(outcome.canonical.len() as u32);
            record.source = Source::StreamOnly;
            outcome.canonical.push(record);
        }

        info!(
            catalog = catalog.len(),
            stream = stream.len(),
            matched = outcome.matches.len(),
            canonical = outcome.canonical.len(),
            low_confidence = outcome.low_confidence.len(),
            "Merge complete"
        );
        outcome
    }
}

fn catalog_only(id: EntityId, row: &CatalogEntity) -> EntityRecord {
    EntityRecord {
        id,
        name: row.name.clone(),
        area: row.area.clone(),
        category: row.category.clone(),
        damage_status: row.damage_status,
        confidence: Confidence::High,
        source: Source::CatalogOnly,
        media: MediaSet::new(),
        coordinates: None,
        provenance: Provenance {
            clusters: Vec::new(),
            catalog_row: Some(row.row_ref()),
        },
        needs_review: false,
    }
}

/// Catalog fields win; missing area and unknown damage are back-filled from
/// the stream entity. Stream media and coordinates carry over unchanged.
fn merge_pair(id: EntityId, row: &CatalogEntity, stream: &EntityRecord) -> EntityRecord {
    let mut record = catalog_only(id, row);
    if record.area.is_none() {
        record.area = stream.area.clone();
    }
    if !record.damage_status.is_known() {
        record.damage_status = stream.damage_status;
    }
    record.media.extend_from(&stream.media);
    record.coordinates = stream.coordinates;
    record.provenance.clusters = stream.provenance.clusters.clone();
    record.source = Source::CatalogAndStream;
    record.needs_review = stream.needs_review;
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::similarity::Levenshtein;
    use crate::types::cluster::ClusterId;
    use crate::types::entity::{Coordinates, DamageStatus};
    use crate::types::message::MediaItem;

    fn row(name: &str, area: Option<&str>, category: &str, n: u32) -> CatalogEntity {
        let row = CatalogEntity::new(name, category, "catalog.xlsx", n).unwrap();
        match area {
            Some(a) => row.with_area(a),
            None => row,
        }
    }

    fn stream(id: u32, name: &str, area: Option<&str>, confidence: Confidence) -> EntityRecord {
        EntityRecord::stream(EntityId(id), name, "Province X", ClusterId(id))
            .unwrap()
            .with_area(area.map(String::from))
            .with_confidence(confidence)
    }

    fn merge(catalog: &[CatalogEntity], stream: &[EntityRecord]) -> MergeOutcome {
        let normalizer = Normalizer::default();
        Merger::new(MergeConfig::default(), &normalizer, Levenshtein).merge(catalog, stream)
    }

    #[test]
    fn test_identical_pair_merges_and_keeps_media() {
        let catalog = vec![row("Site Alpha", Some("District 1"), "Province X", 1)
            .with_damage_status(DamageStatus::Demolished)];
        let mut s = stream(0, "Site Alpha", Some("District 1"), Confidence::Medium);
        s.media.insert(&MediaItem::Photo("p1".into()));
        s.media.insert(&MediaItem::Photo("p2".into()));

        let outcome = merge(&catalog, &[s.clone()]);

        assert_eq!(outcome.canonical.len(), 1);
        let merged = &outcome.canonical[0];
        assert_eq!(merged.source, Source::CatalogAndStream);
        assert_eq!(merged.confidence, Confidence::High);
        assert_eq!(merged.damage_status, DamageStatus::Demolished);
        assert_eq!(merged.media.photos, vec!["p1", "p2"]);
        assert_eq!(merged.provenance.clusters, vec![ClusterId(0)]);
        assert_eq!(outcome.matches[0].name_similarity, 1.0);
        assert!(merged.media.contains_all(&s.media));
    }

    #[test]
    fn test_merge_carries_stream_coordinates() {
        let catalog = vec![row("Site Alpha", Some("District 1"), "Province X", 1)];
        let mut s = stream(0, "Site Alpha", Some("District 1"), Confidence::Medium);
        s.coordinates = Coordinates::new(33.5, 36.25);

        let outcome = merge(&catalog, &[s]);

        assert_eq!(outcome.canonical[0].source, Source::CatalogAndStream);
        assert_eq!(outcome.canonical[0].coordinates, Coordinates::new(33.5, 36.25));
    }

    #[test]
    fn test_cross_category_never_matches() {
        let catalog = vec![row("Site Alpha", Some("District 1"), "Province Y", 1)];
        let s = stream(0, "Site Alpha", Some("District 1"), Confidence::Medium);

        let outcome = merge(&catalog, &[s]);

        assert!(outcome.matches.is_empty());
        assert_eq!(outcome.canonical.len(), 2);
        assert_eq!(outcome.canonical[0].source, Source::CatalogOnly);
        assert_eq!(outcome.canonical[1].source, Source::StreamOnly);
    }

    #[test]
    fn test_category_compared_loosely() {
        let catalog = vec![row("Site Alpha", Some("District 1"), "  province   x ", 1)];
        let s = stream(0, "Site Alpha", Some("District 1"), Confidence::Medium);
        assert_eq!(merge(&catalog, &[s]).matches.len(), 1);
    }

    #[test]
    fn test_missing_area_caps_score() {
        // Name alone contributes at most 0.7
        let catalog = vec![row("Site Alpha", None, "Province X", 1)];
        let s = stream(0, "Site Alpha", Some("District 1"), Confidence::Medium);
        let outcome = merge(&catalog, &[s]);
        assert!(outcome.matches.is_empty());
    }

    #[test]
    fn test_backfills_area_and_damage() {
        let normalizer = Normalizer::default();
        let merger = Merger::new(
            MergeConfig::default().with_threshold(0.7),
            &normalizer,
            Levenshtein,
        );
        let catalog = vec![row("Site Alpha", None, "Province X", 1)];
        let s = stream(0, "Site Alpha", Some("District 1"), Confidence::Medium)
            .with_damage_status(DamageStatus::Damaged);

        let outcome = merger.merge(&catalog, &[s]);

        let merged = &outcome.canonical[0];
        assert_eq!(merged.area.as_deref(), Some("District 1"));
        assert_eq!(merged.damage_status, DamageStatus::Damaged);
    }

    #[test]
    fn test_candidate_consumed_once_in_catalog_order() {
        let catalog = vec![
            row("Site Alpha", Some("District 1"), "Province X", 1),
            row("Site Alpha", Some("District 1"), "Province X", 2),
        ];
        let s = stream(0, "Site Alpha", Some("District 1"), Confidence::Medium);

        let outcome = merge(&catalog, &[s]);

        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].catalog_row.row_number, 1);
        assert_eq!(outcome.canonical[1].source, Source::CatalogOnly);
    }

    #[test]
    fn test_ties_go_to_input_order() {
        let catalog = vec![row("Site Alpha", Some("District 1"), "Province X", 1)];
        let first = stream(0, "Site Alpha", Some("District 1"), Confidence::Medium);
        let second = stream(1, "Site Alpha", Some("District 1"), Confidence::Medium);

        let outcome = merge(&catalog, &[first, second]);

        assert_eq!(outcome.matches[0].stream_entity, EntityId(0));
        assert_eq!(outcome.canonical[1].provenance.clusters, vec![ClusterId(1)]);
    }

    #[test]
    fn test_low_confidence_unmatched_is_dropped_with_reason() {
        let outcome = merge(
            &[],
            &[
                stream(0, "Site Alpha", None, Confidence::Low),
                stream(1, "Site Beta", None, Confidence::Medium),
            ],
        );

        assert_eq!(outcome.canonical.len(), 1);
        assert_eq!(outcome.canonical[0].name, "Site Beta");
        assert_eq!(outcome.canonical[0].id, EntityId(0));
        assert_eq!(outcome.low_confidence.len(), 1);
        assert_eq!(outcome.low_confidence[0].reason, DropReason::LowConfidence);
    }

    #[test]
    fn test_low_confidence_can_still_match() {
        let catalog = vec![row("Site Alpha", Some("District 1"), "Province X", 1)];
        let s = stream(0, "Site Alpha", Some("District 1"), Confidence::Low);
        let outcome = merge(&catalog, &[s]);
        assert_eq!(outcome.matches.len(), 1);
        assert!(outcome.low_confidence.is_empty());
    }

    #[test]
    fn test_honorific_and_letter_variants_match() {
        let catalog = vec![row("مسجد الرحمة", Some("حي الزيتون"), "Province X", 1)];
        let s = stream(0, "جامع الرحمه", Some("حي الزيتون"), Confidence::Medium);
        let outcome = merge(&catalog, &[s]);
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.canonical[0].name, "مسجد الرحمة");
    }
}
