//! Summary counts and flat export rows.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::merge::MergeOutcome;
use super::run::{Reconciliation, Run};
use crate::types::cluster::{ClusterOutcome, Pattern};
use crate::types::entity::{EntityRecord, MediaSet};

/// Separator for list-valued fields in flat rows.
pub const LIST_SEPARATOR: &str = "; ";

/// One entity as a flat row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatRecord {
    pub entity_id: u32,
    pub name: String,
    pub area: String,
    pub category: String,
    pub damage_status: String,
    pub confidence: String,
    pub source: String,
    pub photos: String,
    pub videos: String,
    pub map_links: String,
    /// Empty when the record has no coordinates.
    pub latitude: String,
    pub longitude: String,
    pub clusters: String,
    pub catalog_row: String,
    pub needs_review: bool,
}

impl FlatRecord {
    /// Column names, in field order.
    pub const HEADERS: [&'static str; 15] = [
        "entity_id",
        "name",
        "area",
        "category",
        "damage_status",
        "confidence",
        "source",
        "photos",
        "videos",
        "map_links",
        "latitude",
        "longitude",
        "clusters",
        "catalog_row",
        "needs_review",
    ];

    /// Field values, in header order.
    pub fn values(&self) -> Vec<String> {
        vec![
            self.entity_id.to_string(),
            self.name.clone(),
            self.area.clone(),
            self.category.clone(),
            self.damage_status.clone(),
            self.confidence.clone(),
            self.source.clone(),
            self.photos.clone(),
            self.videos.clone(),
            self.map_links.clone(),
            self.latitude.clone(),
            self.longitude.clone(),
            self.clusters.clone(),
            self.catalog_row.clone(),
            self.needs_review.to_string(),
        ]
    }
}

impl From<&EntityRecord> for FlatRecord {
    fn from(record: &EntityRecord) -> Self {
        Self {
            entity_id: record.id.0,
            name: record.name.clone(),
            area: record.area.clone().unwrap_or_default(),
            category: record.category.clone(),
            damage_status: record.damage_status.to_string(),
            confidence: record.confidence.to_string(),
            source: record.source.to_string(),
            photos: record.media.photos.join(LIST_SEPARATOR),
            videos: record.media.videos.join(LIST_SEPARATOR),
            map_links: record.media.map_links.join(LIST_SEPARATOR),
            latitude: record
                .coordinates
                .map(|c| c.latitude.to_string())
                .unwrap_or_default(),
            longitude: record
                .coordinates
                .map(|c| c.longitude.to_string())
                .unwrap_or_default(),
            clusters: record
                .provenance
                .clusters
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(LIST_SEPARATOR),
            catalog_row: record
                .provenance
                .catalog_row
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            needs_review: record.needs_review,
        }
    }
}

/// A cluster awaiting adjudication, as a flat row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRow {
    pub cluster_id: String,
    pub category: String,
    pub pattern: String,
    pub entities: String,
    pub photos: String,
    pub videos: String,
    pub map_links: String,
}

impl ReviewRow {
    pub const HEADERS: [&'static str; 7] = [
        "cluster_id",
        "category",
        "pattern",
        "entities",
        "photos",
        "videos",
        "map_links",
    ];

    pub fn values(&self) -> Vec<String> {
        vec![
            self.cluster_id.clone(),
            self.category.clone(),
            self.pattern.clone(),
            self.entities.clone(),
            self.photos.clone(),
            self.videos.clone(),
            self.map_links.clone(),
        ]
    }

    fn new(run: &Run, outcome: &ClusterOutcome) -> Self {
        let category = run
            .cluster(outcome.cluster_id)
            .map(|c| c.category.clone())
            .unwrap_or_default();
        let media: &MediaSet = &outcome.shared_media;
        Self {
            cluster_id: outcome.cluster_id.to_string(),
            category,
            pattern: outcome.pattern.to_string(),
            entities: outcome
                .entities
                .iter()
                .map(|e| e.name.as_str())
                .collect::<Vec<_>>()
                .join(LIST_SEPARATOR),
            photos: media.photos.join(LIST_SEPARATOR),
            videos: media.videos.join(LIST_SEPARATOR),
            map_links: media.map_links.join(LIST_SEPARATOR),
        }
    }
}

/// Review rows for every flagged cluster, in cluster order.
pub fn review_rows(run: &Run) -> Vec<ReviewRow> {
    run.needs_review().map(|o| ReviewRow::new(run, o)).collect()
}

/// Counts over a finished reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub by_category: BTreeMap<String, usize>,
    pub by_confidence: BTreeMap<String, usize>,
    pub by_source: BTreeMap<String, usize>,
    pub by_damage: BTreeMap<String, usize>,
    pub needs_review: usize,
    pub with_photos: usize,
    pub with_videos: usize,
    pub with_map_links: usize,
    pub with_coordinates: usize,
    pub low_confidence_dropped: usize,
    pub matches: usize,
    pub clusters: usize,
    pub clusters_by_pattern: BTreeMap<String, usize>,
    pub adjudicated_clusters: usize,
    pub unassigned_media: usize,
}

impl Summary {
    /// Counts over the canonical catalog only.
    pub fn from_merge(merge: &MergeOutcome) -> Self {
        let mut summary = Self {
            total: merge.canonical.len(),
            low_confidence_dropped: merge.low_confidence.len(),
            matches: merge.matches.len(),
            ..Default::default()
        };
        for record in &merge.canonical {
            *summary
                .by_category
                .entry(record.category.clone())
                .or_default() += 1;
            *summary
                .by_confidence
                .entry(record.confidence.to_string())
                .or_default() += 1;
            *summary.by_source.entry(record.source.to_string()).or_default() += 1;
            *summary
                .by_damage
                .entry(record.damage_status.to_string())
                .or_default() += 1;
            summary.needs_review += usize::from(record.needs_review);
            summary.with_photos += usize::from(!record.media.photos.is_empty());
            summary.with_videos += usize::from(!record.media.videos.is_empty());
            summary.with_map_links += usize::from(!record.media.map_links.is_empty());
            summary.with_coordinates += usize::from(record.coordinates.is_some());
        }
        summary
    }

    /// Counts over the canonical catalog and the run's clusters.
    pub fn from_reconciliation(result: &Reconciliation) -> Self {
        let mut summary = Self::from_merge(&result.merge);
        summary.clusters = result.run.clusters.len();
        for pattern in [
            Pattern::SingleEntity,
            Pattern::EntityThenMedia,
            Pattern::MediaThenEntity,
            Pattern::Unresolved,
        ] {
            let count = result.run.count_pattern(pattern);
            if count > 0 {
                summary
                    .clusters_by_pattern
                    .insert(pattern.to_string(), count);
            }
        }
        summary.adjudicated_clusters = result.run.outcomes.iter().filter(|o| o.adjudicated).count();
        summary.unassigned_media = result
            .run
            .outcomes
            .iter()
            .map(|o| o.unassigned_media.len())
            .sum();
        summary
    }
}

fn write_counts(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    counts: &BTreeMap<String, usize>,
) -> fmt::Result {
    writeln!(f, "{title}:")?;
    for (key, count) in counts {
        writeln!(f, "  {key:<24} {count:>6}")?;
    }
    Ok(())
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Canonical entities: {}", self.total)?;
        writeln!(f, "Catalog matches:    {}", self.matches)?;
        writeln!(f, "Needs review:       {}", self.needs_review)?;
        writeln!(f, "Low confidence (dropped): {}", self.low_confidence_dropped)?;
        writeln!(f)?;
        write_counts(f, "By category", &self.by_category)?;
        write_counts(f, "By source", &self.by_source)?;
        write_counts(f, "By confidence", &self.by_confidence)?;
        write_counts(f, "By damage status", &self.by_damage)?;
        writeln!(f)?;
        writeln!(f, "Media coverage:")?;
        writeln!(f, "  with photos              {:>6}", self.with_photos)?;
        writeln!(f, "  with videos              {:>6}", self.with_videos)?;
        writeln!(f, "  with map links           {:>6}", self.with_map_links)?;
        writeln!(f, "  with coordinates         {:>6}", self.with_coordinates)?;
        if self.clusters > 0 {
            writeln!(f)?;
            writeln!(f, "Clusters: {}", self.clusters)?;
            write_counts(f, "By pattern", &self.clusters_by_pattern)?;
            writeln!(f, "Adjudicated clusters: {}", self.adjudicated_clusters)?;
            writeln!(f, "Unassigned media items: {}", self.unassigned_media)?;
        }
        Ok(())
    }
}
