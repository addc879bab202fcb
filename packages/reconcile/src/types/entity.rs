//! Canonical entity records and their enumerations.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::cluster::ClusterId;
use super::message::MediaItem;
use crate::error::{ReconcileError, Result};

/// Arena index of a stream entity within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u32);

impl EntityId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:05}", self.0)
    }
}

/// Damage status of a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageStatus {
    Damaged,
    Demolished,
    #[default]
    Unknown,
}

impl DamageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Damaged => "damaged",
            Self::Demolished => "demolished",
            Self::Unknown => "unknown",
        }
    }

    /// Lenient parse of a free-form label. Unrecognized labels are `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "damaged" | "partially damaged" | "partial" | "متضرر" | "متضررة" => Self::Damaged,
            "demolished" | "destroyed" | "مدمر" | "مدمرة" => Self::Demolished,
            _ => Self::Unknown,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for DamageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse trust level. Ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Parse a label. Unrecognized labels fall to `Low`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "high" => Self::High,
            "medium" => Self::Medium,
            _ => Self::Low,
        }
    }

    /// The lowest tier, which is excluded from the canonical catalog.
    pub fn is_lowest(&self) -> bool {
        matches!(self, Self::Low)
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a canonical record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "catalog-only")]
    CatalogOnly,
    #[serde(rename = "catalog+stream")]
    CatalogAndStream,
    #[serde(rename = "stream-only")]
    StreamOnly,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CatalogOnly => "catalog-only",
            Self::CatalogAndStream => "catalog+stream",
            Self::StreamOnly => "stream-only",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media attached to an entity. Each list is an insertion-ordered set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSet {
    pub photos: Vec<String>,
    pub videos: Vec<String>,
    pub map_links: Vec<String>,
}

impl MediaSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item, ignoring duplicates. Returns true if it was new.
    pub fn insert(&mut self, item: &MediaItem) -> bool {
        let (list, value) = match item {
            MediaItem::Photo(v) => (&mut self.photos, v),
            MediaItem::Video(v) => (&mut self.videos, v),
            MediaItem::MapLink(v) => (&mut self.map_links, v),
        };
        if list.iter().any(|existing| existing == value) {
            return false;
        }
        list.push(value.clone());
        true
    }

    /// Union `other` into `self`, keeping existing order first.
    pub fn extend_from(&mut self, other: &MediaSet) {
        for item in other.items() {
            self.insert(&item);
        }
    }

    /// All items, photos first, then videos, then map links.
    pub fn items(&self) -> Vec<MediaItem> {
        self.photos
            .iter()
            .cloned()
            .map(MediaItem::Photo)
            .chain(self.videos.iter().cloned().map(MediaItem::Video))
            .chain(self.map_links.iter().cloned().map(MediaItem::MapLink))
            .collect()
    }

    pub fn contains(&self, item: &MediaItem) -> bool {
        match item {
            MediaItem::Photo(v) => self.photos.contains(v),
            MediaItem::Video(v) => self.videos.contains(v),
            MediaItem::MapLink(v) => self.map_links.contains(v),
        }
    }

    /// True if every item of `other` is also in `self`.
    pub fn contains_all(&self, other: &MediaSet) -> bool {
        other.photos.iter().all(|p| self.photos.contains(p))
            && other.videos.iter().all(|v| self.videos.contains(v))
            && other.map_links.iter().all(|l| self.map_links.contains(l))
    }

    pub fn len(&self) -> usize {
        self.photos.len() + self.videos.len() + self.map_links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<MediaItem> for MediaSet {
    fn from_iter<I: IntoIterator<Item = MediaItem>>(iter: I) -> Self {
        let mut set = Self::new();
        for item in iter {
            set.insert(&item);
        }
        set
    }
}

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Build a position, rejecting values outside the valid ranges.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self {
            latitude,
            longitude,
        })
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// Pointer back to the spreadsheet row a record came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRowRef {
    pub origin_file: String,
    pub row_number: u32,
}

impl fmt::Display for CatalogRowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.origin_file, self.row_number)
    }
}

/// Which clusters and which catalog row contributed to a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(default)]
    pub clusters: Vec<ClusterId>,
    #[serde(default)]
    pub catalog_row: Option<CatalogRowRef>,
}

/// The canonical description of one physical site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    pub name: String,
    pub area: Option<String>,
    pub category: String,
    pub damage_status: DamageStatus,
    pub confidence: Confidence,
    pub source: Source,
    pub media: MediaSet,
    /// Position parsed from the first map link that carries one.
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    pub provenance: Provenance,
    pub needs_review: bool,
}

impl EntityRecord {
    /// Create a stream-extracted record. Rejects a blank name.
    pub fn stream(
        id: EntityId,
        name: impl Into<String>,
        category: impl Into<String>,
        cluster: ClusterId,
    ) -> Result<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(ReconcileError::invalid("entity name is empty"));
        }
        Ok(Self {
            id,
            name,
            area: None,
            category: category.into(),
            damage_status: DamageStatus::Unknown,
            confidence: Confidence::Medium,
            source: Source::StreamOnly,
            media: MediaSet::new(),
            coordinates: None,
            provenance: Provenance {
                clusters: vec![cluster],
                catalog_row: None,
            },
            needs_review: false,
        })
    }

    /// Set the area; blank areas are treated as absent.
    pub fn with_area(mut self, area: Option<String>) -> Self {
        self.area = area
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());
        self
    }

    pub fn with_damage_status(mut self, status: DamageStatus) -> Self {
        self.damage_status = status;
        self
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_set_is_ordered_and_deduplicated() {
        let mut set = MediaSet::new();
        assert!(set.insert(&MediaItem::Photo("p2".into())));
        assert!(set.insert(&MediaItem::Photo("p1".into())));
        assert!(!set.insert(&MediaItem::Photo("p2".into())));
        assert!(set.insert(&MediaItem::MapLink("https://maps.app.goo.gl/x".into())));

        assert_eq!(set.photos, vec!["p2", "p1"]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_media_set_union_keeps_everything() {
        let a: MediaSet = vec![MediaItem::Photo("p1".into()), MediaItem::Video("v1".into())]
            .into_iter()
            .collect();
        let b: MediaSet = vec![MediaItem::Photo("p1".into()), MediaItem::Photo("p3".into())]
            .into_iter()
            .collect();

        let mut merged = a.clone();
        merged.extend_from(&b);

        assert!(merged.contains_all(&a));
        assert!(merged.contains_all(&b));
        assert_eq!(merged.photos, vec!["p1", "p3"]);
    }

    #[test]
    fn test_stream_record_rejects_blank_name() {
        let err = EntityRecord::stream(EntityId(0), "   ", "Province X", ClusterId(0));
        assert!(matches!(err, Err(ReconcileError::InvalidRecord { .. })));
    }

    #[test]
    fn test_blank_area_is_absent() {
        let record = EntityRecord::stream(EntityId(0), "Site", "P", ClusterId(0))
            .unwrap()
            .with_area(Some("  ".into()));
        assert_eq!(record.area, None);
    }

    #[test]
    fn test_coordinates_reject_out_of_range() {
        assert!(Coordinates::new(33.51, 36.29).is_some());
        assert!(Coordinates::new(-90.0, 180.0).is_some());
        assert!(Coordinates::new(91.0, 36.0).is_none());
        assert!(Coordinates::new(33.0, -181.0).is_none());
    }

    #[test]
    fn test_label_parsing() {
        assert_eq!(DamageStatus::from_label("Destroyed"), DamageStatus::Demolished);
        assert_eq!(DamageStatus::from_label("مدمر"), DamageStatus::Demolished);
        assert_eq!(DamageStatus::from_label("???"), DamageStatus::Unknown);
        assert_eq!(Confidence::from_label(" HIGH "), Confidence::High);
        assert_eq!(Confidence::from_label("unsure"), Confidence::Low);
        assert!(Confidence::Low < Confidence::Medium);
    }
}
