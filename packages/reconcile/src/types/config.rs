//! Configuration types for segmentation, normalization, merging and extraction.

use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, Result};

/// Top-level configuration for a reconciliation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub segment: SegmentConfig,
    pub normalize: NormalizeConfig,
    pub merge: MergeConfig,
    pub extract: ExtractConfig,

    /// Category name used for topic-less or unmapped messages.
    pub unknown_category: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            segment: SegmentConfig::default(),
            normalize: NormalizeConfig::default(),
            merge: MergeConfig::default(),
            extract: ExtractConfig::default(),
            unknown_category: "unknown".to_string(),
        }
    }
}

impl ReconcileConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_segment(mut self, segment: SegmentConfig) -> Self {
        self.segment = segment;
        self
    }

    pub fn with_normalize(mut self, normalize: NormalizeConfig) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_merge(mut self, merge: MergeConfig) -> Self {
        self.merge = merge;
        self
    }

    pub fn with_extract(mut self, extract: ExtractConfig) -> Self {
        self.extract = extract;
        self
    }

    pub fn with_unknown_category(mut self, category: impl Into<String>) -> Self {
        self.unknown_category = category.into();
        self
    }

    /// Reject settings that would make a run meaningless.
    pub fn validate(&self) -> Result<()> {
        self.segment.validate()?;
        self.merge.validate()?;
        self.extract.validate()?;
        if self.unknown_category.trim().is_empty() {
            return Err(config_error("unknown_category must not be empty"));
        }
        Ok(())
    }
}

/// Adjacency thresholds for the stream segmenter.
///
/// A new cluster starts when either gap strictly exceeds its threshold.
/// A `None` threshold is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Maximum minutes between consecutive messages of one cluster.
    ///
    /// Default: 10.
    pub max_time_gap_minutes: Option<i64>,

    /// Maximum id difference between consecutive messages of one cluster.
    ///
    /// Default: 10.
    pub max_id_gap: Option<i64>,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            max_time_gap_minutes: Some(10),
            max_id_gap: Some(10),
        }
    }
}

impl SegmentConfig {
    /// Coarse segmentation: 30-minute time threshold, no id threshold.
    pub fn coarse() -> Self {
        Self {
            max_time_gap_minutes: Some(30),
            max_id_gap: None,
        }
    }

    pub fn with_max_time_gap_minutes(mut self, minutes: Option<i64>) -> Self {
        self.max_time_gap_minutes = minutes;
        self
    }

    pub fn with_max_id_gap(mut self, ids: Option<i64>) -> Self {
        self.max_id_gap = ids;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_time_gap_minutes.is_some_and(|m| m < 0) {
            return Err(config_error("max_time_gap_minutes must be >= 0"));
        }
        if self.max_id_gap.is_some_and(|g| g < 0) {
            return Err(config_error("max_id_gap must be >= 0"));
        }
        Ok(())
    }
}

/// Text normalization vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Generic words meaning "this is a building of kind X", stripped from
    /// the start of names and captions.
    pub honorific_prefixes: Vec<String>,

    /// Orthographic variants folded to one canonical letter, as `(from, to)`.
    pub letter_folds: Vec<(char, char)>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            honorific_prefixes: ["مسجد", "جامع", "مصلى", "mosque", "masjid", "chapel", "shrine"]
                .into_iter()
                .map(String::from)
                .collect(),
            letter_folds: vec![('أ', 'ا'), ('إ', 'ا'), ('آ', 'ا'), ('ة', 'ه'), ('ى', 'ي')],
        }
    }
}

impl NormalizeConfig {
    pub fn with_honorific_prefixes(
        mut self,
        prefixes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.honorific_prefixes = prefixes.into_iter().map(|p| p.into()).collect();
        self
    }

    pub fn with_letter_folds(mut self, folds: impl IntoIterator<Item = (char, char)>) -> Self {
        self.letter_folds = folds.into_iter().collect();
        self
    }
}

/// Deduplication scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Minimum combined score to accept a match.
    ///
    /// Default: 0.85.
    pub threshold: f64,

    /// Weight of name similarity. Default: 0.7.
    pub name_weight: f64,

    /// Weight of area similarity. Default: 0.3.
    pub area_weight: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            threshold: 0.85,
            name_weight: 0.7,
            area_weight: 0.3,
        }
    }
}

impl MergeConfig {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_weights(mut self, name_weight: f64, area_weight: f64) -> Self {
        self.name_weight = name_weight;
        self.area_weight = area_weight;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(config_error("merge threshold must be within [0, 1]"));
        }
        if self.name_weight < 0.0 || self.area_weight < 0.0 {
            return Err(config_error("merge weights must be non-negative"));
        }
        if ((self.name_weight + self.area_weight) - 1.0).abs() > 1e-9 {
            return Err(config_error("merge weights must sum to 1"));
        }
        Ok(())
    }
}

/// Entity extraction and interpretation call policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Attempts per cluster before degrading to zero candidates. Default: 2.
    pub max_attempts: u32,

    /// Per-call timeout. Default: 30s.
    pub call_timeout_ms: u64,

    /// Fixed delay between interpretation calls. Default: 1s.
    pub call_delay_ms: u64,

    /// Keywords marking a caption as damaged.
    pub damaged_keywords: Vec<String>,

    /// Keywords marking a caption as demolished. Checked before damaged.
    pub demolished_keywords: Vec<String>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            call_timeout_ms: 30_000,
            call_delay_ms: 1_000,
            damaged_keywords: ["متضرر", "متضررة", "damaged", "partially"]
                .into_iter()
                .map(String::from)
                .collect(),
            demolished_keywords: ["مدمر", "مدمرة", "demolished", "destroyed"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl ExtractConfig {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_call_timeout_ms(mut self, millis: u64) -> Self {
        self.call_timeout_ms = millis;
        self
    }

    pub fn with_call_delay_ms(mut self, millis: u64) -> Self {
        self.call_delay_ms = millis;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(config_error("max_attempts must be at least 1"));
        }
        if self.call_timeout_ms == 0 {
            return Err(config_error("call_timeout_ms must be positive"));
        }
        if self.call_delay_ms >= self.call_timeout_ms {
            return Err(config_error("call_delay_ms must be shorter than call_timeout_ms"));
        }
        Ok(())
    }
}

fn config_error(reason: &str) -> ReconcileError {
    ReconcileError::Config {
        reason: reason.to_string(),
    }
}
