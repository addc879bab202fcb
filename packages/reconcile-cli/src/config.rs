//! Configuration for the reconcile CLI.
//!
//! Layered, later layers win:
//! - `ReconcileConfig::default()`
//! - a JSON file given with `--config` (partial files are fine)
//! - `RECONCILE_*` environment variables, with `.env` loaded first

use anyhow::{Context, Result};
use dotenvy::dotenv;
use reconcile::ReconcileConfig;
use std::env;
use std::fs;
use std::path::Path;

/// Merge similarity threshold, in [0, 1].
pub const ENV_SIMILARITY_THRESHOLD: &str = "RECONCILE_SIMILARITY_THRESHOLD";
/// Segmenter time threshold in minutes; `off` disables it.
pub const ENV_MAX_TIME_GAP_MINUTES: &str = "RECONCILE_MAX_TIME_GAP_MINUTES";
/// Segmenter id threshold; `off` disables it.
pub const ENV_MAX_ID_GAP: &str = "RECONCILE_MAX_ID_GAP";
/// Fixed delay between interpretation calls.
pub const ENV_CALL_DELAY_MS: &str = "RECONCILE_CALL_DELAY_MS";

/// Load configuration from an optional JSON file and the environment.
pub fn load(config_file: Option<&Path>) -> Result<ReconcileConfig> {
    // Load .env file if present (development)
    let _ = dotenv();

    let config = match config_file {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        }
        None => ReconcileConfig::default(),
    };

    let config = apply_overrides(config, |name| env::var(name).ok())?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Apply `RECONCILE_*` overrides looked up through `var`.
pub fn apply_overrides(
    mut config: ReconcileConfig,
    var: impl Fn(&str) -> Option<String>,
) -> Result<ReconcileConfig> {
    if let Some(value) = var(ENV_SIMILARITY_THRESHOLD) {
        config.merge.threshold = value
            .trim()
            .parse()
            .with_context(|| format!("{ENV_SIMILARITY_THRESHOLD} must be a number"))?;
    }
    if let Some(value) = var(ENV_MAX_TIME_GAP_MINUTES) {
        config.segment.max_time_gap_minutes = parse_threshold(&value)
            .with_context(|| format!("{ENV_MAX_TIME_GAP_MINUTES} must be a number or `off`"))?;
    }
    if let Some(value) = var(ENV_MAX_ID_GAP) {
        config.segment.max_id_gap = parse_threshold(&value)
            .with_context(|| format!("{ENV_MAX_ID_GAP} must be a number or `off`"))?;
    }
    if let Some(value) = var(ENV_CALL_DELAY_MS) {
        config.extract.call_delay_ms = value
            .trim()
            .parse()
            .with_context(|| format!("{ENV_CALL_DELAY_MS} must be a whole number"))?;
    }
    Ok(config)
}

fn parse_threshold(value: &str) -> Result<Option<i64>> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("off") || value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    Ok(Some(value.parse()?))
}
