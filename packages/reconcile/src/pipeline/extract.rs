//! Entity extraction from a cluster.
//!
//! Two sources of candidates:
//! - captions, parsed locally (name on the first line, area on the second)
//! - an [`Interpreter`], called with the cluster's text under a timeout and
//!   a bounded number of attempts, paced by a shared [`CallPacer`]
//!
//! Either way, candidates with blank names are discarded and repeated
//! names within one cluster collapse to the first.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::classify::TypedItem;
use super::normalize::Normalizer;
use crate::error::{InterpretError, InterpretResult, Result};
use crate::interpreters::CallPacer;
use crate::traits::interpreter::{Candidate, Interpreter, MediaCounts};
use crate::types::cluster::ClusterId;
use crate::types::config::ExtractConfig;
use crate::types::entity::{Confidence, DamageStatus, EntityId, EntityRecord};
use crate::types::message::MediaItem;

/// Split a caption into a name (first non-empty line) and an optional area
/// (second non-empty line).
pub fn parse_caption(caption: &str) -> Option<(String, Option<String>)> {
    let mut lines = caption.lines().map(str::trim).filter(|l| !l.is_empty());
    let name = lines.next()?.to_string();
    let area = lines.next().map(str::to_string);
    Some((name, area))
}

/// Damage status named by keywords in `text`. Demolished wins over damaged.
pub fn infer_damage(text: &str, config: &ExtractConfig) -> DamageStatus {
    let lower = text.to_lowercase();
    let has = |keywords: &[String]| {
        keywords
            .iter()
            .any(|k| !k.is_empty() && lower.contains(&k.to_lowercase()))
    };
    if has(&config.demolished_keywords) {
        DamageStatus::Demolished
    } else if has(&config.damaged_keywords) {
        DamageStatus::Damaged
    } else {
        DamageStatus::Unknown
    }
}

/// Candidates from every caption in the sequence, in order.
///
/// Confidence is `medium` when the caption names an area or starts with an
/// honorific, `low` otherwise.
pub fn extract_from_captions(
    sequence: &[TypedItem],
    config: &ExtractConfig,
    normalizer: &Normalizer,
) -> Vec<Candidate> {
    let candidates = sequence
        .iter()
        .filter_map(TypedItem::as_text)
        .filter_map(|caption| {
            let (name, area) = parse_caption(caption)?;
            let confidence = if area.is_some() || normalizer.has_honorific(&name) {
                Confidence::Medium
            } else {
                Confidence::Low
            };
            Some(Candidate {
                damage_status: infer_damage(caption, config),
                name,
                area,
                confidence,
            })
        })
        .collect();
    dedupe_candidates(candidates, normalizer)
}

/// Drop blank names and collapse repeated names, keeping the first.
pub fn dedupe_candidates(candidates: Vec<Candidate>, normalizer: &Normalizer) -> Vec<Candidate> {
    let mut seen: Vec<String> = Vec::new();
    candidates
        .into_iter()
        .filter(|candidate| {
            let key = normalizer.normalize(&candidate.name);
            if key.is_empty() || seen.contains(&key) {
                return false;
            }
            seen.push(key);
            true
        })
        .collect()
}

/// The text sent to an interpreter: captions joined by blank lines.
pub fn cluster_text(sequence: &[TypedItem]) -> String {
    sequence
        .iter()
        .filter_map(TypedItem::as_text)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Count the cluster's media by kind.
pub fn media_counts(sequence: &[TypedItem]) -> MediaCounts {
    let mut counts = MediaCounts::default();
    for item in sequence.iter().filter_map(TypedItem::as_media) {
        match item {
            MediaItem::Photo(_) => counts.photos += 1,
            MediaItem::Video(_) => counts.videos += 1,
            MediaItem::MapLink(_) => counts.map_links += 1,
        }
    }
    counts
}

/// Run an external call with a timeout, retrying up to `max_attempts`.
///
/// Each attempt first waits for a permit from `pacer`; the timeout covers
/// only the call itself. Returns `None` once every attempt has failed.
pub async fn bounded_call<T, F, Fut>(
    pacer: &CallPacer,
    config: &ExtractConfig,
    cluster_id: ClusterId,
    capability: &str,
    mut call: F,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = InterpretResult<T>>,
{
    let limit = Duration::from_millis(config.call_timeout_ms);

    for attempt in 1..=config.max_attempts {
        pacer.ready().await;
        let error = match tokio::time::timeout(limit, call()).await {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(e)) => e,
            Err(_) => InterpretError::Timeout {
                millis: config.call_timeout_ms,
            },
        };
        warn!(
            cluster_id = %cluster_id,
            capability,
            attempt,
            max_attempts = config.max_attempts,
            error = %error,
            "External call failed"
        );
    }
    None
}

/// Call the interpreter under [`bounded_call`].
///
/// Never fails: exhausted attempts yield zero candidates.
pub async fn interpret_cluster(
    interpreter: &dyn Interpreter,
    pacer: &CallPacer,
    cluster_id: ClusterId,
    sequence: &[TypedItem],
    category: &str,
    config: &ExtractConfig,
    normalizer: &Normalizer,
) -> Vec<Candidate> {
    let text = cluster_text(sequence);
    if text.is_empty() {
        debug!(cluster_id = %cluster_id, "No text to interpret");
        return Vec::new();
    }
    let counts = media_counts(sequence);

    let answer = bounded_call(pacer, config, cluster_id, interpreter.name(), || {
        interpreter.interpret(&text, category, counts)
    })
    .await;

    match answer {
        Some(candidates) => {
            debug!(
                cluster_id = %cluster_id,
                interpreter = interpreter.name(),
                candidates = candidates.len(),
                "Interpreted cluster"
            );
            dedupe_candidates(candidates, normalizer)
        }
        None => {
            warn!(cluster_id = %cluster_id, "Interpretation exhausted, no candidates");
            Vec::new()
        }
    }
}

/// Build a stream entity record from a candidate.
pub fn candidate_record(
    id: EntityId,
    candidate: Candidate,
    category: &str,
    cluster_id: ClusterId,
) -> Result<EntityRecord> {
    Ok(EntityRecord::stream(id, candidate.name, category, cluster_id)?
        .with_area(candidate.area)
        .with_damage_status(candidate.damage_status)
        .with_confidence(candidate.confidence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::classify::ItemKind;
    use crate::testing::MockInterpreter;

    fn text(id: i64, caption: &str) -> TypedItem {
        TypedItem {
            message_id: id,
            kind: ItemKind::Text(caption.into()),
        }
    }

    fn photo(id: i64, file: &str) -> TypedItem {
        TypedItem {
            message_id: id,
            kind: ItemKind::Media(MediaItem::Photo(file.into())),
        }
    }

    fn fast_config() -> ExtractConfig {
        ExtractConfig::default()
            .with_call_timeout_ms(200)
            .with_call_delay_ms(0)
            .with_max_attempts(2)
    }

    #[test]
    fn test_parse_caption_lines() {
        assert_eq!(
            parse_caption("  Site Alpha \n\n District 1\nextra"),
            Some(("Site Alpha".to_string(), Some("District 1".to_string())))
        );
        assert_eq!(parse_caption("Site Beta"), Some(("Site Beta".to_string(), None)));
        assert_eq!(parse_caption(" \n "), None);
    }

    #[test]
    fn test_demolished_wins_over_damaged() {
        let config = ExtractConfig::default();
        assert_eq!(infer_damage("مسجد النور مدمر", &config), DamageStatus::Demolished);
        assert_eq!(infer_damage("Damaged and later DESTROYED", &config), DamageStatus::Demolished);
        assert_eq!(infer_damage("متضرر جزئيا", &config), DamageStatus::Damaged);
        assert_eq!(infer_damage("Site Alpha", &config), DamageStatus::Unknown);
    }

    #[test]
    fn test_caption_confidence() {
        let sequence = vec![
            text(1, "Site Alpha\nDistrict 1"),
            text(2, "مسجد الرحمة"),
            text(3, "Somewhere"),
            text(4, "Site Alpha"),
        ];
        let candidates =
            extract_from_captions(&sequence, &ExtractConfig::default(), &Normalizer::default());

        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].confidence, Confidence::Medium);
        assert_eq!(candidates[0].area.as_deref(), Some("District 1"));
        assert_eq!(candidates[1].confidence, Confidence::Medium);
        assert_eq!(candidates[2].confidence, Confidence::Low);
    }

    #[test]
    fn test_cluster_text_and_counts() {
        let sequence = vec![text(1, "A"), photo(2, "p1"), text(3, "B"), photo(4, "p2")];
        assert_eq!(cluster_text(&sequence), "A\n\nB");
        let counts = media_counts(&sequence);
        assert_eq!(counts.photos, 2);
        assert_eq!(counts.total(), 2);
    }

    #[tokio::test]
    async fn test_interpret_retries_then_succeeds() {
        let mock = MockInterpreter::new()
            .with_failures(1)
            .with_candidates("A", vec![Candidate::new("Site Alpha", Confidence::High)]);
        let sequence = vec![text(1, "A")];

        let candidates = interpret_cluster(
            &mock,
            &CallPacer::unlimited(),
            ClusterId(0),
            &sequence,
            "Province X",
            &fast_config(),
            &Normalizer::default(),
        )
        .await;

        assert_eq!(candidates.len(), 1);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_interpret_degrades_to_nothing() {
        let mock = MockInterpreter::new().with_failures(5);
        let sequence = vec![text(1, "A")];

        let candidates = interpret_cluster(
            &mock,
            &CallPacer::unlimited(),
            ClusterId(0),
            &sequence,
            "Province X",
            &fast_config(),
            &Normalizer::default(),
        )
        .await;

        assert!(candidates.is_empty());
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_interpret_times_out() {
        let mock = MockInterpreter::new()
            .with_delay(Duration::from_millis(500))
            .with_candidates("A", vec![Candidate::new("Site Alpha", Confidence::High)]);
        let sequence = vec![text(1, "A")];
        let config = fast_config().with_call_timeout_ms(20).with_max_attempts(1);

        let candidates = interpret_cluster(
            &mock,
            &CallPacer::unlimited(),
            ClusterId(0),
            &sequence,
            "Province X",
            &config,
            &Normalizer::default(),
        )
        .await;

        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_pacing_wait_is_not_charged_to_the_call() {
        let mock = MockInterpreter::new()
            .with_default(vec![Candidate::new("Site Alpha", Confidence::High)]);
        // Each permit waits longer than a call may take
        let pacer = CallPacer::new(Duration::from_millis(300));
        let config = fast_config().with_call_timeout_ms(100).with_max_attempts(1);
        let sequence = vec![text(1, "A")];

        let mut found = Vec::new();
        for cluster in 0..3 {
            let candidates = interpret_cluster(
                &mock,
                &pacer,
                ClusterId(cluster),
                &sequence,
                "Province X",
                &config,
                &Normalizer::default(),
            )
            .await;
            found.push(candidates.len());
        }

        assert_eq!(found, vec![1, 1, 1]);
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_bounded_call_gives_up_after_attempts() {
        let mut attempts = 0;
        let answer: Option<()> = bounded_call(
            &CallPacer::unlimited(),
            &fast_config().with_max_attempts(3),
            ClusterId(0),
            "test",
            || {
                attempts += 1;
                async { Err(InterpretError::malformed("nope")) }
            },
        )
        .await;

        assert!(answer.is_none());
        assert_eq!(attempts, 3);
    }
}
