//! Stream segmentation: split a topic's messages into conversational clusters.
//!
//! Single pass, no backtracking. A cluster closes only when the next
//! message's time gap or id gap strictly exceeds its threshold, or at the
//! end of input.

use futures::future::join_all;
use tracing::{debug, warn};

use super::topics::TopicGroup;
use crate::types::config::SegmentConfig;
use crate::types::message::{Message, MessageId, TopicId};

/// A cluster before the run assigns it an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub topic_id: Option<TopicId>,
    pub message_ids: Vec<MessageId>,
}

/// True if `next` must start a new cluster after `prev`.
///
/// A missing timestamp on either side means no time signal; only the id
/// gap decides.
pub fn starts_new_cluster(prev: &Message, next: &Message, config: &SegmentConfig) -> bool {
    if let Some(max_ids) = config.max_id_gap {
        if next.id - prev.id > max_ids {
            return true;
        }
    }

    if let Some(max_minutes) = config.max_time_gap_minutes {
        match (prev.timestamp, next.timestamp) {
            (Some(a), Some(b)) => {
                // Compared in seconds so that 10m01s exceeds a 10 minute threshold
                if (b - a).num_seconds() > max_minutes.saturating_mul(60) {
                    return true;
                }
            }
            _ => {
                debug!(
                    prev = prev.id,
                    next = next.id,
                    "Missing timestamp, using id gap only"
                );
            }
        }
    }

    false
}

/// Partition one topic's id-sorted messages into segments.
pub fn segment_topic(
    topic_id: Option<TopicId>,
    messages: &[Message],
    config: &SegmentConfig,
) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current: Vec<MessageId> = Vec::new();
    let mut prev: Option<&Message> = None;

    for message in messages {
        if let Some(p) = prev {
            if p.id >= message.id {
                warn!(topic = ?topic_id, prev = p.id, next = message.id, "Messages not in ascending id order");
            }
            if starts_new_cluster(p, message, config) {
                segments.push(Segment {
                    topic_id,
                    message_ids: std::mem::take(&mut current),
                });
            }
        }
        current.push(message.id);
        prev = Some(message);
    }

    if !current.is_empty() {
        segments.push(Segment {
            topic_id,
            message_ids: current,
        });
    }

    debug!(
        topic = ?topic_id,
        messages = messages.len(),
        segments = segments.len(),
        "Segmented topic"
    );
    segments
}

/// Segment every topic sequentially, concatenating in topic order.
pub fn segment_topics(groups: &[TopicGroup], config: &SegmentConfig) -> Vec<Segment> {
    groups
        .iter()
        .flat_map(|g| segment_topic(g.topic_id, &g.messages, config))
        .collect()
}

/// Segment topics on blocking worker tasks, one per topic.
///
/// Output is identical to [`segment_topics`]. A worker that fails is
/// retried inline.
pub async fn segment_topics_parallel(groups: &[TopicGroup], config: &SegmentConfig) -> Vec<Segment> {
    let handles = groups.iter().map(|group| {
        let topic_id = group.topic_id;
        let messages = group.messages.clone();
        let config = *config;
        tokio::task::spawn_blocking(move || segment_topic(topic_id, &messages, &config))
    });

    let results = join_all(handles).await;

    results
        .into_iter()
        .zip(groups)
        .flat_map(|(result, group)| match result {
            Ok(segments) => segments,
            Err(e) => {
                warn!(topic = ?group.topic_id, error = %e, "Segmentation worker failed, retrying inline");
                segment_topic(group.topic_id, &group.messages, config)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn at(minutes: i64) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn ids(segments: &[Segment]) -> Vec<Vec<MessageId>> {
        segments.iter().map(|s| s.message_ids.clone()).collect()
    }

    #[test]
    fn test_empty_topic_yields_nothing() {
        assert!(segment_topic(Some(1), &[], &SegmentConfig::default()).is_empty());
    }

    #[test]
    fn test_singleton() {
        let segments = segment_topic(Some(1), &[Message::new(7)], &SegmentConfig::default());
        assert_eq!(ids(&segments), vec![vec![7]]);
    }

    #[test]
    fn test_id_gap_boundary_is_strict() {
        let config = SegmentConfig::default();
        let same = [Message::new(100).at(at(0)), Message::new(110).at(at(1))];
        assert_eq!(ids(&segment_topic(None, &same, &config)), vec![vec![100, 110]]);

        let split = [Message::new(100).at(at(0)), Message::new(111).at(at(1))];
        assert_eq!(
            ids(&segment_topic(None, &split, &config)),
            vec![vec![100], vec![111]]
        );
    }

    #[test]
    fn test_time_gap_boundary_is_strict() {
        let config = SegmentConfig::default();
        let same = [Message::new(1).at(at(0)), Message::new(2).at(at(10))];
        assert_eq!(segment_topic(None, &same, &config).len(), 1);

        let later = at(10) + Duration::seconds(1);
        let split = [Message::new(1).at(at(0)), Message::new(2).at(later)];
        assert_eq!(segment_topic(None, &split, &config).len(), 2);
    }

    #[test]
    fn test_gap_measured_from_previous_message() {
        // Total span is 25 minutes but no single gap exceeds 10
        let messages = [
            Message::new(1).at(at(0)),
            Message::new(2).at(at(9)),
            Message::new(3).at(at(18)),
            Message::new(4).at(at(25)),
        ];
        assert_eq!(segment_topic(None, &messages, &SegmentConfig::default()).len(), 1);
    }

    #[test]
    fn test_missing_timestamp_uses_id_gap_only() {
        let config = SegmentConfig::default();
        let messages = [
            Message::new(1).at(at(0)),
            Message::new(2),
            Message::new(3).at(at(500)),
            Message::new(20),
        ];
        // 2 -> 3 has no time signal; 3 -> 20 splits on ids
        assert_eq!(
            ids(&segment_topic(None, &messages, &config)),
            vec![vec![1, 2, 3], vec![20]]
        );
    }

    #[test]
    fn test_coarse_variant_ignores_id_gap() {
        let messages = [Message::new(1).at(at(0)), Message::new(500).at(at(29))];
        assert_eq!(segment_topic(None, &messages, &SegmentConfig::coarse()).len(), 1);

        let messages = [Message::new(1).at(at(0)), Message::new(2).at(at(31))];
        assert_eq!(segment_topic(None, &messages, &SegmentConfig::coarse()).len(), 2);
    }

    #[tokio::test]
    async fn test_parallel_matches_sequential() {
        let groups = vec![
            TopicGroup {
                topic_id: Some(1),
                category: "A".into(),
                messages: vec![Message::new(1), Message::new(2), Message::new(40)],
            },
            TopicGroup {
                topic_id: Some(2),
                category: "B".into(),
                messages: vec![Message::new(3), Message::new(100)],
            },
        ];
        let config = SegmentConfig::default();

        let sequential = segment_topics(&groups, &config);
        let parallel = segment_topics_parallel(&groups, &config).await;

        assert_eq!(sequential, parallel);
        assert_eq!(sequential.len(), 4);
        assert_eq!(sequential[2].topic_id, Some(2));
    }
}
