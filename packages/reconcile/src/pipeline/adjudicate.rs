//! Adjudication of clusters whose media are held for review.
//!
//! An adjudicator answers with media per entity name. The answer is applied
//! only when it covers every entity of the cluster; anything else leaves
//! the cluster flagged. Each item still binds to at most one entity, and
//! items the cluster never held are ignored.

use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::classify::{ItemKind, TypedItem};
use super::extract::bounded_call;
use super::normalize::Normalizer;
use crate::interpreters::CallPacer;
use crate::traits::adjudicator::{Adjudication, AdjudicationRequest, Adjudicator};
use crate::types::cluster::{Cluster, ClusterOutcome};
use crate::types::config::ExtractConfig;
use crate::types::entity::MediaSet;
use crate::types::message::MediaItem;

/// The cluster's items, one line each, in order.
pub fn conversation_text(sequence: &[TypedItem]) -> String {
    sequence
        .iter()
        .map(|item| {
            let body = match &item.kind {
                ItemKind::Text(caption) => {
                    let flat = caption.lines().map(str::trim).collect::<Vec<_>>().join(" / ");
                    format!("TEXT - {flat}")
                }
                ItemKind::Media(MediaItem::Photo(file)) => format!("PHOTO - {file}"),
                ItemKind::Media(MediaItem::Video(file)) => format!("VIDEO - {file}"),
                ItemKind::Media(MediaItem::MapLink(url)) => format!("MAP LINK - {url}"),
            };
            format!("Message {}: {}", item.message_id, body)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the request for a cluster held for review.
pub fn adjudication_request(
    cluster: &Cluster,
    sequence: &[TypedItem],
    outcome: &ClusterOutcome,
) -> AdjudicationRequest {
    AdjudicationRequest {
        cluster_id: cluster.id,
        category: cluster.category.clone(),
        entity_names: outcome.entities.iter().map(|e| e.name.clone()).collect(),
        conversation: conversation_text(sequence),
        media: outcome.shared_media.clone(),
    }
}

/// Ask the adjudicator under the usual timeout, retry and pacing policy.
///
/// `None` means no usable answer; the cluster stays flagged.
pub async fn adjudicate_cluster(
    adjudicator: &dyn Adjudicator,
    pacer: &CallPacer,
    request: &AdjudicationRequest,
    config: &ExtractConfig,
) -> Option<Adjudication> {
    let answer = bounded_call(pacer, config, request.cluster_id, adjudicator.name(), || {
        adjudicator.adjudicate(request)
    })
    .await;

    if answer.is_none() {
        warn!(
            cluster_id = %request.cluster_id,
            adjudicator = adjudicator.name(),
            "Adjudication exhausted, cluster stays flagged"
        );
    }
    answer
}

/// Distribute a cluster's shared media as the adjudicator decided.
///
/// Returns false, leaving `outcome` untouched, when there is nothing to
/// decide or the answer skips one of the cluster's entities. On success
/// every entity loses its review flag, the first entity naming an item
/// gets it, and unclaimed items become unassigned.
pub fn apply_adjudication(
    outcome: &mut ClusterOutcome,
    adjudication: &Adjudication,
    normalizer: &Normalizer,
) -> bool {
    if outcome.entities.is_empty() || outcome.shared_media.is_empty() {
        return false;
    }

    let answers: HashMap<String, &MediaSet> = adjudication
        .assignments
        .iter()
        .map(|(name, media)| (normalizer.normalize(name), media))
        .collect();

    let mut decided = Vec::with_capacity(outcome.entities.len());
    for entity in &outcome.entities {
        match answers.get(&normalizer.normalize(&entity.name)) {
            Some(media) => decided.push(*media),
            None => {
                debug!(
                    cluster_id = %outcome.cluster_id,
                    entity = %entity.name,
                    "Adjudication skipped an entity, keeping review flag"
                );
                return false;
            }
        }
    }

    let mut claimed = MediaSet::new();
    for (entity, media) in outcome.entities.iter_mut().zip(decided) {
        for item in media.items() {
            if !outcome.shared_media.contains(&item) {
                debug!(
                    cluster_id = %outcome.cluster_id,
                    item = ?item,
                    "Adjudicated item not in cluster, ignored"
                );
                continue;
            }
            if claimed.insert(&item) {
                entity.media.insert(&item);
            }
        }
        entity.needs_review = false;
    }

    for item in outcome.shared_media.items() {
        if !claimed.contains(&item) {
            outcome.unassigned_media.insert(&item);
        }
    }
    outcome.shared_media = MediaSet::new();
    outcome.adjudicated = true;

    info!(
        cluster_id = %outcome.cluster_id,
        assigned = claimed.len(),
        unassigned = outcome.unassigned_media.len(),
        "Applied adjudication"
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockAdjudicator;
    use crate::types::cluster::{ClusterId, Pattern};
    use crate::types::entity::{EntityId, EntityRecord};

    fn entity(id: u32, name: &str) -> EntityRecord {
        let mut record =
            EntityRecord::stream(EntityId(id), name, "Province X", ClusterId(0)).unwrap();
        record.needs_review = true;
        record
    }

    fn photo(name: &str) -> MediaItem {
        MediaItem::Photo(name.into())
    }

    fn media(items: &[MediaItem]) -> MediaSet {
        items.iter().cloned().collect()
    }

    fn flagged() -> ClusterOutcome {
        ClusterOutcome {
            cluster_id: ClusterId(0),
            pattern: Pattern::MediaThenEntity,
            entities: vec![entity(0, "Site Alpha"), entity(1, "Site Beta")],
            shared_media: media(&[photo("p1"), photo("p2"), photo("p3")]),
            unassigned_media: MediaSet::new(),
            skipped: None,
            adjudicated: false,
        }
    }

    #[test]
    fn test_conversation_text_lines() {
        let sequence = vec![
            TypedItem {
                message_id: 10,
                kind: ItemKind::Media(photo("p1")),
            },
            TypedItem {
                message_id: 11,
                kind: ItemKind::Text("Site Alpha\nDistrict 1".into()),
            },
            TypedItem {
                message_id: 11,
                kind: ItemKind::Media(MediaItem::MapLink("https://maps.app.goo.gl/a".into())),
            },
        ];

        assert_eq!(
            conversation_text(&sequence),
            "Message 10: PHOTO - p1\n\
             Message 11: TEXT - Site Alpha / District 1\n\
             Message 11: MAP LINK - https://maps.app.goo.gl/a"
        );
    }

    #[test]
    fn test_full_answer_distributes_media() {
        let mut outcome = flagged();
        let answer = Adjudication::new()
            .assign("site alpha", media(&[photo("p1"), photo("p2")]))
            .assign("Site Beta", media(&[photo("p2"), photo("p9")]));

        assert!(apply_adjudication(&mut outcome, &answer, &Normalizer::default()));

        assert_eq!(outcome.entities[0].media.photos, vec!["p1", "p2"]);
        // p2 was claimed first, p9 never belonged to the cluster
        assert!(outcome.entities[1].media.is_empty());
        assert_eq!(outcome.unassigned_media.photos, vec!["p3"]);
        assert!(outcome.shared_media.is_empty());
        assert!(outcome.adjudicated);
        assert!(!outcome.needs_review());
    }

    #[test]
    fn test_partial_answer_keeps_review() {
        let mut outcome = flagged();
        let before = outcome.clone();
        let answer = Adjudication::new().assign("Site Alpha", media(&[photo("p1")]));

        assert!(!apply_adjudication(&mut outcome, &answer, &Normalizer::default()));
        assert_eq!(outcome, before);
        assert!(outcome.needs_review());
    }

    #[test]
    fn test_empty_answer_keeps_review() {
        let mut outcome = flagged();
        assert!(!apply_adjudication(
            &mut outcome,
            &Adjudication::new(),
            &Normalizer::default()
        ));
        assert!(outcome.needs_review());
        assert!(!outcome.adjudicated);
    }

    #[tokio::test]
    async fn test_failed_calls_yield_no_answer() {
        let adjudicator = MockAdjudicator::new().with_failures(5);
        let outcome = flagged();
        let cluster = Cluster {
            id: ClusterId(0),
            topic_id: Some(1),
            category: "Province X".into(),
            message_ids: vec![1, 2],
        };
        let request = adjudication_request(&cluster, &[], &outcome);
        let config = ExtractConfig::default()
            .with_call_timeout_ms(200)
            .with_call_delay_ms(0)
            .with_max_attempts(2);

        let answer =
            adjudicate_cluster(&adjudicator, &CallPacer::unlimited(), &request, &config).await;

        assert!(answer.is_none());
        assert_eq!(adjudicator.call_count(), 2);
        assert_eq!(adjudicator.requests()[0].entity_names, vec!["Site Alpha", "Site Beta"]);
    }
}
