//! Media assignment: bind each MEDIA item of a cluster to at most one entity.
//!
//! The pattern selects the policy. Ambiguous clusters are never resolved
//! by guessing; their entities are flagged `needs_review` and their media
//! stay at cluster level.

use tracing::{debug, warn};

use super::classify::{ItemKind, TypedItem};
use super::normalize::Normalizer;
use crate::types::cluster::{ClusterId, Pattern};
use crate::types::entity::{EntityRecord, MediaSet};
use crate::types::message::MediaItem;

/// Result of assigning one cluster's media.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignment {
    /// The cluster's entities with their bound media.
    pub entities: Vec<EntityRecord>,
    /// Media held at cluster level pending review.
    pub shared_media: MediaSet,
    /// Media with nothing to bind to.
    pub unassigned_media: MediaSet,
}

/// Assign a cluster's media to its extracted entities.
///
/// `entities` must be in extraction order. For `unresolved` clusters the
/// result is empty.
pub fn assign_media(
    cluster_id: ClusterId,
    pattern: Pattern,
    sequence: &[TypedItem],
    entities: Vec<EntityRecord>,
    normalizer: &Normalizer,
) -> Assignment {
    match pattern {
        Pattern::Unresolved => Assignment::default(),
        Pattern::SingleEntity if entities.len() <= 1 => assign_single(sequence, entities),
        Pattern::SingleEntity => {
            warn!(
                cluster_id = %cluster_id,
                entities = entities.len(),
                "Single caption produced several entities, flagging for review"
            );
            share_for_review(sequence, entities)
        }
        Pattern::EntityThenMedia => assign_following(cluster_id, sequence, entities, normalizer),
        Pattern::MediaThenEntity => {
            debug!(cluster_id = %cluster_id, "Media lead captions, flagging for review");
            share_for_review(sequence, entities)
        }
    }
}

fn media_items(sequence: &[TypedItem]) -> impl Iterator<Item = &MediaItem> {
    sequence.iter().filter_map(TypedItem::as_media)
}

fn assign_single(sequence: &[TypedItem], mut entities: Vec<EntityRecord>) -> Assignment {
    let mut assignment = Assignment::default();
    match entities.first_mut() {
        Some(entity) => {
            for item in media_items(sequence) {
                entity.media.insert(item);
            }
        }
        None => {
            for item in media_items(sequence) {
                assignment.unassigned_media.insert(item);
            }
        }
    }
    assignment.entities = entities;
    assignment
}

fn share_for_review(sequence: &[TypedItem], mut entities: Vec<EntityRecord>) -> Assignment {
    for entity in &mut entities {
        entity.needs_review = true;
    }
    let mut assignment = Assignment {
        entities,
        ..Default::default()
    };
    for item in media_items(sequence) {
        assignment.shared_media.insert(item);
    }
    assignment
}

fn assign_following(
    cluster_id: ClusterId,
    sequence: &[TypedItem],
    mut entities: Vec<EntityRecord>,
    normalizer: &Normalizer,
) -> Assignment {
    let mut unassigned = MediaSet::new();
    let mut current: Option<usize> = None;

    for item in sequence {
        match &item.kind {
            ItemKind::Text(caption) => {
                current = match_caption(&entities, caption, normalizer);
                if current.is_none() {
                    warn!(
                        cluster_id = %cluster_id,
                        message_id = item.message_id,
                        "Caption matches no entity, following media unassigned"
                    );
                }
            }
            ItemKind::Media(media) => match current {
                Some(index) => {
                    entities[index].media.insert(media);
                }
                None => {
                    unassigned.insert(media);
                }
            },
        }
    }

    Assignment {
        entities,
        shared_media: MediaSet::new(),
        unassigned_media: unassigned,
    }
}

/// Index of the entity a caption names.
///
/// A name contained in the caption beats a caption contained in a name.
/// Within the same kind of match the longest normalized name wins; ties go
/// to the earlier entity.
fn match_caption(entities: &[EntityRecord], caption: &str, normalizer: &Normalizer) -> Option<usize> {
    let normalized_caption = normalizer.normalize(caption);
    let mut best: Option<(usize, (bool, usize))> = None;
    for (index, entity) in entities.iter().enumerate() {
        if !normalizer.captions_match(&entity.name, caption) {
            continue;
        }
        let name = normalizer.normalize(&entity.name);
        let rank = (normalized_caption.contains(&name), name.chars().count());
        if best.map_or(true, |(_, best_rank)| rank > best_rank) {
            best = Some((index, rank));
        }
    }
    best.map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::entity::EntityId;

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

    fn entity(id: u32, name: &str) -> EntityRecord {
        EntityRecord::stream(EntityId(id), name, "Province X", ClusterId(0)).unwrap()
    }

    #[test]
    fn test_entity_then_media_partitions_exactly() {
        let sequence = vec![
            text(1, "A"),
            photo(2, "m1"),
            photo(3, "m2"),
            text(4, "B"),
            photo(5, "m3"),
        ];
        let entities = vec![entity(0, "A"), entity(1, "B")];

        let result = assign_media(
            ClusterId(0),
            Pattern::EntityThenMedia,
            &sequence,
            entities,
            &Normalizer::default(),
        );

        assert_eq!(result.entities[0].media.photos, vec!["m1", "m2"]);
        assert_eq!(result.entities[1].media.photos, vec!["m3"]);
        assert!(result.entities.iter().all(|e| !e.needs_review));
        assert!(result.unassigned_media.is_empty());
        assert!(result.shared_media.is_empty());
    }

    #[test]
    fn test_media_then_entity_is_conservative() {
        let sequence = vec![photo(1, "m1"), text(2, "A")];
        let entities = vec![entity(0, "A")];

        let result = assign_media(
            ClusterId(0),
            Pattern::MediaThenEntity,
            &sequence,
            entities,
            &Normalizer::default(),
        );

        assert!(result.entities.iter().all(|e| e.needs_review));
        assert!(result.entities.iter().all(|e| e.media.is_empty()));
        assert_eq!(result.shared_media.photos, vec!["m1"]);
    }

    #[test]
    fn test_single_entity_binds_everything() {
        let sequence = vec![photo(1, "m1"), text(2, "A"), photo(3, "m2")];
        let result = assign_media(
            ClusterId(0),
            Pattern::SingleEntity,
            &sequence,
            vec![entity(0, "A")],
            &Normalizer::default(),
        );
        assert_eq!(result.entities[0].media.photos, vec!["m1", "m2"]);
    }

    #[test]
    fn test_single_entity_without_text_leaves_media_unassigned() {
        let sequence = vec![photo(1, "m1")];
        let result = assign_media(
            ClusterId(0),
            Pattern::SingleEntity,
            &sequence,
            vec![],
            &Normalizer::default(),
        );
        assert!(result.entities.is_empty());
        assert_eq!(result.unassigned_media.photos, vec!["m1"]);
    }

    #[test]
    fn test_single_caption_with_several_entities_needs_review() {
        let sequence = vec![text(1, "A and B"), photo(2, "m1")];
        let result = assign_media(
            ClusterId(0),
            Pattern::SingleEntity,
            &sequence,
            vec![entity(0, "A"), entity(1, "B")],
            &Normalizer::default(),
        );
        assert!(result.entities.iter().all(|e| e.needs_review));
        assert_eq!(result.shared_media.photos, vec!["m1"]);
    }

    #[test]
    fn test_media_before_first_caption_and_after_unknown_caption() {
        let sequence = vec![
            photo(1, "early"),
            text(2, "A"),
            photo(3, "m1"),
            text(4, "something else"),
            photo(5, "late"),
        ];
        let result = assign_media(
            ClusterId(0),
            Pattern::EntityThenMedia,
            &sequence,
            vec![entity(0, "A")],
            &Normalizer::default(),
        );
        assert_eq!(result.entities[0].media.photos, vec!["m1"]);
        assert_eq!(result.unassigned_media.photos, vec!["early", "late"]);
    }

    #[test]
    fn test_longest_matching_name_wins() {
        let entities = vec![entity(0, "Alpha"), entity(1, "Alpha North")];
        let n = Normalizer::default();
        assert_eq!(match_caption(&entities, "Alpha North\nDistrict 1", &n), Some(1));
        assert_eq!(match_caption(&entities, "Alpha", &n), Some(0));
    }

    #[test]
    fn test_honorific_prefix_ignored_when_matching() {
        let entities = vec![entity(0, "مسجد الرحمة")];
        let n = Normalizer::default();
        assert_eq!(match_caption(&entities, "جامع الرحمة - حي الزيتون", &n), Some(0));
    }
}
