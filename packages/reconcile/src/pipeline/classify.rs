//! Pattern classification over a cluster's text/media type sequence.

use serde::{Deserialize, Serialize};

use super::links::map_links;
use crate::types::cluster::Pattern;
use crate::types::message::{MediaItem, Message, MessageId};

/// One entry of a cluster's type sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedItem {
    pub message_id: MessageId,
    pub kind: ItemKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ItemKind {
    /// A caption: message text with links removed, non-empty.
    Text(String),
    Media(MediaItem),
}

impl TypedItem {
    pub fn is_text(&self) -> bool {
        matches!(self.kind, ItemKind::Text(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.kind {
            ItemKind::Text(caption) => Some(caption),
            ItemKind::Media(_) => None,
        }
    }

    pub fn as_media(&self) -> Option<&MediaItem> {
        match &self.kind {
            ItemKind::Media(item) => Some(item),
            ItemKind::Text(_) => None,
        }
    }
}

/// Build the ordered type sequence for a cluster's messages.
///
/// Per message: the TEXT item (if the caption is non-empty), then the file
/// MEDIA item (photos and videos only), then one MEDIA item per map link.
pub fn type_sequence<'a>(messages: impl IntoIterator<Item = &'a Message>) -> Vec<TypedItem> {
    let mut items = Vec::new();
    for message in messages {
        let caption = message.caption();
        if !caption.is_empty() {
            items.push(TypedItem {
                message_id: message.id,
                kind: ItemKind::Text(caption),
            });
        }
        if let Some(item) = message.media.as_ref().and_then(|m| m.as_item()) {
            items.push(TypedItem {
                message_id: message.id,
                kind: ItemKind::Media(item),
            });
        }
        for link in map_links(&message.raw_link_candidates) {
            items.push(TypedItem {
                message_id: message.id,
                kind: ItemKind::Media(MediaItem::MapLink(link.clone())),
            });
        }
    }
    items
}

/// Classify a type sequence.
///
/// An empty sequence is `unresolved`. At most one TEXT item is
/// `single-entity`. Otherwise the first item decides.
pub fn classify(sequence: &[TypedItem]) -> Pattern {
    let Some(first) = sequence.first() else {
        return Pattern::Unresolved;
    };

    let texts = sequence.iter().filter(|item| item.is_text()).count();
    if texts <= 1 {
        Pattern::SingleEntity
    } else if first.is_text() {
        Pattern::EntityThenMedia
    } else {
        Pattern::MediaThenEntity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::message::MediaRef;

    fn text(id: MessageId, caption: &str) -> TypedItem {
        TypedItem {
            message_id: id,
            kind: ItemKind::Text(caption.into()),
        }
    }

    fn photo(id: MessageId, file: &str) -> TypedItem {
        TypedItem {
            message_id: id,
            kind: ItemKind::Media(MediaItem::Photo(file.into())),
        }
    }

    #[test]
    fn test_type_sequence_order_within_message() {
        let messages = vec![
            Message::new(1)
                .with_text("Site Alpha https://maps.app.goo.gl/a")
                .with_links(["https://maps.app.goo.gl/a"])
                .with_media(MediaRef::photo("p1.jpg")),
            Message::new(2).with_media(MediaRef::from_path("list.xlsx")),
            Message::new(3)
                .with_text("https://example.com")
                .with_links(["https://example.com"]),
        ];

        let seq = type_sequence(&messages);

        assert_eq!(
            seq,
            vec![
                text(1, "Site Alpha"),
                photo(1, "p1.jpg"),
                TypedItem {
                    message_id: 1,
                    kind: ItemKind::Media(MediaItem::MapLink("https://maps.app.goo.gl/a".into())),
                },
            ]
        );
    }

    #[test]
    fn test_classification_rules() {
        assert_eq!(classify(&[]), Pattern::Unresolved);
        assert_eq!(classify(&[photo(1, "p1")]), Pattern::SingleEntity);
        assert_eq!(
            classify(&[photo(1, "p1"), text(2, "A"), photo(3, "p2")]),
            Pattern::SingleEntity
        );
        assert_eq!(
            classify(&[text(1, "A"), photo(2, "p1"), text(3, "B")]),
            Pattern::EntityThenMedia
        );
        assert_eq!(
            classify(&[photo(1, "p1"), text(2, "A"), text(3, "B")]),
            Pattern::MediaThenEntity
        );
    }
}
