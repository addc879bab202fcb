//! Group a flat message stream into per-topic, id-ordered lists.

use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use tracing::warn;

use crate::types::message::{Message, TopicId};

/// Messages of one topic, sorted ascending by id.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicGroup {
    pub topic_id: Option<TopicId>,
    pub category: String,
    pub messages: Vec<Message>,
}

/// Group messages by topic.
///
/// Topics keep their first-appearance order. Messages without a topic form
/// one group. Categories come from `categories`; unmapped topics get
/// `unknown_category`. A repeated message id keeps its first occurrence in
/// the stream, even when the copies carry different topics.
pub fn group_by_topic(
    messages: impl IntoIterator<Item = Message>,
    categories: &HashMap<TopicId, String>,
    unknown_category: &str,
) -> Vec<TopicGroup> {
    let mut groups: IndexMap<Option<TopicId>, Vec<Message>> = IndexMap::new();
    let mut seen = HashSet::new();
    let mut duplicates = 0usize;
    for message in messages {
        if !seen.insert(message.id) {
            duplicates += 1;
            continue;
        }
        groups.entry(message.topic_id).or_default().push(message);
    }
    if duplicates > 0 {
        warn!(dropped = duplicates, "Duplicate message ids in stream, keeping first");
    }

    groups
        .into_iter()
        .map(|(topic_id, mut messages)| {
            messages.sort_by_key(|m| m.id);

            let category = topic_id
                .and_then(|id| categories.get(&id))
                .cloned()
                .unwrap_or_else(|| unknown_category.to_string());

            TopicGroup {
                topic_id,
                category,
                messages,
            }
        })
        .collect()
}
