//! Prompts for prompted cluster interpretation and media adjudication.

use sha2::{Digest, Sha256};

use crate::traits::interpreter::MediaCounts;

/// System prompt for cluster interpretation.
pub const INTERPRET_SYSTEM_PROMPT: &str = r#"You read short field reports from a chat channel and list the buildings they describe.
Only list buildings the text names. Never invent names or areas.
Answer with JSON only."#;

/// User prompt for cluster interpretation.
pub const INTERPRET_PROMPT: &str = r#"Category: {category}
Media in this conversation: {photos} photos, {videos} videos, {map_links} map links.

For each distinct building named below, give:
- "name": the building name as written
- "area": the neighborhood or district, or null if not stated
- "damage_status": "damaged", "demolished", or "unknown"
- "confidence": "high" if name and area are explicit, "medium" if the name is explicit, "low" otherwise

If no building is named, return an empty list.

Respond with JSON matching this schema:
{schema}

Conversation:
{text}"#;

/// System prompt for media adjudication.
pub const ADJUDICATE_SYSTEM_PROMPT: &str = r#"You read a chat conversation documenting damaged buildings and decide which building each photo, video and map link shows.
Only use file names and links that appear in the conversation.
Answer with JSON only."#;

/// User prompt for media adjudication.
pub const ADJUDICATE_PROMPT: &str = r#"Category: {category}

Buildings named in this conversation:
{entities}

Rules:
1. Photos and videos sent right after a building name usually belong to that building.
2. A map link in the same message as a building name belongs to that building.
3. If you cannot tell, leave the item out.

Give every building listed above an entry, with empty lists when nothing belongs to it.

Respond with JSON matching this schema:
{schema}

Conversation:
{conversation}"#;

/// Hash of every prompt, so answers from different prompts are never mixed.
pub fn prompt_hash() -> String {
    let mut hasher = Sha256::new();
    for prompt in [
        INTERPRET_SYSTEM_PROMPT,
        INTERPRET_PROMPT,
        ADJUDICATE_SYSTEM_PROMPT,
        ADJUDICATE_PROMPT,
    ] {
        hasher.update(prompt.as_bytes());
        hasher.update([0]);
    }
    format!("{:x}", hasher.finalize())
}

/// Replace `{key}` placeholders in one pass over `template`.
///
/// Inserted values are never scanned again, so braces inside them stay as
/// written. Unknown placeholders are kept.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let hit = values.iter().find_map(|(key, value)| {
            after
                .strip_prefix(key)
                .and_then(|tail| tail.strip_prefix('}'))
                .map(|tail| (value, tail))
        });
        match hit {
            Some((value, tail)) => {
                out.push_str(value);
                rest = tail;
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Format the user prompt for one cluster.
pub fn format_interpret_prompt(
    cluster_text: &str,
    category: &str,
    media: MediaCounts,
    schema: &str,
) -> String {
    let photos = media.photos.to_string();
    let videos = media.videos.to_string();
    let map_links = media.map_links.to_string();
    fill_template(
        INTERPRET_PROMPT,
        &[
            ("category", category),
            ("photos", &photos),
            ("videos", &videos),
            ("map_links", &map_links),
            ("schema", schema),
            ("text", cluster_text),
        ],
    )
}

/// Format the adjudication prompt for one cluster.
pub fn format_adjudicate_prompt(
    conversation: &str,
    category: &str,
    entity_names: &[String],
    schema: &str,
) -> String {
    let entities = entity_names
        .iter()
        .map(|name| format!("- {name}"))
        .collect::<Vec<_>>()
        .join("\n");
    fill_template(
        ADJUDICATE_PROMPT,
        &[
            ("category", category),
            ("entities", &entities),
            ("schema", schema),
            ("conversation", conversation),
        ],
    )
}
