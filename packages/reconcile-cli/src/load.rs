//! Input loading: a chat export and spreadsheet-derived catalog files.
//!
//! The chat export is the JSON a group chat client writes: a `messages`
//! array where forum topics are `topic_created` service messages and
//! regular messages reply to their topic's id. Catalog files are JSON
//! arrays of rows, one file per source spreadsheet.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use reconcile::pipeline::infer_damage;
use reconcile::{
    extract_links, CatalogEntity, DamageStatus, ExtractConfig, MediaKind, MediaRef, Message,
    TopicId,
};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// A loaded stream: messages plus the topic-id to category mapping.
#[derive(Debug, Default)]
pub struct Stream {
    pub messages: Vec<Message>,
    pub categories: HashMap<TopicId, String>,
}

#[derive(Debug, Deserialize)]
struct ChatExport {
    messages: Vec<ExportMessage>,
}

#[derive(Debug, Deserialize)]
struct ExportMessage {
    id: i64,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    reply_to_message_id: Option<i64>,
    #[serde(default)]
    text: JsonValue,
    #[serde(default)]
    photo: Option<String>,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    media_type: Option<String>,
}

impl ExportMessage {
    fn is_topic(&self) -> bool {
        self.kind == "service" && self.action.as_deref() == Some("topic_created")
    }

    fn media(&self) -> Option<MediaRef> {
        if let Some(photo) = &self.photo {
            return Some(MediaRef::photo(photo.clone()));
        }
        let file = self.file.as_ref()?;
        match self.media_type.as_deref() {
            Some("video_file") | Some("animation") => {
                Some(MediaRef::new(file.clone(), MediaKind::Video))
            }
            _ => Some(MediaRef::from_path(file.clone())),
        }
    }
}

/// Read and parse a chat export file.
pub fn load_stream(path: &Path, topic_prefix: Option<&str>) -> Result<Stream> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read chat export {}", path.display()))?;
    let stream = parse_export(&content, topic_prefix)
        .with_context(|| format!("Failed to parse chat export {}", path.display()))?;
    info!(
        path = %path.display(),
        messages = stream.messages.len(),
        topics = stream.categories.len(),
        "Loaded chat export"
    );
    Ok(stream)
}

/// Parse a chat export.
///
/// Topic titles lose `topic_prefix` when given. Messages replying to
/// something other than a topic get no topic.
pub fn parse_export(content: &str, topic_prefix: Option<&str>) -> Result<Stream> {
    let export: ChatExport = serde_json::from_str(content)?;

    let categories: HashMap<TopicId, String> = export
        .messages
        .iter()
        .filter(|m| m.is_topic())
        .map(|m| {
            let title = m.title.as_deref().unwrap_or_default().trim();
            let title = topic_prefix
                .and_then(|prefix| title.strip_prefix(prefix))
                .unwrap_or(title)
                .trim();
            (m.id, title.to_string())
        })
        .collect();

    let mut messages = Vec::new();
    for raw in export.messages.iter().filter(|m| m.kind == "message") {
        let (text, hrefs) = flatten_text(&raw.text);
        let mut links = extract_links(&text);
        for href in hrefs {
            if !links.contains(&href) {
                links.push(href);
            }
        }

        let mut message = Message::new(raw.id).with_text(text).with_links(links);
        message.timestamp = raw.date.as_deref().and_then(|d| {
            let parsed = parse_timestamp(d);
            if parsed.is_none() {
                warn!(message_id = raw.id, date = d, "Unparseable timestamp");
            }
            parsed
        });
        message.topic_id = raw
            .reply_to_message_id
            .filter(|id| categories.contains_key(id));
        message.media = raw.media();
        messages.push(message);
    }

    debug!(
        messages = messages.len(),
        without_topic = messages.iter().filter(|m| m.topic_id.is_none()).count(),
        "Parsed chat export"
    );
    Ok(Stream {
        messages,
        categories,
    })
}

/// Plain text and link targets of an export text field.
///
/// The field is either a string or an array of strings and entity objects
/// (`{"type": "text_link", "text": ..., "href": ...}`).
fn flatten_text(value: &JsonValue) -> (String, Vec<String>) {
    match value {
        JsonValue::String(s) => (s.clone(), Vec::new()),
        JsonValue::Array(parts) => {
            let mut text = String::new();
            let mut hrefs = Vec::new();
            for part in parts {
                match part {
                    JsonValue::String(s) => text.push_str(s),
                    JsonValue::Object(entity) => {
                        if let Some(t) = entity.get("text").and_then(JsonValue::as_str) {
                            text.push_str(t);
                        }
                        if let Some(href) = entity.get("href").and_then(JsonValue::as_str) {
                            hrefs.push(href.to_string());
                        }
                    }
                    _ => {}
                }
            }
            (text, hrefs)
        }
        _ => (String::new(), Vec::new()),
    }
}

/// Parse RFC 3339, or a naive `YYYY-MM-DDTHH:MM:SS` taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

/// One catalog row as written by the spreadsheet export.
#[derive(Debug, Deserialize)]
struct CatalogRow {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    area: Option<String>,
    #[serde(alias = "province")]
    category: String,
    #[serde(default)]
    damage_status: Option<String>,
}

/// Read a catalog file. Rows without a name are rejected and logged.
///
/// Damage status comes from the row when it is recognizable, else from the
/// file name.
pub fn load_catalog(path: &Path, config: &ExtractConfig) -> Result<Vec<CatalogEntity>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog {}", path.display()))?;
    let origin = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let rows = parse_catalog(&content, &origin, config)
        .with_context(|| format!("Failed to parse catalog {}", path.display()))?;
    info!(path = %path.display(), rows = rows.len(), "Loaded catalog");
    Ok(rows)
}

/// Parse catalog rows; `row_number` is the 1-based position in the file.
pub fn parse_catalog(
    content: &str,
    origin_file: &str,
    config: &ExtractConfig,
) -> Result<Vec<CatalogEntity>> {
    let rows: Vec<CatalogRow> = serde_json::from_str(content)?;
    let file_damage = infer_damage(origin_file, config);

    let mut entities = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        let row_number = index as u32 + 1;
        let entity = match CatalogEntity::new(
            row.name.unwrap_or_default(),
            row.category,
            origin_file,
            row_number,
        ) {
            Ok(entity) => entity,
            Err(e) => {
                warn!(error = %e, "Catalog row rejected");
                continue;
            }
        };

        let damage = row
            .damage_status
            .as_deref()
            .map(DamageStatus::from_label)
            .filter(DamageStatus::is_known)
            .unwrap_or(file_damage);

        entities.push(
            entity
                .with_area(row.area.unwrap_or_default())
                .with_damage_status(damage),
        );
    }
    Ok(entities)
}
