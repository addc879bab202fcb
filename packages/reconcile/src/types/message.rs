//! Stream messages and the media they carry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message identifier, monotonic and unique across the whole stream.
pub type MessageId = i64;

/// Topic (channel) identifier.
pub type TopicId = i64;

/// Kind of file attached to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    Other,
}

impl MediaKind {
    /// Infer the kind from a file name extension.
    pub fn from_path(path: &str) -> Self {
        let lower = path.to_lowercase();
        let ext = lower.rsplit('.').next().unwrap_or_default();
        match ext {
            "jpg" | "jpeg" | "png" | "webp" | "heic" => Self::Photo,
            "mp4" | "mov" | "avi" | "mkv" | "webm" => Self::Video,
            _ => Self::Other,
        }
    }
}

/// A file reference attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub file: String,
    pub kind: MediaKind,
}

impl MediaRef {
    pub fn new(file: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            file: file.into(),
            kind,
        }
    }

    pub fn photo(file: impl Into<String>) -> Self {
        Self::new(file, MediaKind::Photo)
    }

    pub fn video(file: impl Into<String>) -> Self {
        Self::new(file, MediaKind::Video)
    }

    /// Build a reference whose kind is inferred from the file extension.
    pub fn from_path(file: impl Into<String>) -> Self {
        let file = file.into();
        let kind = MediaKind::from_path(&file);
        Self { file, kind }
    }

    /// The assignable media item for this reference, if any.
    ///
    /// `Other` files (spreadsheets, documents) are never assigned.
    pub fn as_item(&self) -> Option<MediaItem> {
        match self.kind {
            MediaKind::Photo => Some(MediaItem::Photo(self.file.clone())),
            MediaKind::Video => Some(MediaItem::Video(self.file.clone())),
            MediaKind::Other => None,
        }
    }
}

/// One assignable piece of media: a photo, a video, or a map link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MediaItem {
    Photo(String),
    Video(String),
    MapLink(String),
}

impl MediaItem {
    /// File reference or URL.
    pub fn value(&self) -> &str {
        match self {
            Self::Photo(v) | Self::Video(v) | Self::MapLink(v) => v,
        }
    }
}

/// A chat message, immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,

    /// Missing or unparseable timestamps are `None`.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub topic_id: Option<TopicId>,

    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub media: Option<MediaRef>,

    /// URLs embedded in `text`.
    #[serde(default)]
    pub raw_link_candidates: Vec<String>,
}

impl Message {
    /// Create an empty message with the given id.
    pub fn new(id: MessageId) -> Self {
        Self {
            id,
            timestamp: None,
            topic_id: None,
            text: String::new(),
            media: None,
            raw_link_candidates: Vec::new(),
        }
    }

    /// Set the timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the topic.
    pub fn in_topic(mut self, topic_id: TopicId) -> Self {
        self.topic_id = Some(topic_id);
        self
    }

    /// Set the text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Attach a media reference.
    pub fn with_media(mut self, media: MediaRef) -> Self {
        self.media = Some(media);
        self
    }

    /// Set the embedded link candidates.
    pub fn with_links(mut self, links: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.raw_link_candidates = links.into_iter().map(Into::into).collect();
        self
    }

    /// Text with every link candidate removed, trimmed.
    ///
    /// A message whose text is nothing but links has no caption.
    pub fn caption(&self) -> String {
        let mut text = self.text.clone();
        for link in &self.raw_link_candidates {
            text = text.replace(link.as_str(), " ");
        }
        text.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_from_path() {
        assert_eq!(MediaKind::from_path("files/IMG_001.JPG"), MediaKind::Photo);
        assert_eq!(MediaKind::from_path("video/clip.mp4"), MediaKind::Video);
        assert_eq!(MediaKind::from_path("files/list.xlsx"), MediaKind::Other);
        assert_eq!(MediaKind::from_path("noextension"), MediaKind::Other);
    }

    #[test]
    fn test_other_media_is_not_assignable() {
        assert!(MediaRef::from_path("files/list.xlsx").as_item().is_none());
        assert_eq!(
            MediaRef::photo("p1.jpg").as_item(),
            Some(MediaItem::Photo("p1.jpg".to_string()))
        );
    }

    #[test]
    fn test_caption_strips_links() {
        let msg = Message::new(1)
            .with_text("Site Alpha https://maps.app.goo.gl/abc")
            .with_links(["https://maps.app.goo.gl/abc"]);
        assert_eq!(msg.caption(), "Site Alpha");

        let link_only = Message::new(2)
            .with_text("https://maps.app.goo.gl/abc")
            .with_links(["https://maps.app.goo.gl/abc"]);
        assert!(link_only.caption().is_empty());
    }
}
