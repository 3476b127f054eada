//! Defines the core data structures and enums shared by the resolver, the
//! attachment coordinator and the transition controller.
//!
//! Slides are addressed by 1-based position everywhere in this crate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU32;

/// 1-based position of a slide. Zero is unrepresentable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlideIndex(NonZeroU32);

impl SlideIndex {
    pub const FIRST: SlideIndex = SlideIndex(NonZeroU32::MIN);

    pub fn new(position: u32) -> Option<Self> {
        NonZeroU32::new(position).map(SlideIndex)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// Iterates `1..=count`.
    pub fn range(count: u32) -> impl Iterator<Item = SlideIndex> {
        (1..=count).filter_map(SlideIndex::new)
    }
}

impl fmt::Display for SlideIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of media attached to a slide.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    /// Marker class placed on a visual container holding media of this kind.
    pub fn marker_class(self) -> &'static str {
        match self {
            MediaKind::Video => "media-video",
            MediaKind::Image => "media-image",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Image => "image",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every marker class a visual container may carry.
pub const MEDIA_MARKER_CLASSES: [&str; 2] = ["media-video", "media-image"];

/// Where a slide's media came from. Precedence is `Override` > `Probed` > `Unresolved`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResolutionSource {
    Override,
    Probed,
    Unresolved,
}

/// A user-supplied media descriptor as persisted in the local store.
///
/// On disk: `{"type": "image", "url": "...", "fileName": "x.png", "timestamp": 1700000000000}`.
/// Either `url` or `data` must be present.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OverrideEntry {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Embedded content, normally a `data:` URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Creation time, milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
}

impl OverrideEntry {
    /// Creates an entry referencing `url`, stamped with the current time.
    pub fn with_url(kind: MediaKind, url: impl Into<String>, file_name: Option<String>) -> Self {
        Self {
            kind,
            url: Some(url.into()),
            data: None,
            file_name,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// The reference a renderable should load, preferring `url` over embedded `data`.
    pub fn source_reference(&self) -> Option<&str> {
        self.url
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.data.as_deref().filter(|s| !s.is_empty()))
    }
}

/// All override entries, keyed by slide.
pub type OverrideMap = BTreeMap<SlideIndex, OverrideEntry>;

/// Read-only snapshot of one resolved record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaInfo {
    pub slide: SlideIndex,
    pub kind: MediaKind,
    pub url: String,
    pub source: ResolutionSource,
}

/// Display-oriented summary of a persisted override.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserMediaInfo {
    pub slide: SlideIndex,
    pub kind: MediaKind,
    pub file_name: String,
    pub timestamp: i64,
}

/// Per-container attachment state kept by the coordinator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlideState {
    pub index: SlideIndex,
    pub attached: bool,
    pub media_kind_class: Option<&'static str>,
}

impl SlideState {
    pub fn detached(index: SlideIndex) -> Self {
        Self { index, attached: false, media_kind_class: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slide_index_rejects_zero() {
        assert!(SlideIndex::new(0).is_none());
        assert_eq!(SlideIndex::new(7).map(SlideIndex::get), Some(7));
        let all: Vec<u32> = SlideIndex::range(3).map(SlideIndex::get).collect();
        assert_eq!(all, vec![1, 2, 3]);
    }

    #[test]
    fn override_entry_uses_browser_field_names() {
        let json = r#"{"type":"image","url":"blob:abc","fileName":"x.png","timestamp":12}"#;
        let entry: OverrideEntry = serde_json::from_str(json).expect("entry parses");
        assert_eq!(entry.kind, MediaKind::Image);
        assert_eq!(entry.file_name.as_deref(), Some("x.png"));
        assert_eq!(entry.source_reference(), Some("blob:abc"));

        let back = serde_json::to_value(&entry).expect("entry serializes");
        assert_eq!(back["type"], "image");
        assert_eq!(back["fileName"], "x.png");
        assert!(back.get("data").is_none());
    }

    #[test]
    fn override_entry_falls_back_to_embedded_data() {
        let json = r#"{"type":"video","url":"","data":"data:video/mp4;base64,AAAA"}"#;
        let entry: OverrideEntry = serde_json::from_str(json).expect("entry parses");
        assert_eq!(entry.source_reference(), Some("data:video/mp4;base64,AAAA"));
        assert_eq!(entry.timestamp, 0);
    }

    #[test]
    fn marker_classes_match_kinds() {
        assert_eq!(MediaKind::Video.marker_class(), "media-video");
        assert_eq!(MediaKind::Image.marker_class(), "media-image");
        assert!(MEDIA_MARKER_CLASSES.contains(&MediaKind::Image.marker_class()));
    }
}
