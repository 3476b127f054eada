//! Renderable media handles and the records that own them.
//!
//! A `RenderableHandle` is the constructed, not yet attached display element for one
//! slide's media. Construction never fails: a broken source only shows up later as a
//! render error, which is logged and kept on the handle without touching resolution
//! or attachment state.

use crate::model::{MediaInfo, MediaKind, ResolutionSource, SlideIndex};
use log::{debug, error, trace};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

/// How the element fills its visual container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectFit {
    Cover,
}

/// Presentation settings applied to every handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayConfig {
    pub width: &'static str,
    pub height: &'static str,
    pub object_fit: ObjectFit,
    /// `50%` gives the circular mask.
    pub border_radius: &'static str,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { width: "100%", height: "100%", object_fit: ObjectFit::Cover, border_radius: "50%" }
    }
}

/// Playback settings, present only on video handles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoConfig {
    pub autoplay: bool,
    pub muted: bool,
    pub looping: bool,
    /// Plays in place instead of taking over the screen.
    pub plays_inline: bool,
    pub preload: &'static str,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self { autoplay: true, muted: true, looping: true, plays_inline: true, preload: "metadata" }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlaybackState {
    Paused,
    Playing,
}

/// A constructed display element.
#[derive(Debug)]
pub struct RenderableHandle {
    element_id: u64,
    kind: MediaKind,
    src: String,
    display: DisplayConfig,
    video: Option<VideoConfig>,
    playback: PlaybackState,
    position_secs: f64,
    render_error: Option<String>,
}

impl RenderableHandle {
    pub fn new(kind: MediaKind, src: impl Into<String>) -> Self {
        let src = src.into();
        let element_id = NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed);
        trace!("Constructing {} element #{} for {}", kind, element_id, src);
        let video = match kind {
            MediaKind::Video => Some(VideoConfig::default()),
            MediaKind::Image => None,
        };
        // Autoplaying videos start as soon as they are in the stage.
        let playback = if video.as_ref().is_some_and(|v| v.autoplay) {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        };
        Self {
            element_id,
            kind,
            src,
            display: DisplayConfig::default(),
            video,
            playback,
            position_secs: 0.0,
            render_error: None,
        }
    }

    /// Identity of the element within the stage.
    pub fn element_id(&self) -> u64 {
        self.element_id
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn display(&self) -> &DisplayConfig {
        &self.display
    }

    /// Playback settings; `None` for images.
    pub fn video_config(&self) -> Option<&VideoConfig> {
        self.video.as_ref()
    }

    pub fn playback(&self) -> PlaybackState {
        self.playback
    }

    /// Playhead position in seconds.
    pub fn position_secs(&self) -> f64 {
        self.position_secs
    }

    /// The last render failure, if any.
    pub fn render_error(&self) -> Option<&str> {
        self.render_error.as_deref()
    }

    /// Advances the playhead of a playing video.
    pub fn advance(&mut self, secs: f64) {
        if self.playback == PlaybackState::Playing {
            self.position_secs += secs;
        }
    }

    /// Rewinds and starts a video. Images ignore this.
    pub fn play_from_start(&mut self) {
        if self.kind != MediaKind::Video {
            return;
        }
        self.position_secs = 0.0;
        self.playback = PlaybackState::Playing;
        debug!("Playing element #{} ({}) from start", self.element_id, self.src);
    }

    pub fn pause(&mut self) {
        if self.kind == MediaKind::Video && self.playback == PlaybackState::Playing {
            trace!("Pausing element #{} ({})", self.element_id, self.src);
            self.playback = PlaybackState::Paused;
        }
    }

    /// Records a failure to render the source. Nothing else changes.
    pub fn report_render_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("{} loading error for {}: {}", self.kind, self.src, message);
        self.render_error = Some(message);
    }
}

/// The resolved media for one slide.
#[derive(Debug)]
pub struct MediaRecord {
    pub slide_index: SlideIndex,
    pub kind: MediaKind,
    pub source_url: String,
    pub source: ResolutionSource,
    pub handle: RenderableHandle,
}

impl MediaRecord {
    /// Builds the record and its handle together.
    pub fn new(
        slide_index: SlideIndex,
        kind: MediaKind,
        source_url: impl Into<String>,
        source: ResolutionSource,
    ) -> Self {
        let source_url = source_url.into();
        let handle = RenderableHandle::new(kind, source_url.clone());
        Self { slide_index, kind, source_url, source, handle }
    }

    /// Whether the source is a temporary blob that must be revoked on removal.
    pub fn is_temporary_blob(&self) -> bool {
        self.source_url.starts_with(crate::blob::BLOB_SCHEME)
    }

    pub fn info(&self) -> MediaInfo {
        MediaInfo {
            slide: self.slide_index,
            kind: self.kind,
            url: self.source_url.clone(),
            source: self.source,
        }
    }
}
