//! Media resolution: which asset, if any, belongs to each slide.
//!
//! Overrides are materialized first and never probed. Every other slide gets a probe
//! chain: video extensions in order, then image extensions in order, first hit wins.
//! All chains run concurrently and the pass waits for every one of them before
//! applying results, so completion order never affects precedence.

use crate::blob::BlobRegistry;
use crate::media::MediaRecord;
use crate::model::{MediaInfo, MediaKind, OverrideMap, ResolutionSource, SlideIndex};
use crate::probe::{candidate_url, AssetProbe};
use futures_util::future::join_all;
use log::{debug, info, trace, warn};
use std::collections::BTreeMap;

/// The owned index→record mapping. At most one record per slide.
#[derive(Debug, Default)]
pub struct MediaLibrary {
    records: BTreeMap<SlideIndex, MediaRecord>,
}

impl MediaLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// The record for `index`, if the slide resolved to anything.
    pub fn get(&self, index: SlideIndex) -> Option<&MediaRecord> {
        self.records.get(&index)
    }

    pub fn get_mut(&mut self, index: SlideIndex) -> Option<&mut MediaRecord> {
        self.records.get_mut(&index)
    }

    /// Where the slide's media came from; `Unresolved` when it has none.
    pub fn source_of(&self, index: SlideIndex) -> ResolutionSource {
        self.records.get(&index).map_or(ResolutionSource::Unresolved, |r| r.source)
    }

    /// Puts `record` in place of whatever the slide had, returning the old record.
    ///
    /// A probed record never displaces an override; in that case the offered record is
    /// handed back and the library is unchanged.
    pub fn replace(&mut self, record: MediaRecord) -> Result<Option<MediaRecord>, MediaRecord> {
        let index = record.slide_index;
        if record.source == ResolutionSource::Probed
            && self.source_of(index) == ResolutionSource::Override
        {
            trace!("Keeping override for slide {} over probed {}", index, record.source_url);
            return Err(record);
        }
        Ok(self.records.insert(index, record))
    }

    /// Takes the slide's record out of the library.
    pub fn remove(&mut self, index: SlideIndex) -> Option<MediaRecord> {
        self.records.remove(&index)
    }

    /// Resolved slides, ascending.
    pub fn indices(&self) -> Vec<SlideIndex> {
        self.records.keys().copied().collect()
    }

    pub fn records(&self) -> impl Iterator<Item = &MediaRecord> {
        self.records.values()
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut MediaRecord> {
        self.records.values_mut()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Snapshot of every record, in slide order.
    pub fn media_info(&self) -> Vec<MediaInfo> {
        self.records.values().map(MediaRecord::info).collect()
    }
}

/// Counts from one resolution pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolveSummary {
    pub overridden: usize,
    pub probed: usize,
    pub unresolved: usize,
}

/// Finds the media for each slide from overrides and existence probes.
pub struct MediaResolver<P> {
    probe: P,
    base_path: String,
    video_extensions: Vec<String>,
    image_extensions: Vec<String>,
}

impl<P: AssetProbe> MediaResolver<P> {
    pub fn new(
        probe: P,
        base_path: impl Into<String>,
        video_extensions: Vec<String>,
        image_extensions: Vec<String>,
    ) -> Self {
        Self { probe, base_path: base_path.into(), video_extensions, image_extensions }
    }

    /// Takes the base path and extension lists from `config`.
    pub fn from_config(probe: P, config: &crate::config::AppConfig) -> Self {
        Self::new(
            probe,
            config.media_base_path.clone(),
            config.video_extensions.clone(),
            config.image_extensions.clone(),
        )
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Resolves slides `1..=slide_count` into `library`.
    ///
    /// A displaced record backed by a temporary blob is revoked in `blobs`.
    pub async fn resolve_all(
        &self,
        library: &mut MediaLibrary,
        blobs: &mut BlobRegistry,
        overrides: &OverrideMap,
        slide_count: u32,
    ) -> ResolveSummary {
        let mut summary = ResolveSummary::default();

        for (index, entry) in overrides {
            let Some(url) = entry.source_reference() else {
                warn!("Override for slide {} has no URL or data, probing instead", index);
                continue;
            };
            if index.get() > slide_count {
                debug!("Override for slide {} is beyond the {} slides shown", index, slide_count);
            }
            let record = MediaRecord::new(*index, entry.kind, url, ResolutionSource::Override);
            // Overrides may replace anything.
            if let Ok(Some(previous)) = library.replace(record) {
                release(blobs, previous, url);
            }
            summary.overridden += 1;
        }

        let pending: Vec<SlideIndex> = SlideIndex::range(slide_count)
            .filter(|i| library.source_of(*i) != ResolutionSource::Override)
            .collect();
        debug!("Probing media for {} slide(s)", pending.len());

        let results = join_all(pending.iter().map(|&index| self.resolve_slide(index))).await;

        for (index, found) in pending.into_iter().zip(results) {
            match found {
                Some((kind, url)) => {
                    let record =
                        MediaRecord::new(index, kind, url.clone(), ResolutionSource::Probed);
                    if let Ok(previous) = library.replace(record) {
                        if let Some(previous) = previous {
                            release(blobs, previous, &url);
                        }
                        summary.probed += 1;
                    }
                }
                None => {
                    // A miss keeps whatever an earlier pass found.
                    if library.get(index).is_none() {
                        debug!("No media found for slide {}, using default visual", index);
                        summary.unresolved += 1;
                    }
                }
            }
        }

        info!(
            "Media preloading completed: {} override(s), {} probed, {} without media",
            summary.overridden, summary.probed, summary.unresolved
        );
        summary
    }

    /// Probe chain for one slide: videos first, then images, first hit wins.
    async fn resolve_slide(&self, index: SlideIndex) -> Option<(MediaKind, String)> {
        let chains = [
            (MediaKind::Video, &self.video_extensions),
            (MediaKind::Image, &self.image_extensions),
        ];
        for (kind, extensions) in chains {
            for ext in extensions.iter() {
                let url = candidate_url(&self.base_path, index.get(), ext);
                if self.probe.exists(&url).await {
                    debug!("Found {} for slide {}: {}", kind, index, url);
                    return Some((kind, url));
                }
            }
        }
        None
    }
}

/// Revokes the blob behind a displaced record unless its replacement still uses it.
fn release(blobs: &mut BlobRegistry, previous: MediaRecord, current_url: &str) {
    if previous.is_temporary_blob() && previous.source_url != current_url {
        blobs.revoke(&previous.source_url);
    }
}
