//! Binds resolved media records into the stage and keeps per-slide attachment state.
//!
//! A full pass waits (bounded) for the stage to become ready, attaches every resolved
//! slide, then verifies. Verification always runs after the pass has finished; any
//! slide whose visual is still empty gets exactly one synchronous retry.

use crate::blob::BlobRegistry;
use crate::config::AppConfig;
use crate::errors::AttachError;
use crate::model::{SlideIndex, SlideState, MEDIA_MARKER_CLASSES};
use crate::resolver::MediaLibrary;
use crate::stage::{MediaNode, Stage};
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Outcome of a verification walk.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerificationReport {
    /// Slides found with media, including those fixed by the retry.
    pub attached: usize,
    /// Slides that were empty and attached on retry.
    pub recovered: Vec<SlideIndex>,
    /// Slides still empty after the retry.
    pub failed: Vec<SlideIndex>,
    pub total: usize,
}

#[derive(Debug)]
pub struct AttachmentCoordinator {
    retry_interval: Duration,
    max_attempts: u32,
    states: BTreeMap<SlideIndex, SlideState>,
    attempts: HashMap<SlideIndex, u32>,
}

impl AttachmentCoordinator {
    pub fn new(retry_interval: Duration, max_attempts: u32) -> Self {
        Self {
            retry_interval,
            max_attempts: max_attempts.max(1),
            states: BTreeMap::new(),
            attempts: HashMap::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.attach_retry_interval, config.attach_max_attempts)
    }

    pub fn slide_state(&self, index: SlideIndex) -> SlideState {
        self.states.get(&index).cloned().unwrap_or_else(|| SlideState::detached(index))
    }

    /// How many times attachment was tried for `index`.
    pub fn attempts(&self, index: SlideIndex) -> u32 {
        self.attempts.get(&index).copied().unwrap_or(0)
    }

    /// Polls the stage until it is ready with at least one slide, up to the attempt limit.
    pub async fn wait_for_stage<S: Stage>(&self, stage: &S) -> Result<(), AttachError> {
        for attempt in 1..=self.max_attempts {
            if stage.is_ready() && stage.slide_count() > 0 {
                debug!(
                    "Stage ready with {} slides after {} check(s)",
                    stage.slide_count(),
                    attempt
                );
                return Ok(());
            }
            if attempt < self.max_attempts {
                debug!(
                    "Stage not ready, waiting {:?} (check {}/{})",
                    self.retry_interval, attempt, self.max_attempts
                );
                tokio::time::sleep(self.retry_interval).await;
            }
        }
        Err(AttachError::StageNotReady { attempts: self.max_attempts })
    }

    /// Binds the record for `index` into its visual container.
    pub fn attach<S: Stage>(
        &mut self,
        stage: &mut S,
        library: &MediaLibrary,
        index: SlideIndex,
    ) -> Result<(), AttachError> {
        *self.attempts.entry(index).or_insert(0) += 1;
        let record = library.get(index).ok_or(AttachError::NothingResolved(index))?;

        if !stage.has_visual(index) {
            self.states.insert(index, SlideState::detached(index));
            return Err(AttachError::MissingVisual(index));
        }

        stage.clear_visual(index);
        for class in MEDIA_MARKER_CLASSES {
            stage.remove_class(index, class);
        }
        if !stage.append_to_visual(index, MediaNode::from(&record.handle)) {
            self.states.insert(index, SlideState::detached(index));
            return Err(AttachError::Rejected(index));
        }
        let class = record.kind.marker_class();
        stage.add_class(index, class);
        self.states.insert(
            index,
            SlideState { index, attached: true, media_kind_class: Some(class) },
        );
        debug!("Attached {} to slide {}", record.kind, index);
        Ok(())
    }

    /// Waits for the stage, attaches every resolved slide, then verifies.
    pub async fn attach_all<S: Stage>(
        &mut self,
        stage: &mut S,
        library: &MediaLibrary,
    ) -> Result<VerificationReport, AttachError> {
        if let Err(e) = self.wait_for_stage(stage).await {
            warn!("Media not attached: {}", e);
            return Err(e);
        }
        let shown = shown_indices(stage, library);
        info!("Found {} slides, attaching media to {} of them", stage.slide_count(), shown.len());

        for index in shown {
            if let Err(e) = self.attach(stage, library, index) {
                warn!("{}", e);
            }
        }
        Ok(self.verify(stage, library))
    }

    /// Confirms every resolved slide has content; empty ones get one retry.
    ///
    /// The retry re-appends the record's existing handle.
    pub fn verify<S: Stage>(
        &mut self,
        stage: &mut S,
        library: &MediaLibrary,
    ) -> VerificationReport {
        let mut report = VerificationReport::default();
        for index in shown_indices(stage, library) {
            report.total += 1;
            if stage.child_count(index) > 0 {
                report.attached += 1;
                continue;
            }
            debug!("Slide {} has no media attached, retrying", index);
            match self.attach(stage, library, index) {
                Ok(()) if stage.child_count(index) > 0 => {
                    report.attached += 1;
                    report.recovered.push(index);
                }
                Ok(()) => {
                    warn!(
                        "Media attachment failed for slide {}: visual still empty after retry",
                        index
                    );
                    report.failed.push(index);
                }
                Err(e) => {
                    warn!("Media attachment failed for slide {} after retry: {}", index, e);
                    report.failed.push(index);
                }
            }
        }
        info!("Media attachment result: {}/{} attached", report.attached, report.total);
        if !report.failed.is_empty() {
            let failed: Vec<u32> = report.failed.iter().map(|i| i.get()).collect();
            warn!("Slides without media after retry: {:?}", failed);
        }
        report
    }

    /// Clears the slide back to its default visual and drops its record.
    ///
    /// Returns `true` if a record was removed. A `blob:` source is revoked.
    pub fn detach<S: Stage>(
        &mut self,
        stage: &mut S,
        library: &mut MediaLibrary,
        blobs: &mut BlobRegistry,
        index: SlideIndex,
    ) -> bool {
        stage.clear_visual(index);
        for class in MEDIA_MARKER_CLASSES {
            stage.remove_class(index, class);
        }
        self.states.insert(index, SlideState::detached(index));

        match library.remove(index) {
            Some(record) => {
                if record.is_temporary_blob() {
                    blobs.revoke(&record.source_url);
                }
                info!("Removed media for slide {}", index);
                true
            }
            None => false,
        }
    }
}

/// Resolved slides that have a container on the stage.
fn shown_indices<S: Stage>(stage: &S, library: &MediaLibrary) -> Vec<SlideIndex> {
    let count = stage.slide_count();
    library
        .indices()
        .into_iter()
        .filter(|i| {
            let shown = (i.get() as usize) <= count;
            if !shown {
                debug!("Slide {} has media but no container", i);
            }
            shown
        })
        .collect()
}
