//! Owns every piece of presenter state and wires resolution, attachment, user
//! overrides and navigation together.

use crate::attach::{AttachmentCoordinator, VerificationReport};
use crate::blob::BlobRegistry;
use crate::config::AppConfig;
use crate::errors::{AppError, MediaError};
use crate::input::NavCommand;
use crate::media::MediaRecord;
use crate::model::{
    MediaInfo, MediaKind, OverrideEntry, ResolutionSource, SlideIndex, SlideState, UserMediaInfo,
};
use crate::probe::AssetProbe;
use crate::resolver::{MediaLibrary, MediaResolver, ResolveSummary};
use crate::stage::Stage;
use crate::store::UserOverrideStore;
use crate::transition::{
    NavRejection, NavigationView, SlideChange, SlideTransitionController, TransitionTicket,
};
use log::{debug, info, warn};
use std::path::Path;
use tokio::time::Instant;

/// What `start` managed to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartupReport {
    pub resolved: ResolveSummary,
    /// `None` when the stage never became ready.
    pub attached: Option<VerificationReport>,
}

/// The running slideshow: resolved media, the stage it is attached to and navigation.
pub struct Presenter<P, S> {
    config: AppConfig,
    library: MediaLibrary,
    store: UserOverrideStore,
    blobs: BlobRegistry,
    resolver: MediaResolver<P>,
    coordinator: AttachmentCoordinator,
    controller: SlideTransitionController,
    stage: S,
    pending: Option<TransitionTicket>,
}

impl<P: AssetProbe, S: Stage> Presenter<P, S> {
    /// Builds an idle presenter. Nothing is resolved until `start`.
    pub fn new(config: AppConfig, probe: P, stage: S, store: UserOverrideStore) -> Self {
        Self {
            library: MediaLibrary::new(),
            blobs: BlobRegistry::new(),
            resolver: MediaResolver::from_config(probe, &config),
            coordinator: AttachmentCoordinator::from_config(&config),
            controller: SlideTransitionController::from_config(&config),
            store,
            stage,
            pending: None,
            config,
        }
    }

    /// Loads overrides, resolves every slide and attaches the results.
    pub async fn start(&mut self) -> StartupReport {
        info!(
            "Initializing media for {} slides from {}",
            self.config.slide_count, self.config.media_base_path
        );
        let overrides = self.store.load_all();
        let resolved = self
            .resolver
            .resolve_all(&mut self.library, &mut self.blobs, &overrides, self.config.slide_count)
            .await;
        let attached = match self.coordinator.attach_all(&mut self.stage, &self.library).await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("Continuing without attached media: {}", e);
                None
            }
        };
        StartupReport { resolved, attached }
    }

    /// Places a local file on slide `index` and remembers it across restarts.
    #[must_use = "adding media can fail; the Result must be handled"]
    pub fn add_user_media(&mut self, index: u32, path: &Path) -> Result<MediaInfo, AppError> {
        let slide = SlideIndex::new(index)
            .filter(|i| i.get() <= self.config.slide_count)
            .ok_or(MediaError::InvalidSlide(index))?;
        let kind = self.kind_for_path(path)?;
        let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        let blob_url = self.blobs.create_from_file(path)?;

        let persisted = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let entry = OverrideEntry::with_url(kind, persisted.to_string_lossy(), file_name);
        if let Err(e) = self.store.add_or_replace(slide, entry) {
            self.blobs.revoke(&blob_url);
            return Err(e.into());
        }

        let record = MediaRecord::new(slide, kind, blob_url, ResolutionSource::Override);
        let info = record.info();
        if let Ok(Some(previous)) = self.library.replace(record) {
            if previous.is_temporary_blob() {
                self.blobs.revoke(&previous.source_url);
            }
        }
        if let Err(e) = self.coordinator.attach(&mut self.stage, &self.library, slide) {
            warn!("User media for slide {} saved but not shown: {}", slide, e);
        }
        info!("Added {} {:?} to slide {}", kind, path, slide);
        Ok(info)
    }

    /// Forgets the user media on slide `index` and restores the default visual.
    ///
    /// Returns `true` if the slide had a record.
    #[must_use = "removing media can fail; the Result must be handled"]
    pub fn remove_user_media(&mut self, index: u32) -> Result<bool, AppError> {
        let slide = SlideIndex::new(index)
            .filter(|i| i.get() <= self.config.slide_count)
            .ok_or(MediaError::InvalidSlide(index))?;
        self.store.remove(slide)?;
        Ok(self.coordinator.detach(&mut self.stage, &mut self.library, &mut self.blobs, slide))
    }

    /// Media kind by file extension, per the configured lists.
    pub fn kind_for_path(&self, path: &Path) -> Result<MediaKind, MediaError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .ok_or_else(|| MediaError::UnsupportedFormat(path.display().to_string()))?;
        if self.config.video_extensions.iter().any(|v| v.eq_ignore_ascii_case(&ext)) {
            Ok(MediaKind::Video)
        } else if self.config.image_extensions.iter().any(|i| i.eq_ignore_ascii_case(&ext)) {
            Ok(MediaKind::Image)
        } else {
            Err(MediaError::UnsupportedFormat(ext))
        }
    }

    /// Starts a transition. The returned instant is when `complete_transition` is due.
    pub fn navigate(&mut self, command: NavCommand) -> Result<Instant, NavRejection> {
        let ticket = match command {
            NavCommand::Next => self.controller.next(&mut self.stage),
            NavCommand::Previous => self.controller.previous(&mut self.stage),
            NavCommand::First => self.controller.first(&mut self.stage),
            NavCommand::Last => self.controller.last(&mut self.stage),
            NavCommand::GoTo(target) => self.controller.go_to(target, &mut self.stage),
        }?;
        let deadline = ticket.deadline;
        self.pending = Some(ticket);
        Ok(deadline)
    }

    /// When the in-flight transition is due to complete.
    pub fn transition_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|t| t.deadline)
    }

    /// Finishes the in-flight transition, if any.
    pub fn complete_transition(&mut self) -> Option<SlideChange> {
        let ticket = self.pending.take()?;
        Some(self.controller.complete(ticket, &mut self.library, &mut self.stage))
    }

    /// Re-runs the verification walk over attached slides.
    pub fn verify(&mut self) -> VerificationReport {
        debug!("Verifying media attachment on demand");
        self.coordinator.verify(&mut self.stage, &self.library)
    }

    /// Snapshot of every resolved record.
    pub fn media_info(&self) -> Vec<MediaInfo> {
        self.library.media_info()
    }

    /// Persisted user overrides, for display.
    pub fn user_media_info(&self) -> Vec<UserMediaInfo> {
        self.store.user_media_info()
    }

    pub fn has_user_media(&self) -> bool {
        self.store.has_user_media()
    }

    /// Attachment state of one slide.
    pub fn slide_state(&self, index: SlideIndex) -> SlideState {
        self.coordinator.slide_state(index)
    }

    /// Counter, progress and button state for the navigation controls.
    pub fn view(&self) -> NavigationView {
        self.controller.view()
    }

    pub fn library(&self) -> &MediaLibrary {
        &self.library
    }

    pub fn stage(&self) -> &S {
        &self.stage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::PlaybackState;
    use crate::probe::testing::StaticProbe;
    use crate::stage::HeadlessStage;
    use std::time::Duration;

    fn idx(n: u32) -> SlideIndex {
        SlideIndex::new(n).unwrap()
    }

    fn config(dir: &Path, slides: u32) -> AppConfig {
        AppConfig {
            media_base_path: "media/".to_string(),
            slide_count: slides,
            store_path: dir.join("store.json"),
            transition: Duration::from_millis(1),
            attach_retry_interval: Duration::from_millis(1),
            attach_max_attempts: 3,
            ..AppConfig::default()
        }
    }

    fn presenter(dir: &Path, slides: u32, probe: StaticProbe) -> Presenter<StaticProbe, HeadlessStage> {
        let config = config(dir, slides);
        let store = UserOverrideStore::open(config.store_path.clone());
        Presenter::new(config, probe, HeadlessStage::new(slides), store)
    }

    #[tokio::test]
    async fn start_resolves_and_attaches() {
        let dir = tempfile::tempdir().unwrap();
        let probe = StaticProbe::with(["media/1.mp4", "media/3.png"]);
        let mut p = presenter(dir.path(), 4, probe);

        let report = p.start().await;
        assert_eq!(report.resolved.probed, 2);
        assert_eq!(report.resolved.unresolved, 2);
        let attached = report.attached.expect("stage is ready");
        assert_eq!(attached.attached, 2);
        assert!(attached.failed.is_empty());

        assert!(p.stage().has_class(idx(1), "media-video"));
        assert!(p.stage().has_class(idx(3), "media-image"));
        assert_eq!(p.stage().children(idx(2)).len(), 0);
        assert!(p.slide_state(idx(3)).attached);
    }

    #[tokio::test]
    async fn user_media_survives_restart_and_wins_over_probe() {
        let dir = tempfile::tempdir().unwrap();
        let upload = dir.path().join("holiday.PNG");
        std::fs::write(&upload, b"png").unwrap();

        let mut first = presenter(dir.path(), 3, StaticProbe::with(["media/2.mp4"]));
        first.start().await;
        let info = first.add_user_media(2, &upload).unwrap();
        assert_eq!(info.kind, MediaKind::Image);
        assert_eq!(info.source, ResolutionSource::Override);
        assert!(info.url.starts_with("blob:"));
        assert!(first.stage().has_class(idx(2), "media-image"));
        assert!(!first.stage().has_class(idx(2), "media-video"));

        let saved = first.user_media_info();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].file_name, "holiday.PNG");
        assert!(saved[0].timestamp > 0);

        let probe = StaticProbe::with(["media/2.mp4"]);
        let mut second = presenter(dir.path(), 3, probe);
        second.start().await;
        let record = second.library().get(idx(2)).unwrap();
        assert_eq!(record.source, ResolutionSource::Override);
        assert_eq!(record.kind, MediaKind::Image);
        assert!(second.resolver.probe().requested_for("media/", 2).is_empty());
    }

    #[tokio::test]
    async fn replacing_user_media_revokes_old_blob() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp4");
        let b = dir.path().join("b.jpg");
        std::fs::write(&a, b"mp4").unwrap();
        std::fs::write(&b, b"jpg").unwrap();

        let mut p = presenter(dir.path(), 2, StaticProbe::default());
        p.start().await;
        let first = p.add_user_media(1, &a).unwrap();
        assert_eq!(first.kind, MediaKind::Video);
        let second = p.add_user_media(1, &b).unwrap();
        assert!(!p.blobs.contains(&first.url));
        assert!(p.blobs.contains(&second.url));
        assert_eq!(p.stage().children(idx(1)).len(), 1);
    }

    #[tokio::test]
    async fn restarting_after_upload_releases_its_blob() {
        let dir = tempfile::tempdir().unwrap();
        let upload = dir.path().join("pic.png");
        std::fs::write(&upload, b"png").unwrap();

        let mut p = presenter(dir.path(), 3, StaticProbe::default());
        p.start().await;
        let added = p.add_user_media(2, &upload).unwrap();
        let blob_file = p.blobs.path_of(&added.url).unwrap();
        assert!(blob_file.exists());

        p.start().await;
        let record = p.library().get(idx(2)).unwrap();
        assert_eq!(record.source, ResolutionSource::Override);
        assert_eq!(record.source_url, std::fs::canonicalize(&upload).unwrap().to_string_lossy());
        assert!(!p.blobs.contains(&added.url));
        assert!(p.blobs.is_empty());
        assert!(!blob_file.exists());
        assert_eq!(p.stage().children(idx(2)).len(), 1);
    }

    #[tokio::test]
    async fn rejected_uploads_change_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("notes.txt");
        std::fs::write(&doc, b"text").unwrap();
        let mut p = presenter(dir.path(), 2, StaticProbe::default());
        p.start().await;

        assert!(matches!(p.add_user_media(1, &doc), Err(AppError::Media(MediaError::UnsupportedFormat(_)))));
        assert!(matches!(p.add_user_media(3, &doc), Err(AppError::Media(MediaError::InvalidSlide(3)))));
        assert!(matches!(
            p.add_user_media(1, &dir.path().join("missing.png")),
            Err(AppError::Media(MediaError::Io(_)))
        ));
        assert!(!p.has_user_media());
        assert!(p.library().is_empty());
    }

    #[tokio::test]
    async fn removing_user_media_restores_default_visual() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.webm");
        std::fs::write(&clip, b"webm").unwrap();
        let mut p = presenter(dir.path(), 2, StaticProbe::default());
        p.start().await;
        let info = p.add_user_media(2, &clip).unwrap();

        assert!(p.remove_user_media(2).unwrap());
        assert!(!p.has_user_media());
        assert!(p.library().get(idx(2)).is_none());
        assert!(!p.blobs.contains(&info.url));
        assert_eq!(p.stage().children(idx(2)).len(), 0);
        assert!(!p.slide_state(idx(2)).attached);
        assert!(!p.remove_user_media(2).unwrap());
    }

    #[tokio::test]
    async fn navigation_completes_on_demand() {
        let dir = tempfile::tempdir().unwrap();
        let probe = StaticProbe::with(["media/1.mp4", "media/2.mp4"]);
        let mut p = presenter(dir.path(), 3, probe);
        p.start().await;

        assert!(p.complete_transition().is_none());
        let due = p.navigate(NavCommand::Next).unwrap();
        assert_eq!(p.transition_deadline(), Some(due));
        assert_eq!(p.navigate(NavCommand::Last), Err(NavRejection::InFlight));

        let change = p.complete_transition().unwrap();
        assert_eq!(change, SlideChange { old: idx(1), new: idx(2) });
        assert!(p.transition_deadline().is_none());
        assert_eq!(p.library().get(idx(1)).unwrap().handle.playback(), PlaybackState::Paused);
        assert_eq!(p.library().get(idx(2)).unwrap().handle.playback(), PlaybackState::Playing);
        assert_eq!(p.view().current, 2);
        assert_eq!(p.navigate(NavCommand::GoTo(2)), Err(NavRejection::AlreadyCurrent));
    }
}
