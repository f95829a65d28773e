use crate::activity::ActivityReporter;
use crate::captions::CaptionCue;
use crate::config::PlaybackConfig;
use crate::scrub::ScrubCoalescer;
use crate::timeline::{BufferedRange, PositionTranslator};
use reelsync_model::{ItemID, SourceDescriptor, StreamKind};

/// Session state machine phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// Sources applied, waiting for the media element to become playable
    Loading,
    Ready,
    Playing,
    Paused,
    /// Codec fallback in progress; waiting for the swapped source
    FallingBack,
    Ended,
    /// Unrecoverable for this item (second codec error, fallback failure)
    Failed,
}

/// Resume capture, re-armed on every item load
#[derive(Debug, Clone, Copy, Default)]
pub struct ResumeState {
    pub initial_resume_seconds: Option<f64>,
    /// Latched so repeated "playable" events cannot double-apply the seek
    pub applied: bool,
}

/// Codec-fallback latch, scoped per item
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackState {
    pub triggered: bool,
}

/// All state owned by one loaded item.
///
/// Replaced wholesale on item change so nothing leaks between items.
#[derive(Debug)]
pub struct ItemSession {
    pub item_id: ItemID,
    pub sources: Vec<SourceDescriptor>,
    pub active_index: usize,
    pub translator: PositionTranslator,
    pub scrub: ScrubCoalescer,
    pub activity: ActivityReporter,
    pub resume: ResumeState,
    pub fallback: FallbackState,
    /// One-shot autoplay request, consumed on first Ready
    pub autoplay_pending: bool,
    pub captions: Vec<CaptionCue>,
    /// Last known virtual position/duration (survive element teardown)
    pub last_position: f64,
    pub last_duration: f64,
    pub buffered: Vec<BufferedRange>,
    pub paused: bool,
    /// Pause state to restore once a cold-seek reload becomes playable
    pub restore_paused_after_reload: Option<bool>,
    /// Virtual position to re-apply after a fallback swap on a source that
    /// cannot be anchored server-side
    pub fallback_resume_position: Option<f64>,
}

impl ItemSession {
    pub fn new(
        item_id: ItemID,
        sources: Vec<SourceDescriptor>,
        active_index: usize,
        config: &PlaybackConfig,
        prior_watched: f64,
    ) -> Self {
        let mut translator = PositionTranslator::new(config.reload_debounce());
        if let Some(active) = sources.get(active_index) {
            translator.on_source_selected(active);
        }
        let last_duration = sources
            .get(active_index)
            .and_then(|s| s.total_duration)
            .unwrap_or(0.0);
        Self {
            item_id,
            sources,
            active_index,
            translator,
            scrub: ScrubCoalescer::new(config.scrub_window()),
            activity: ActivityReporter::new(item_id.to_uuid(), config, prior_watched),
            resume: ResumeState::default(),
            fallback: FallbackState::default(),
            autoplay_pending: false,
            captions: Vec::new(),
            last_position: 0.0,
            last_duration,
            buffered: Vec::new(),
            paused: true,
            restore_paused_after_reload: None,
            fallback_resume_position: None,
        }
    }

    pub fn active_source(&self) -> Option<&SourceDescriptor> {
        self.sources.get(self.active_index)
    }

    /// Highest-quality transcoded rendition not exceeding the active
    /// source's resolution, for codec fallback
    pub fn pick_fallback_index(&self) -> Option<usize> {
        let active_resolution = self.active_source().and_then(|s| s.resolution);
        self.sources
            .iter()
            .enumerate()
            .filter(|(i, s)| *i != self.active_index && s.kind == StreamKind::Transcoded)
            .filter(|(_, s)| match (s.resolution, active_resolution) {
                (Some(r), Some(limit)) => r.fits_within(&limit),
                // Unknown resolutions stay eligible
                _ => true,
            })
            .max_by_key(|(_, s)| {
                let pixels = s
                    .resolution
                    .map(|r| u64::from(r.width) * u64::from(r.height))
                    .unwrap_or(0);
                (pixels, s.bandwidth.unwrap_or(0))
            })
            .map(|(i, _)| i)
    }
}
