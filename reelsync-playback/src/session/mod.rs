//! Playback session controller.
//!
//! Owns one loaded item end to end: source resolution, the position
//! translator and scrub coalescer wrapped around seeking, codec-failure
//! fallback, resume application, activity reporting, and playlist
//! navigation. Messages come in from the host event loop, effects go back
//! out; the controller never touches the media element or the network
//! itself.

pub mod messages;
pub mod state;
pub mod update;

pub use messages::{Effect, FrameInfo, LoadRequest, SessionEvent, SessionMessage};
pub use state::{FallbackState, ItemSession, Phase, ResumeState};

use crate::config::PlaybackConfig;
use crate::playlist::PlaylistState;
use crate::source::SourceResolver;
use rand::SeedableRng;
use rand::rngs::StdRng;
use reelsync_model::SourceDescriptor;

/// Top-level state machine owning one loaded item
#[derive(Debug)]
pub struct PlaybackSessionController {
    pub(crate) config: PlaybackConfig,
    pub(crate) resolver: SourceResolver,
    pub(crate) rng: StdRng,
    /// Bumped on every item load; stale completions for older items carry
    /// an older epoch and are dropped
    pub(crate) epoch: u64,
    pub(crate) phase: Phase,
    pub(crate) item: Option<ItemSession>,
    pub(crate) playlist: Option<PlaylistState>,
}

impl PlaybackSessionController {
    pub fn new(config: PlaybackConfig, resolver: SourceResolver) -> Self {
        Self {
            config,
            resolver,
            rng: StdRng::from_os_rng(),
            epoch: 0,
            phase: Phase::Idle,
            item: None,
            playlist: None,
        }
    }

    /// Deterministic shuffle selection for tests
    pub fn with_seeded_rng(config: PlaybackConfig, resolver: SourceResolver, seed: u64) -> Self {
        let mut controller = Self::new(config, resolver);
        controller.rng = StdRng::seed_from_u64(seed);
        controller
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Epoch of the currently loaded item; host echoes this back on media
    /// element events
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Current position on the virtual timeline, in seconds
    pub fn current_virtual_time(&self) -> f64 {
        self.item.as_ref().map(|i| i.last_position).unwrap_or(0.0)
    }

    /// Presented duration of the virtual timeline, in seconds
    pub fn duration(&self) -> f64 {
        self.item.as_ref().map(|i| i.last_duration).unwrap_or(0.0)
    }

    pub fn is_scrubbing(&self) -> bool {
        self.item
            .as_ref()
            .map(|i| i.scrub.is_scrubbing())
            .unwrap_or(false)
    }

    pub fn active_source(&self) -> Option<&SourceDescriptor> {
        self.item.as_ref().and_then(|i| i.active_source())
    }

    pub fn playlist(&self) -> Option<&PlaylistState> {
        self.playlist.as_ref()
    }
}
