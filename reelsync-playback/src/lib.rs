//! Playback synchronization core for a media-server companion.
//!
//! This crate reconciles the continuous "virtual" timeline shown to the user
//! with the underlying media resource, which for transcoded streams only
//! covers a window of that timeline and is torn down and recreated whenever
//! the user seeks outside the buffered region. Around that core it
//! coordinates scrub-gesture coalescing, automatic codec-failure fallback,
//! resume-position capture, periodic watch-activity reporting, and playlist
//! auto-advance.
//!
//! Everything is headless and single-threaded: the
//! [`session::PlaybackSessionController`] consumes [`session::SessionMessage`]s
//! from the host event loop and returns [`session::Effect`]s describing what
//! the host should do to the media element and the network. Timers (scrub
//! quiescence, reload debounce, activity interval) are deadlines checked
//! against the `Instant` the host passes in, so tests drive time explicitly.

pub mod activity;
pub mod captions;
pub mod config;
pub mod error;
pub mod playlist;
pub mod scrub;
pub mod session;
pub mod source;
pub mod timeline;
pub mod traits;

pub use config::PlaybackConfig;
pub use error::{Result, SourceError};
pub use playlist::{Advance, PlaylistState, RepeatMode};
pub use session::{Effect, PlaybackSessionController, SessionEvent, SessionMessage};
pub use source::SourceResolver;
pub use timeline::{BufferedRange, PositionTranslator, SeekOutcome};
