use crate::captions::CaptionCue;
use crate::playlist::RepeatMode;
use crate::timeline::BufferedRange;
use reelsync_model::{ItemID, RawStream, ResumeInfo};
use url::Url;
use uuid::Uuid;

/// Everything needed to load one item into the session
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub item_id: ItemID,
    /// Upstream stream list for the item, server-preference order
    pub streams: Vec<RawStream>,
    /// Saved resume state, when the caller looked it up
    pub resume: Option<ResumeInfo>,
    /// Caller wants playback to continue from the saved position
    pub should_resume: bool,
    /// One-shot: start playing as soon as the item is ready
    pub autoplay: bool,
    /// Specific rendition label to start with; first entry otherwise
    pub preferred_label: Option<String>,
    /// Playlist index this load corresponds to, if navigating a playlist
    pub playlist_index: Option<usize>,
}

/// Periodic media-element snapshot from the host
#[derive(Debug, Clone)]
pub struct FrameInfo {
    /// Item epoch the host observed when the frame was produced
    pub epoch: u64,
    /// Raw resource position, seconds
    pub position: f64,
    /// Raw resource duration, seconds (may be NaN while loading)
    pub duration: f64,
    /// Buffered spans in resource time
    pub buffered: Vec<BufferedRange>,
    pub paused: bool,
}

/// Inputs to the session controller
#[derive(Debug, Clone)]
pub enum SessionMessage {
    LoadItem(LoadRequest),
    /// Media element reached a playable state
    Playable { epoch: u64 },
    /// Source failed to load (network/manifest)
    LoadFailed { epoch: u64, error: String },
    /// Codec/decode failure from the media element
    DecodeError { epoch: u64, error: String },
    Frame(FrameInfo),
    Play,
    Pause,
    TogglePlayPause,
    /// Seek to a virtual-timeline position, seconds
    Seek(f64),
    EndOfStream,
    Next,
    Previous,
    Stop,
    SetPlaylist { items: Vec<ItemID>, start_index: usize },
    ClearPlaylist,
    SetShuffle(bool),
    SetRepeat(RepeatMode),
    SetAutoplayNext(bool),
    SetCaptions(Vec<CaptionCue>),
}

/// Host-visible notifications
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Item is ready; resume (if any) has been applied
    Ready,
    /// Playback finished and nothing follows
    Ended,
    /// Session was stopped and torn down
    Stopped,
    /// Load this playlist entry next
    NavigateTo { index: usize, item_id: ItemID },
    /// Initial source load failed; non-fatal, caller may retry the load
    SourceLoadFailed { error: String },
    /// Cold-seek reload failed; non-fatal, prior resource keeps playing
    ReloadFailed { error: String },
    /// Codec fallback engaged, swapping to the named rendition
    FallbackStarted { label: String },
    /// Unrecoverable for this item
    PlaybackFailed { error: String },
}

/// Work the host must carry out
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Load (or swap to) this source on the media element, preserving
    /// playback rate and poster
    LoadSource { url: Url, mime_type: String },
    /// Seek the media element, resource time
    SeekMedia { seconds: f64 },
    SetPaused(bool),
    /// Start offset changed: re-derive caption display times
    AdjustCaptions { offset: f64 },
    /// Hand a progress report to the activity sink
    Save(reelsync_model::ProgressUpdate),
    /// Fire the one-time play-counted call
    PlayCounted(Uuid),
    Emit(SessionEvent),
}
