//! Caption cue timing against the virtual timeline.
//!
//! Cues keep their original (virtual-timeline) times forever; display times
//! are derived with [`adjusted_time`] whenever the session's start offset
//! changes. Deriving from the originals each time makes re-adjustment after
//! a second cold seek safe — there is no in-place mutation to double-apply.

/// Shift a cue time from the virtual timeline into resource time
pub fn adjusted_time(original: f64, offset: f64) -> f64 {
    original - offset
}

/// One caption cue with immutable virtual-timeline times
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionCue {
    /// Cue start on the virtual timeline, seconds
    pub start: f64,
    /// Cue end on the virtual timeline, seconds
    pub end: f64,
    pub text: String,
}

impl CaptionCue {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// The cue's display window in resource time for the given start offset
    pub fn display_window(&self, offset: f64) -> (f64, f64) {
        (
            adjusted_time(self.start, offset),
            adjusted_time(self.end, offset),
        )
    }
}
