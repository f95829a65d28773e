//! Watch progress and resume types.
//!
//! Progress is tracked as position/duration ratios. The activity layer
//! accumulates watched time and periodically reports [`ProgressUpdate`]s to
//! the server; [`ResumeInfo`] seeds the resume position when an item is
//! loaded again.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Watch progress ratio, clamped to `[0.0, 1.0]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchProgress(f32);

impl WatchProgress {
    /// Create a new watch progress, clamping between 0.0 and 1.0
    pub fn new(progress: f32) -> Self {
        WatchProgress(progress.clamp(0.0, 1.0))
    }

    /// Derive progress from a position/duration pair
    ///
    /// Returns zero progress for non-finite or non-positive durations so a
    /// transient manifest state never produces a bogus ratio.
    pub fn from_position(position: f64, duration: f64) -> Self {
        if !duration.is_finite() || duration <= 0.0 {
            return WatchProgress(0.0);
        }
        WatchProgress::new((position / duration) as f32)
    }

    /// Get the progress as a ratio (0.0 to 1.0)
    pub fn as_ratio(&self) -> f32 {
        self.0
    }

    /// Check whether the item counts as complete at the given threshold
    pub fn is_complete(&self, threshold: f32) -> bool {
        self.0 >= threshold
    }

    /// Check if this item has been started
    pub fn is_started(&self) -> bool {
        self.0 > 0.0
    }
}

/// Periodic progress report sent to the activity sink
///
/// `resume_position` is the position playback should resume from on the next
/// load; it is forced to zero when the item is effectively complete.
/// `played_delta` is the wall-clock seconds watched since the previous
/// report, so the server can accumulate total play duration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProgressUpdate {
    /// Item the report applies to
    pub item_id: Uuid,
    /// Position to resume from, in seconds (0 when near-complete)
    pub resume_position: f64,
    /// Seconds watched since the previous report
    pub played_delta: f64,
    /// Unix timestamp of the report
    pub recorded_at: i64,
}

impl ProgressUpdate {
    pub fn new(item_id: Uuid, resume_position: f64, played_delta: f64) -> Self {
        Self {
            item_id,
            resume_position,
            played_delta,
            recorded_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Resume state for an item as known by the server
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResumeInfo {
    /// Saved resume position in seconds (0 means start from the beginning)
    pub resume_seconds: f64,
    /// Total accumulated play duration across all sessions, in seconds
    pub total_play_duration: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_clamps() {
        assert_eq!(WatchProgress::new(1.4).as_ratio(), 1.0);
        assert_eq!(WatchProgress::new(-0.2).as_ratio(), 0.0);
    }

    #[test]
    fn progress_from_invalid_duration_is_zero() {
        assert_eq!(WatchProgress::from_position(30.0, 0.0).as_ratio(), 0.0);
        assert_eq!(WatchProgress::from_position(30.0, -5.0).as_ratio(), 0.0);
        assert_eq!(
            WatchProgress::from_position(30.0, f64::NAN).as_ratio(),
            0.0
        );
        assert_eq!(
            WatchProgress::from_position(30.0, f64::INFINITY).as_ratio(),
            0.0
        );
    }

    #[test]
    fn completion_threshold() {
        let p = WatchProgress::from_position(588.0, 600.0);
        assert!(p.is_complete(0.98));
        let p = WatchProgress::from_position(582.0, 600.0);
        assert!(!p.is_complete(0.98));
    }
}
