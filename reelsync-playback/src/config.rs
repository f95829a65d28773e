//! Playback tunables.
//!
//! The quiescence window and completion threshold were fixed constants in
//! earlier revisions; they are configuration now so deployments can tune
//! them without a rebuild.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the playback session controller and its sub-components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Scrub quiescence window in milliseconds: two seeks closer together
    /// than this belong to the same gesture
    pub scrub_window_ms: u64,
    /// Debounce applied before a cold seek actually reloads the resource;
    /// a newer cold seek inside this window supersedes the older one
    pub reload_debounce_ms: u64,
    /// Progress ratio at or above which an item counts as complete and the
    /// saved resume position is forced to zero
    pub complete_threshold: f32,
    /// Fraction of the duration that must be watched before the one-time
    /// "play counted" signal fires
    pub minimum_play_percent: f32,
    /// Interval between periodic activity saves, in seconds
    pub save_interval_secs: u64,
    /// Below this progress ratio, "previous" navigates to the prior item
    /// instead of restarting the current one
    pub restart_threshold: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            scrub_window_ms: 300,
            reload_debounce_ms: 250,
            complete_threshold: 0.98,
            minimum_play_percent: 0.5,
            save_interval_secs: 10,
            restart_threshold: 0.05,
        }
    }
}

impl PlaybackConfig {
    pub fn scrub_window(&self) -> Duration {
        Duration::from_millis(self.scrub_window_ms)
    }

    pub fn reload_debounce(&self) -> Duration {
        Duration::from_millis(self.reload_debounce_ms)
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval_secs)
    }
}
