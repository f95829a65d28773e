//! Periodic watch-activity accounting.
//!
//! Driven by frame ticks: accumulates watched time, emits a save on the
//! configured interval, and fires the one-time "play counted" signal once
//! enough of the item has been watched. The reporter only decides *what*
//! to report; delivery (and retry) is the activity sink's job.

use crate::config::PlaybackConfig;
use reelsync_model::{ProgressUpdate, WatchProgress};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Work the session should hand to the activity sink
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityAction {
    Save(ProgressUpdate),
    PlayCounted(Uuid),
}

/// Per-item watch accounting, re-armed on every item load
#[derive(Debug)]
pub struct ActivityReporter {
    item_id: Uuid,
    complete_threshold: f32,
    minimum_play_percent: f32,
    save_interval: Duration,

    last_position: Option<f64>,
    last_tick_at: Option<Instant>,
    last_save_at: Option<Instant>,
    pending_delta: f64,
    total_watched: f64,
    play_counted: bool,
}

impl ActivityReporter {
    /// `prior_watched` seeds the play-counted accumulator from the server's
    /// known total play duration, so a resumed session does not need to
    /// re-watch the whole threshold.
    pub fn new(item_id: Uuid, config: &PlaybackConfig, prior_watched: f64) -> Self {
        Self {
            item_id,
            complete_threshold: config.complete_threshold,
            minimum_play_percent: config.minimum_play_percent,
            save_interval: config.save_interval(),
            last_position: None,
            last_tick_at: None,
            last_save_at: None,
            pending_delta: 0.0,
            total_watched: prior_watched.max(0.0),
            play_counted: false,
        }
    }

    /// Account one frame tick.
    ///
    /// Ticks with a NaN, non-positive, or infinite duration are skipped
    /// entirely (transient manifest state while a resource spins up).
    pub fn tick(
        &mut self,
        position: f64,
        duration: f64,
        paused: bool,
        now: Instant,
    ) -> Vec<ActivityAction> {
        if !duration.is_finite() || duration <= 0.0 {
            log::trace!("[Activity] Skipping tick with invalid duration {duration}");
            return Vec::new();
        }

        let elapsed = self
            .last_tick_at
            .map(|t| now.duration_since(t).as_secs_f64())
            .unwrap_or(0.0);
        if let Some(prev) = self.last_position
            && !paused
        {
            let advance = position - prev;
            // Forward motion consistent with wall clock counts as watching;
            // a jump is a seek, not watched content
            if advance > 0.0 && advance <= elapsed * 1.5 + 1.0 {
                self.pending_delta += advance;
                self.total_watched += advance;
            }
        }
        self.last_position = Some(position);
        self.last_tick_at = Some(now);

        let mut actions = Vec::new();

        if !self.play_counted
            && (self.total_watched / duration) as f32 >= self.minimum_play_percent
        {
            self.play_counted = true;
            log::info!("[Activity] Play counted for {}", self.item_id);
            actions.push(ActivityAction::PlayCounted(self.item_id));
        }

        let save_due = match self.last_save_at {
            Some(at) => now.duration_since(at) >= self.save_interval,
            // Arm the interval on the first accounted tick
            None => {
                self.last_save_at = Some(now);
                false
            }
        };
        if save_due && self.pending_delta > 0.0 {
            let update = self.build_update(position, duration);
            self.pending_delta = 0.0;
            self.last_save_at = Some(now);
            actions.push(ActivityAction::Save(update));
        }

        actions
    }

    /// Final save when playback stops, ends, or navigates away.
    ///
    /// Returns `None` when there is nothing new to report.
    pub fn flush(&mut self, position: f64, duration: f64) -> Option<ProgressUpdate> {
        if self.pending_delta <= 0.0 {
            return None;
        }
        let update = self.build_update(position, duration);
        self.pending_delta = 0.0;
        Some(update)
    }

    pub fn play_counted(&self) -> bool {
        self.play_counted
    }

    fn build_update(&self, position: f64, duration: f64) -> ProgressUpdate {
        // Near-complete playback needs no resume point
        let resume_position = if duration.is_finite()
            && duration > 0.0
            && WatchProgress::from_position(position, duration)
                .is_complete(self.complete_threshold)
        {
            0.0
        } else {
            position
        };
        ProgressUpdate::new(self.item_id, resume_position, self.pending_delta)
    }
}
