//! Virtual-timeline position translation.
//!
//! Direct-play resources cover the whole timeline, so positions pass
//! through untouched. Offset-corrected (transcoded) resources only cover a
//! window anchored at the last requested start offset: positions the
//! resource reports are shifted by that offset before they reach the UI,
//! and seeks landing outside the buffered window tear the resource down and
//! recreate it anchored at the seek target ("cold seek"). Cold-seek reloads
//! are debounced so a burst of them collapses into one; only the most
//! recent target ever survives.

use reelsync_model::SourceDescriptor;
use std::time::{Duration, Instant};
use url::Url;

/// A buffered span of the resource, in resource time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferedRange {
    pub start: f64,
    pub end: f64,
}

impl BufferedRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, position: f64) -> bool {
        position >= self.start && position <= self.end
    }
}

/// Result of translating a virtual seek request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekOutcome {
    /// Direct play: seek the resource to this position
    Passthrough(f64),
    /// Target is inside the buffered window: seek in place, no reload
    InWindow(f64),
    /// Cold seek: a debounced reload anchored at the target was scheduled;
    /// the resource will restart at resource position 0
    ColdReload,
}

#[derive(Debug, Clone, Copy)]
struct PendingReload {
    virtual_target: f64,
    deadline: Instant,
    /// Offset to revert to if the reload ends up failing
    prior_offset: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
struct InFlightReload {
    prior_offset: Option<f64>,
}

/// Maps virtual (continuous) time to and from the active resource's time
#[derive(Debug)]
pub struct PositionTranslator {
    reload_debounce: Duration,
    declared_duration: Option<f64>,
    offset_start: Option<f64>,
    pending: Option<PendingReload>,
    in_flight: Option<InFlightReload>,
}

impl PositionTranslator {
    pub fn new(reload_debounce: Duration) -> Self {
        Self {
            reload_debounce,
            declared_duration: None,
            offset_start: None,
            pending: None,
            in_flight: None,
        }
    }

    /// Adopt a newly selected source, resetting all translation state
    pub fn on_source_selected(&mut self, descriptor: &SourceDescriptor) {
        self.offset_start = if descriptor.is_offset_corrected
            && descriptor.total_duration.is_some()
        {
            Some(0.0)
        } else {
            None
        };
        self.declared_duration = descriptor.total_duration;
        self.pending = None;
        self.in_flight = None;
    }

    /// Anchor an offset-corrected source at a virtual position before it
    /// loads (resume seeding, codec fallback)
    pub fn anchor_at(&mut self, virtual_position: f64) {
        if self.offset_start.is_some() {
            self.offset_start = Some(virtual_position);
        }
    }

    /// Current start offset; `None` for direct play
    pub fn offset(&self) -> Option<f64> {
        self.offset_start
    }

    /// Duration to present to the UI
    ///
    /// Adaptive manifests grow their reported duration as segments are
    /// produced; the declared total shields callers from that drift.
    pub fn reported_duration(&self, raw_duration: f64) -> f64 {
        self.declared_duration.unwrap_or(raw_duration)
    }

    /// Virtual position corresponding to a raw resource position
    pub fn reported_current_time(&self, raw_position: f64) -> f64 {
        raw_position + self.offset_start.unwrap_or(0.0)
    }

    /// Clamp a virtual seek target to the presentable timeline
    pub fn clamp_target(&self, virtual_target: f64, raw_duration: f64) -> f64 {
        let duration = self.reported_duration(raw_duration);
        let upper = if duration.is_finite() && duration > 0.0 {
            duration
        } else {
            f64::INFINITY
        };
        virtual_target.clamp(0.0, upper)
    }

    /// Translate a settled virtual seek request
    pub fn request_seek(
        &mut self,
        virtual_target: f64,
        buffered: &[BufferedRange],
        now: Instant,
    ) -> SeekOutcome {
        let Some(offset) = self.offset_start else {
            return SeekOutcome::Passthrough(virtual_target);
        };

        // The in-window shortcut is only sound when no swap is underway:
        // mid-reload, the buffered spans describe the outgoing resource
        let swap_underway = self.pending.is_some() || self.in_flight.is_some();
        let resource_target = virtual_target - offset;
        if !swap_underway
            && resource_target >= 0.0
            && buffered.iter().any(|r| r.contains(resource_target))
        {
            log::debug!(
                "[Timeline] In-window seek: virtual {:.2}s -> resource {:.2}s",
                virtual_target,
                resource_target
            );
            return SeekOutcome::InWindow(resource_target);
        }

        // Cold seek: re-anchor the timeline and schedule a reload. A reload
        // already pending is superseded, keeping its revert offset.
        let prior_offset = match self.pending {
            Some(pending) => pending.prior_offset,
            None => Some(offset),
        };
        self.offset_start = Some(virtual_target);
        self.pending = Some(PendingReload {
            virtual_target,
            deadline: now + self.reload_debounce,
            prior_offset,
        });
        log::debug!(
            "[Timeline] Cold seek to {:.2}s; reload debounced {}ms",
            virtual_target,
            self.reload_debounce.as_millis()
        );
        SeekOutcome::ColdReload
    }

    /// Fire the pending reload once its debounce deadline has passed.
    ///
    /// Returns the virtual anchor the caller should reload at; the reload
    /// is then considered in flight until [`Self::complete_reload`] or
    /// [`Self::fail_reload`].
    pub fn poll_reload(&mut self, now: Instant) -> Option<f64> {
        let pending = self.pending?;
        if now < pending.deadline {
            return None;
        }
        self.pending = None;
        self.in_flight = Some(InFlightReload {
            prior_offset: pending.prior_offset,
        });
        Some(pending.virtual_target)
    }

    pub fn reload_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn reload_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// The swapped resource reached the playable state
    pub fn complete_reload(&mut self) {
        self.in_flight = None;
    }

    /// The swapped resource failed to load. Non-fatal: the prior resource
    /// keeps playing, so the timeline reverts to its pre-seek anchor.
    pub fn fail_reload(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            self.offset_start = in_flight.prior_offset;
        }
        self.pending = None;
    }

    /// Rewrite a source URL so the recreated resource starts at the given
    /// virtual anchor
    pub fn reload_url(source_url: &Url, virtual_target: f64) -> Url {
        let mut url = source_url.clone();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != "start")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(pairs)
            .append_pair("start", &format!("{:.3}", virtual_target));
        url
    }
}
