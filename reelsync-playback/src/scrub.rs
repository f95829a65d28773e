//! Scrub-gesture coalescing.
//!
//! A dragged seek bar emits a burst of seek requests. Two requests closer
//! together than the quiescence window belong to one gesture; the gesture
//! settles once the window passes with no further request, and only the
//! final target is forwarded to the position translator. Combined with the
//! translator's reload debounce this guarantees at most one reload per
//! gesture no matter how many events the drag produced.

use std::time::{Duration, Instant};

/// Collapses a rapid seek sequence into a single settled seek
#[derive(Debug)]
pub struct ScrubCoalescer {
    window: Duration,
    last_seek_at: Option<Instant>,
    pending_target: Option<f64>,
    quiescence_deadline: Option<Instant>,
    scrubbing: bool,
}

impl ScrubCoalescer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_seek_at: None,
            pending_target: None,
            quiescence_deadline: None,
            scrubbing: false,
        }
    }

    /// Offer a seek request.
    ///
    /// Returns the target when it should be forwarded immediately (the
    /// request is not part of an ongoing gesture); returns `None` when the
    /// request was absorbed into a gesture, to be released by [`Self::poll`].
    pub fn offer(&mut self, target: f64, now: Instant) -> Option<f64> {
        let within_gesture = self
            .last_seek_at
            .is_some_and(|last| now.duration_since(last) < self.window);
        self.last_seek_at = Some(now);

        if within_gesture {
            self.scrubbing = true;
            self.pending_target = Some(target);
            self.quiescence_deadline = Some(now + self.window);
            log::trace!("[Scrub] Absorbed seek to {:.2}s into gesture", target);
            None
        } else {
            self.scrubbing = false;
            self.pending_target = None;
            self.quiescence_deadline = None;
            Some(target)
        }
    }

    /// Release the remembered target once the gesture has gone quiet
    pub fn poll(&mut self, now: Instant) -> Option<f64> {
        let deadline = self.quiescence_deadline?;
        if now < deadline {
            return None;
        }
        self.scrubbing = false;
        self.quiescence_deadline = None;
        let target = self.pending_target.take();
        if let Some(target) = target {
            log::debug!("[Scrub] Gesture settled at {:.2}s", target);
        }
        target
    }

    pub fn is_scrubbing(&self) -> bool {
        self.scrubbing
    }

    /// True once the window has passed since the last offered seek.
    ///
    /// A forwarded seek leaves `is_scrubbing` false even though a follow-up
    /// inside the window would retroactively make it part of a gesture;
    /// reload decisions wait for this instead.
    pub fn settled(&self, now: Instant) -> bool {
        self.last_seek_at
            .is_none_or(|last| now.duration_since(last) >= self.window)
    }

    /// Drop any gesture in progress (item change, stop)
    pub fn reset(&mut self) {
        self.last_seek_at = None;
        self.pending_target = None;
        self.quiescence_deadline = None;
        self.scrubbing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coalescer() -> ScrubCoalescer {
        ScrubCoalescer::new(Duration::from_millis(300))
    }

    #[test]
    fn isolated_seeks_forward_immediately() {
        let mut c = coalescer();
        let t0 = Instant::now();
        assert_eq!(c.offer(10.0, t0), Some(10.0));
        assert!(!c.is_scrubbing());
        assert_eq!(c.offer(50.0, t0 + Duration::from_millis(400)), Some(50.0));
        assert_eq!(c.offer(90.0, t0 + Duration::from_millis(800)), Some(90.0));
    }

    #[test]
    fn rapid_sequence_settles_on_final_target() {
        let mut c = coalescer();
        let t0 = Instant::now();
        // First of the burst goes straight through
        assert_eq!(c.offer(100.0, t0), Some(100.0));
        // The rest of the drag is absorbed
        assert_eq!(c.offer(120.0, t0 + Duration::from_millis(50)), None);
        assert_eq!(c.offer(140.0, t0 + Duration::from_millis(100)), None);
        assert_eq!(c.offer(300.0, t0 + Duration::from_millis(150)), None);
        assert!(c.is_scrubbing());

        // Nothing until the window passes without another seek
        assert_eq!(c.poll(t0 + Duration::from_millis(300)), None);
        assert_eq!(c.poll(t0 + Duration::from_millis(450)), Some(300.0));
        assert!(!c.is_scrubbing());
        // One-shot
        assert_eq!(c.poll(t0 + Duration::from_secs(1)), None);
    }

    #[test]
    fn gesture_extends_while_seeks_keep_arriving() {
        let mut c = coalescer();
        let t0 = Instant::now();
        c.offer(10.0, t0);
        c.offer(20.0, t0 + Duration::from_millis(200));
        // Still scrubbing at t0+400 because the last seek was 200ms ago
        assert_eq!(c.poll(t0 + Duration::from_millis(400)), None);
        c.offer(30.0, t0 + Duration::from_millis(450));
        assert_eq!(c.poll(t0 + Duration::from_millis(700)), None);
        assert_eq!(c.poll(t0 + Duration::from_millis(750)), Some(30.0));
    }

    #[test]
    fn not_settled_until_window_passes_after_any_seek() {
        let mut c = coalescer();
        let t0 = Instant::now();
        assert!(c.settled(t0));
        // Forwarded immediately, yet a follow-up within the window would
        // still join it into a gesture
        assert_eq!(c.offer(10.0, t0), Some(10.0));
        assert!(!c.is_scrubbing());
        assert!(!c.settled(t0 + Duration::from_millis(299)));
        assert!(c.settled(t0 + Duration::from_millis(300)));
    }

    #[test]
    fn reset_drops_gesture() {
        let mut c = coalescer();
        let t0 = Instant::now();
        c.offer(10.0, t0);
        c.offer(20.0, t0 + Duration::from_millis(100));
        c.reset();
        assert!(!c.is_scrubbing());
        assert_eq!(c.poll(t0 + Duration::from_secs(1)), None);
    }
}
