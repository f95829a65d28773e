//! Message handling for the playback session controller.

use super::messages::{Effect, FrameInfo, LoadRequest, SessionEvent, SessionMessage};
use super::state::{ItemSession, Phase};
use super::PlaybackSessionController;
use crate::captions::CaptionCue;
use crate::playlist::{Advance, PlaylistState};
use crate::timeline::{PositionTranslator, SeekOutcome};
use log::{debug, info, trace, warn};
use std::time::Instant;

impl PlaybackSessionController {
    /// Process one host message, returning the effects the host must apply.
    ///
    /// `now` is the host's notion of the current instant; all internal
    /// deadlines (scrub quiescence, reload debounce, activity interval) are
    /// measured against it.
    pub fn update(&mut self, message: SessionMessage, now: Instant) -> Vec<Effect> {
        match message {
            SessionMessage::LoadItem(request) => self.handle_load(request),
            SessionMessage::Playable { epoch } => self.handle_playable(epoch),
            SessionMessage::LoadFailed { epoch, error } => {
                self.handle_load_failed(epoch, error)
            }
            SessionMessage::DecodeError { epoch, error } => {
                self.handle_decode_error(epoch, error)
            }
            SessionMessage::Frame(frame) => self.handle_frame(frame, now),
            SessionMessage::Play => self.handle_play(),
            SessionMessage::Pause => self.handle_pause(),
            SessionMessage::TogglePlayPause => {
                if self.phase == Phase::Playing {
                    self.handle_pause()
                } else {
                    self.handle_play()
                }
            }
            SessionMessage::Seek(target) => self.handle_seek(target, now),
            SessionMessage::EndOfStream => self.handle_end_of_stream(now),
            SessionMessage::Next => self.handle_next(),
            SessionMessage::Previous => self.handle_previous(now),
            SessionMessage::Stop => self.handle_stop(),
            SessionMessage::SetPlaylist { items, start_index } => {
                self.playlist = Some(PlaylistState::new(items, start_index));
                Vec::new()
            }
            SessionMessage::ClearPlaylist => {
                self.playlist = None;
                Vec::new()
            }
            SessionMessage::SetShuffle(enabled) => {
                if let Some(playlist) = self.playlist.as_mut() {
                    playlist.shuffle_enabled = enabled;
                    info!("[Session] Shuffle set to {enabled}");
                }
                Vec::new()
            }
            SessionMessage::SetRepeat(mode) => {
                if let Some(playlist) = self.playlist.as_mut() {
                    playlist.repeat_mode = mode;
                    info!("[Session] Repeat set to {mode:?}");
                }
                Vec::new()
            }
            SessionMessage::SetAutoplayNext(enabled) => {
                if let Some(playlist) = self.playlist.as_mut() {
                    playlist.autoplay_next = enabled;
                }
                Vec::new()
            }
            SessionMessage::SetCaptions(cues) => self.handle_set_captions(cues),
        }
    }

    fn handle_load(&mut self, request: LoadRequest) -> Vec<Effect> {
        let mut effects = Vec::new();

        // Final report for the outgoing item before its state is discarded
        if let Some(item) = self.item.as_mut()
            && let Some(update) = item.activity.flush(item.last_position, item.last_duration)
        {
            effects.push(Effect::Save(update));
        }

        // New epoch: completions still in flight for the old item no longer
        // match and will be dropped
        self.epoch += 1;
        self.phase = Phase::Loading;

        let sources = self.resolver.resolve(request.item_id, &request.streams);
        let active_index = request
            .preferred_label
            .as_deref()
            .and_then(|label| sources.iter().position(|s| s.label == label))
            .unwrap_or(0);

        let prior_watched = request
            .resume
            .map(|r| r.total_play_duration)
            .unwrap_or(0.0);
        let mut item = ItemSession::new(
            request.item_id,
            sources,
            active_index,
            &self.config,
            prior_watched,
        );
        item.autoplay_pending = request.autoplay;
        item.resume.initial_resume_seconds = request
            .resume
            .map(|r| r.resume_seconds)
            .filter(|s| request.should_resume && *s > 0.0);

        let Some(active) = item.active_source().cloned() else {
            // Resolver guarantees at least one source; guard anyway
            self.phase = Phase::Idle;
            return effects;
        };

        let mut load_url = active.url.clone();
        if let Some(resume) = item.resume.initial_resume_seconds
            && item.translator.offset().is_some()
        {
            // Offset-corrected sources are anchored server-side at the
            // resume point, so the resume counts as applied at load
            item.translator.anchor_at(resume);
            item.resume.applied = true;
            item.last_position = resume;
            load_url = PositionTranslator::reload_url(&active.url, resume);
            effects.push(Effect::AdjustCaptions { offset: resume });
        }

        if let Some(index) = request.playlist_index
            && let Some(playlist) = self.playlist.as_mut()
        {
            playlist.select(index);
        }

        info!(
            "[Session] Loading {} with source '{}' ({:?})",
            request.item_id, active.label, active.kind
        );
        effects.push(Effect::LoadSource {
            url: load_url,
            mime_type: active.mime_type,
        });
        self.item = Some(item);
        effects
    }

    fn handle_playable(&mut self, epoch: u64) -> Vec<Effect> {
        if epoch != self.epoch {
            trace!("[Session] Dropping stale playable (epoch {epoch} != {})", self.epoch);
            return Vec::new();
        }
        let Some(item) = self.item.as_mut() else {
            return Vec::new();
        };

        // Cold-seek reload finished: restore the pre-reload play state
        if item.translator.reload_in_flight() {
            item.translator.complete_reload();
            let paused = item.restore_paused_after_reload.take().unwrap_or(item.paused);
            self.phase = if paused { Phase::Paused } else { Phase::Playing };
            return vec![Effect::SetPaused(paused)];
        }

        match self.phase {
            Phase::FallingBack => {
                let mut effects = Vec::new();
                if let Some(position) = item.fallback_resume_position.take()
                    && item.translator.offset().is_none()
                {
                    effects.push(Effect::SeekMedia { seconds: position });
                }
                // Fallback resumes playback unconditionally
                effects.push(Effect::SetPaused(false));
                self.phase = Phase::Playing;
                info!("[Session] Fallback source playable; resuming");
                effects
            }
            Phase::Loading => {
                self.phase = Phase::Ready;
                let mut effects = vec![Effect::Emit(SessionEvent::Ready)];

                if !item.resume.applied
                    && let Some(resume) = item.resume.initial_resume_seconds
                {
                    // Direct play: resource time equals virtual time
                    item.resume.applied = true;
                    item.last_position = resume;
                    debug!("[Session] Applying resume position {resume:.2}s");
                    effects.push(Effect::SeekMedia { seconds: resume });
                }

                if item.autoplay_pending {
                    item.autoplay_pending = false;
                    self.phase = Phase::Playing;
                    effects.push(Effect::SetPaused(false));
                }
                effects
            }
            _ => {
                // Duplicate playable; resume/autoplay latches already consumed
                trace!("[Session] Ignoring playable in phase {:?}", self.phase);
                Vec::new()
            }
        }
    }

    fn handle_load_failed(&mut self, epoch: u64, error: String) -> Vec<Effect> {
        if epoch != self.epoch {
            return Vec::new();
        }

        if let Some(item) = self.item.as_mut()
            && item.translator.reload_in_flight()
        {
            // Non-fatal: the prior resource keeps playing at the pre-seek
            // position; the timeline reverts with it
            warn!("[Session] Cold-seek reload failed: {error}");
            item.translator.fail_reload();
            item.restore_paused_after_reload = None;
            let offset = item.translator.offset().unwrap_or(0.0);
            return vec![
                Effect::AdjustCaptions { offset },
                Effect::Emit(SessionEvent::ReloadFailed { error }),
            ];
        }

        match self.phase {
            Phase::Loading => {
                // Reported upward; retrying is the caller's decision
                warn!("[Session] Source load failed: {error}");
                self.phase = Phase::Idle;
                self.item = None;
                vec![Effect::Emit(SessionEvent::SourceLoadFailed { error })]
            }
            Phase::FallingBack => {
                warn!("[Session] Fallback source failed to load: {error}");
                self.phase = Phase::Failed;
                vec![Effect::Emit(SessionEvent::PlaybackFailed { error })]
            }
            _ => Vec::new(),
        }
    }

    fn handle_decode_error(&mut self, epoch: u64, error: String) -> Vec<Effect> {
        if epoch != self.epoch {
            return Vec::new();
        }
        let Some(item) = self.item.as_mut() else {
            return Vec::new();
        };

        if self.phase == Phase::FallingBack {
            // Latched: a decode error before the fallback's own playable is
            // dropped rather than double-triggering
            debug!("[Session] Decode error during fallback ignored: {error}");
            return Vec::new();
        }

        let eligible = matches!(self.phase, Phase::Playing | Phase::Paused)
            && !item.fallback.triggered
            && item.active_source().map(|s| s.is_direct()).unwrap_or(false);

        if !eligible {
            warn!("[Session] Unrecoverable decode error: {error}");
            self.phase = Phase::Failed;
            let mut effects = Vec::new();
            if let Some(update) = item.activity.flush(item.last_position, item.last_duration) {
                effects.push(Effect::Save(update));
            }
            effects.push(Effect::Emit(SessionEvent::PlaybackFailed { error }));
            return effects;
        }

        item.fallback.triggered = true;
        let Some(index) = item.pick_fallback_index() else {
            warn!("[Session] Decode error with no transcoded rendition to fall back to");
            self.phase = Phase::Failed;
            return vec![Effect::Emit(SessionEvent::PlaybackFailed { error })];
        };
        let Some(fallback) = item.sources.get(index).cloned() else {
            self.phase = Phase::Failed;
            return vec![Effect::Emit(SessionEvent::PlaybackFailed { error })];
        };

        info!(
            "[Session] Codec error on direct play; falling back to '{}' at {:.2}s",
            fallback.label, item.last_position
        );
        let position = item.last_position;
        item.active_index = index;
        item.translator.on_source_selected(&fallback);

        let mut effects = vec![Effect::Emit(SessionEvent::FallbackStarted {
            label: fallback.label.clone(),
        })];
        let url = if item.translator.offset().is_some() && position > 0.0 {
            item.translator.anchor_at(position);
            effects.push(Effect::AdjustCaptions { offset: position });
            PositionTranslator::reload_url(&fallback.url, position)
        } else {
            item.fallback_resume_position = Some(position).filter(|p| *p > 0.0);
            fallback.url.clone()
        };
        self.phase = Phase::FallingBack;
        effects.push(Effect::LoadSource {
            url,
            mime_type: fallback.mime_type,
        });
        effects
    }

    fn handle_frame(&mut self, frame: FrameInfo, now: Instant) -> Vec<Effect> {
        if frame.epoch != self.epoch {
            return Vec::new();
        }
        let Some(item) = self.item.as_mut() else {
            return Vec::new();
        };
        let mut effects = Vec::new();

        item.buffered = frame.buffered;
        item.paused = frame.paused;

        let duration = item.translator.reported_duration(frame.duration);
        if duration.is_finite() && duration > 0.0 {
            item.last_duration = duration;
        }
        // Position updates are suppressed mid-gesture and while a cold-seek
        // reload is pending or in flight: the old resource's raw positions
        // no longer correspond to the re-anchored timeline
        if !item.scrub.is_scrubbing()
            && !item.translator.reload_pending()
            && !item.translator.reload_in_flight()
            && frame.position.is_finite()
            && frame.position >= 0.0
        {
            item.last_position = item.translator.reported_current_time(frame.position);
        }

        if matches!(self.phase, Phase::Ready | Phase::Playing | Phase::Paused) {
            self.phase = if frame.paused {
                Phase::Paused
            } else {
                Phase::Playing
            };
        }

        // Settled scrub gesture
        if let Some(target) = item.scrub.poll(now) {
            effects.extend(item.translate_seek(target, now));
        }

        // Cold-seek reload due. Held back until the quiescence window has
        // passed since the last seek: a forwarded seek may still turn out
        // to be the start of a gesture, and its reload must not fire ahead
        // of the settled target.
        if item.scrub.settled(now)
            && let Some(anchor) = item.translator.poll_reload(now)
        {
            item.restore_paused_after_reload = Some(item.paused);
            if let Some(source) = item.active_source() {
                let url = PositionTranslator::reload_url(&source.url, anchor);
                info!("[Session] Reloading resource anchored at {anchor:.2}s");
                effects.push(Effect::LoadSource {
                    url,
                    mime_type: source.mime_type.clone(),
                });
            }
        }

        if matches!(self.phase, Phase::Playing | Phase::Paused) {
            for action in item
                .activity
                .tick(item.last_position, duration, frame.paused, now)
            {
                effects.push(match action {
                    crate::activity::ActivityAction::Save(update) => Effect::Save(update),
                    crate::activity::ActivityAction::PlayCounted(id) => {
                        Effect::PlayCounted(id)
                    }
                });
            }
        }

        effects
    }

    fn handle_play(&mut self) -> Vec<Effect> {
        if !matches!(self.phase, Phase::Ready | Phase::Paused | Phase::Playing) {
            return Vec::new();
        }
        if let Some(item) = self.item.as_mut() {
            item.paused = false;
        }
        self.phase = Phase::Playing;
        vec![Effect::SetPaused(false)]
    }

    fn handle_pause(&mut self) -> Vec<Effect> {
        if !matches!(self.phase, Phase::Ready | Phase::Paused | Phase::Playing) {
            return Vec::new();
        }
        self.phase = Phase::Paused;
        let mut effects = vec![Effect::SetPaused(true)];
        // Checkpoint progress on pause
        if let Some(item) = self.item.as_mut() {
            item.paused = true;
            if let Some(update) = item.activity.flush(item.last_position, item.last_duration) {
                effects.push(Effect::Save(update));
            }
        }
        effects
    }

    fn handle_seek(&mut self, target: f64, now: Instant) -> Vec<Effect> {
        if !matches!(self.phase, Phase::Ready | Phase::Playing | Phase::Paused) {
            return Vec::new();
        }
        let Some(item) = self.item.as_mut() else {
            return Vec::new();
        };

        let clamped = item.clamp_virtual(target);
        match item.scrub.offer(clamped, now) {
            Some(settled) => item.translate_seek(settled, now),
            // Mid-gesture: nothing reaches the translator yet
            None => Vec::new(),
        }
    }

    fn handle_end_of_stream(&mut self, now: Instant) -> Vec<Effect> {
        if !matches!(self.phase, Phase::Playing | Phase::Paused) {
            return Vec::new();
        }
        let Some(item) = self.item.as_mut() else {
            return Vec::new();
        };
        let mut effects = Vec::new();

        info!("[Session] End of stream for {}", item.item_id);
        if item.last_duration > 0.0 {
            item.last_position = item.last_duration;
        }
        if let Some(update) = item.activity.flush(item.last_position, item.last_duration) {
            effects.push(Effect::Save(update));
        }
        self.phase = Phase::Ended;

        let Some(playlist) = self.playlist.as_mut() else {
            effects.push(Effect::Emit(SessionEvent::Ended));
            return effects;
        };

        match playlist.advance_on_end(&mut self.rng) {
            Advance::ReplayCurrent => {
                debug!("[Session] Repeat-one: replaying current item");
                effects.extend(item.translate_seek(0.0, now));
                effects.push(Effect::SetPaused(false));
                self.phase = Phase::Playing;
            }
            Advance::Stop => {
                effects.push(Effect::Emit(SessionEvent::Ended));
            }
            Advance::Next(index) => {
                if let Some(item_id) = playlist.item_at(index) {
                    effects.push(Effect::Emit(SessionEvent::NavigateTo { index, item_id }));
                } else {
                    effects.push(Effect::Emit(SessionEvent::Ended));
                }
            }
        }
        effects
    }

    fn handle_next(&mut self) -> Vec<Effect> {
        let Some(playlist) = self.playlist.as_mut() else {
            return Vec::new();
        };
        let mut effects = Vec::new();
        if let Some(item) = self.item.as_mut()
            && let Some(update) = item.activity.flush(item.last_position, item.last_duration)
        {
            effects.push(Effect::Save(update));
        }
        if let Some(index) = playlist.next_explicit(&mut self.rng)
            && let Some(item_id) = playlist.item_at(index)
        {
            effects.push(Effect::Emit(SessionEvent::NavigateTo { index, item_id }));
        }
        effects
    }

    fn handle_previous(&mut self, now: Instant) -> Vec<Effect> {
        let Some(item) = self.item.as_mut() else {
            return Vec::new();
        };

        let ratio = if item.last_duration > 0.0 {
            item.last_position / item.last_duration
        } else {
            1.0
        };

        // Deep enough in: restart instead of navigating back
        if ratio >= f64::from(self.config.restart_threshold) {
            return item.translate_seek(0.0, now);
        }

        let mut effects = Vec::new();
        if let Some(playlist) = self.playlist.as_mut()
            && let Some(index) = playlist.previous()
        {
            if let Some(update) = item.activity.flush(item.last_position, item.last_duration) {
                effects.push(Effect::Save(update));
            }
            if let Some(item_id) = playlist.item_at(index) {
                effects.push(Effect::Emit(SessionEvent::NavigateTo { index, item_id }));
                return effects;
            }
        }
        // No previous entry: restart current
        effects.extend(item.translate_seek(0.0, now));
        effects
    }

    fn handle_stop(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(item) = self.item.as_mut()
            && let Some(update) = item.activity.flush(item.last_position, item.last_duration)
        {
            effects.push(Effect::Save(update));
        }
        // Per-item state is discarded outright
        self.item = None;
        self.phase = Phase::Idle;
        effects.push(Effect::Emit(SessionEvent::Stopped));
        effects
    }

    fn handle_set_captions(&mut self, cues: Vec<CaptionCue>) -> Vec<Effect> {
        let Some(item) = self.item.as_mut() else {
            return Vec::new();
        };
        item.captions = cues;
        match item.translator.offset() {
            Some(offset) if offset != 0.0 => vec![Effect::AdjustCaptions { offset }],
            _ => Vec::new(),
        }
    }
}

impl ItemSession {
    /// Clamp a virtual seek target to the presentable timeline
    pub(crate) fn clamp_virtual(&self, target: f64) -> f64 {
        let upper = if self.last_duration > 0.0 {
            self.last_duration
        } else {
            f64::INFINITY
        };
        target.clamp(0.0, upper)
    }

    /// Route a settled virtual seek through the position translator
    pub(crate) fn translate_seek(&mut self, target: f64, now: Instant) -> Vec<Effect> {
        let target = self.clamp_virtual(target);
        match self.translator.request_seek(target, &self.buffered, now) {
            SeekOutcome::Passthrough(seconds) | SeekOutcome::InWindow(seconds) => {
                self.last_position = target;
                vec![Effect::SeekMedia { seconds }]
            }
            SeekOutcome::ColdReload => {
                self.last_position = target;
                vec![Effect::AdjustCaptions {
                    offset: self.translator.offset().unwrap_or(0.0),
                }]
            }
        }
    }
}
