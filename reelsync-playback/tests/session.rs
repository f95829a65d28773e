//! End-to-end session controller flows, driven message by message with
//! explicit time.

use reelsync_model::{ItemID, LibraryID, RawStream, Resolution, ResumeInfo};
use reelsync_playback::session::{FrameInfo, LoadRequest, Phase};
use reelsync_playback::{
    BufferedRange, Effect, PlaybackConfig, PlaybackSessionController, RepeatMode, SessionEvent,
    SessionMessage, SourceResolver,
};
use std::time::{Duration, Instant};
use url::Url;

fn resolver() -> SourceResolver {
    SourceResolver::new("http://127.0.0.1:32401", LibraryID::new()).unwrap()
}

fn controller() -> PlaybackSessionController {
    let _ = env_logger::builder().is_test(true).try_init();
    PlaybackSessionController::with_seeded_rng(PlaybackConfig::default(), resolver(), 7)
}

fn controller_with(config: PlaybackConfig) -> PlaybackSessionController {
    PlaybackSessionController::with_seeded_rng(config, resolver(), 7)
}

/// Direct original plus two transcoded renditions, server-preference order
fn streams() -> Vec<RawStream> {
    vec![
        RawStream {
            url: "http://backend:9000/media/42/original.mp4?api_key=secret".to_string(),
            mime_type: "video/mp4".to_string(),
            label: "Original".to_string(),
            is_direct: true,
            total_duration: Some(600.0),
            bandwidth: None,
            resolution: Some(Resolution::new(1920, 1080)),
        },
        RawStream {
            url: "http://backend:9000/media/42/hls/1080p".to_string(),
            mime_type: "application/vnd.apple.mpegurl".to_string(),
            label: "1080p".to_string(),
            is_direct: false,
            total_duration: Some(600.0),
            bandwidth: Some(8_000_000),
            resolution: Some(Resolution::new(1920, 1080)),
        },
        RawStream {
            url: "http://backend:9000/media/42/hls/720p".to_string(),
            mime_type: "application/vnd.apple.mpegurl".to_string(),
            label: "720p".to_string(),
            is_direct: false,
            total_duration: Some(600.0),
            bandwidth: Some(4_000_000),
            resolution: Some(Resolution::new(1280, 720)),
        },
    ]
}

fn load_request(item_id: ItemID) -> LoadRequest {
    LoadRequest {
        item_id,
        streams: streams(),
        resume: None,
        should_resume: false,
        autoplay: true,
        preferred_label: None,
        playlist_index: None,
    }
}

fn frame(epoch: u64, position: f64, buffered: Vec<BufferedRange>, paused: bool) -> SessionMessage {
    SessionMessage::Frame(FrameInfo {
        epoch,
        position,
        duration: 600.0,
        buffered,
        paused,
    })
}

fn load_source_urls(effects: &[Effect]) -> Vec<&Url> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::LoadSource { url, .. } => Some(url),
            _ => None,
        })
        .collect()
}

fn seeks(effects: &[Effect]) -> Vec<f64> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::SeekMedia { seconds } => Some(*seconds),
            _ => None,
        })
        .collect()
}

fn events(effects: &[Effect]) -> Vec<&SessionEvent> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Emit(event) => Some(event),
            _ => None,
        })
        .collect()
}

#[test]
fn load_then_playable_reaches_playing_with_autoplay() {
    let mut c = controller();
    let t0 = Instant::now();

    let effects = c.update(SessionMessage::LoadItem(load_request(ItemID::new())), t0);
    let urls = load_source_urls(&effects);
    assert_eq!(urls.len(), 1);
    // Credentials never reach the player layer
    assert!(!urls[0].as_str().contains("secret"));
    assert_eq!(c.phase(), Phase::Loading);

    let effects = c.update(SessionMessage::Playable { epoch: c.epoch() }, t0);
    assert!(events(&effects).contains(&&SessionEvent::Ready));
    assert!(effects.contains(&Effect::SetPaused(false)));
    assert_eq!(c.phase(), Phase::Playing);
}

#[test]
fn resume_seeks_exactly_once_on_direct_play() {
    let mut c = controller();
    let t0 = Instant::now();

    let mut request = load_request(ItemID::new());
    request.resume = Some(ResumeInfo {
        resume_seconds: 120.0,
        total_play_duration: 130.0,
    });
    request.should_resume = true;
    c.update(SessionMessage::LoadItem(request), t0);

    let effects = c.update(SessionMessage::Playable { epoch: c.epoch() }, t0);
    assert_eq!(seeks(&effects), vec![120.0]);

    // A duplicate playable must not re-apply the resume seek
    let effects = c.update(SessionMessage::Playable { epoch: c.epoch() }, t0);
    assert!(seeks(&effects).is_empty());
}

#[test]
fn resume_anchors_transcoded_source_in_the_load_url() {
    let mut c = controller();
    let t0 = Instant::now();

    let mut request = load_request(ItemID::new());
    request.preferred_label = Some("1080p".to_string());
    request.resume = Some(ResumeInfo {
        resume_seconds: 300.0,
        total_play_duration: 0.0,
    });
    request.should_resume = true;
    let effects = c.update(SessionMessage::LoadItem(request), t0);

    let urls = load_source_urls(&effects);
    assert_eq!(urls.len(), 1);
    assert!(
        urls[0]
            .query_pairs()
            .any(|(k, v)| k == "start" && v == "300.000")
    );
    assert!(effects.contains(&Effect::AdjustCaptions { offset: 300.0 }));

    // Server-side anchor: no client seek when the source becomes playable
    let effects = c.update(SessionMessage::Playable { epoch: c.epoch() }, t0);
    assert!(seeks(&effects).is_empty());
    assert_eq!(c.current_virtual_time(), 300.0);
}

#[test]
fn stale_epoch_events_are_dropped() {
    let mut c = controller();
    let t0 = Instant::now();

    c.update(SessionMessage::LoadItem(load_request(ItemID::new())), t0);
    let old_epoch = c.epoch();
    c.update(SessionMessage::LoadItem(load_request(ItemID::new())), t0);
    assert_ne!(c.epoch(), old_epoch);

    let effects = c.update(SessionMessage::Playable { epoch: old_epoch }, t0);
    assert!(effects.is_empty());
    assert_eq!(c.phase(), Phase::Loading);

    let effects = c.update(frame(old_epoch, 50.0, vec![], false), t0);
    assert!(effects.is_empty());
    assert_eq!(c.current_virtual_time(), 0.0);
}

#[test]
fn scrub_gesture_produces_exactly_one_reload() {
    let mut c = controller();
    let t0 = Instant::now();

    let mut request = load_request(ItemID::new());
    request.preferred_label = Some("1080p".to_string());
    c.update(SessionMessage::LoadItem(request), t0);
    c.update(SessionMessage::Playable { epoch: c.epoch() }, t0);

    let buffered = vec![BufferedRange::new(0.0, 120.0)];
    let mut reloads = 0;

    // Drag: a burst of out-of-window seeks 100ms apart
    for (ms, target) in [(0u64, 200.0), (100, 240.0), (200, 300.0)] {
        let effects = c.update(
            SessionMessage::Seek(target),
            t0 + Duration::from_millis(ms),
        );
        reloads += load_source_urls(&effects).len();
    }
    assert!(c.is_scrubbing());

    // Frames keep arriving during and after the drag
    for ms in [240u64, 400, 600, 900] {
        let effects = c.update(
            frame(c.epoch(), 30.0, buffered.clone(), false),
            t0 + Duration::from_millis(ms),
        );
        reloads += load_source_urls(&effects)
            .iter()
            .inspect(|url| {
                assert!(
                    url.query_pairs().any(|(k, v)| k == "start" && v == "300.000"),
                    "reload must target the final gesture position"
                );
            })
            .count();
    }

    assert_eq!(reloads, 1);
    assert_eq!(c.current_virtual_time(), 300.0);
}

#[test]
fn slow_gesture_holds_the_first_reload_until_it_settles() {
    let mut c = controller();
    let t0 = Instant::now();

    let mut request = load_request(ItemID::new());
    request.preferred_label = Some("1080p".to_string());
    c.update(SessionMessage::LoadItem(request), t0);
    c.update(SessionMessage::Playable { epoch: c.epoch() }, t0);

    let buffered = vec![BufferedRange::new(0.0, 120.0)];
    let mut reloads = 0;

    // Two seeks spaced just under the quiescence window (300ms) form one
    // gesture, but the first is forwarded before the second arrives and
    // its reload debounce (250ms) expires in between
    let effects = c.update(SessionMessage::Seek(200.0), t0 + Duration::from_millis(1000));
    reloads += load_source_urls(&effects).len();

    // Frame after the debounce but before the window: the pending reload
    // must be held, not fired at the superseded target
    let effects = c.update(
        frame(c.epoch(), 30.0, buffered.clone(), false),
        t0 + Duration::from_millis(1260),
    );
    reloads += load_source_urls(&effects).len();

    let effects = c.update(SessionMessage::Seek(240.0), t0 + Duration::from_millis(1280));
    reloads += load_source_urls(&effects).len();
    assert!(c.is_scrubbing());

    for ms in [1400u64, 1600, 1900] {
        let effects = c.update(
            frame(c.epoch(), 30.0, buffered.clone(), false),
            t0 + Duration::from_millis(ms),
        );
        reloads += load_source_urls(&effects)
            .iter()
            .inspect(|url| {
                assert!(
                    url.query_pairs().any(|(k, v)| k == "start" && v == "240.000"),
                    "reload must target the final gesture position"
                );
            })
            .count();
    }

    assert_eq!(reloads, 1);
    assert_eq!(c.current_virtual_time(), 240.0);
}

#[test]
fn cold_seek_translates_positions_after_reload() {
    let mut c = controller();
    let t0 = Instant::now();

    let mut request = load_request(ItemID::new());
    request.preferred_label = Some("1080p".to_string());
    c.update(SessionMessage::LoadItem(request), t0);
    c.update(SessionMessage::Playable { epoch: c.epoch() }, t0);

    // Out-of-window seek re-anchors immediately
    let buffered = vec![BufferedRange::new(0.0, 120.0)];
    let effects = c.update(SessionMessage::Seek(300.0), t0 + Duration::from_secs(1));
    assert!(seeks(&effects).is_empty());
    assert_eq!(c.current_virtual_time(), 300.0);

    // Debounce elapses on a later frame; the reload fires once
    let effects = c.update(
        frame(c.epoch(), 119.0, buffered, false),
        t0 + Duration::from_millis(1400),
    );
    assert_eq!(load_source_urls(&effects).len(), 1);

    // Swapped resource comes up; raw positions are shifted by the anchor
    let effects = c.update(
        SessionMessage::Playable { epoch: c.epoch() },
        t0 + Duration::from_secs(2),
    );
    assert!(effects.contains(&Effect::SetPaused(false)));
    c.update(
        frame(c.epoch(), 5.0, vec![BufferedRange::new(0.0, 30.0)], false),
        t0 + Duration::from_secs(3),
    );
    assert_eq!(c.current_virtual_time(), 305.0);
    assert_eq!(c.duration(), 600.0);
}

#[test]
fn in_window_seek_never_reloads() {
    let mut c = controller();
    let t0 = Instant::now();

    let mut request = load_request(ItemID::new());
    request.preferred_label = Some("1080p".to_string());
    c.update(SessionMessage::LoadItem(request), t0);
    c.update(SessionMessage::Playable { epoch: c.epoch() }, t0);
    c.update(
        frame(c.epoch(), 10.0, vec![BufferedRange::new(0.0, 120.0)], false),
        t0,
    );

    let effects = c.update(SessionMessage::Seek(60.0), t0 + Duration::from_secs(1));
    assert_eq!(seeks(&effects), vec![60.0]);
    assert!(load_source_urls(&effects).is_empty());

    // No reload fires later either
    let effects = c.update(
        frame(c.epoch(), 60.0, vec![BufferedRange::new(0.0, 120.0)], false),
        t0 + Duration::from_secs(2),
    );
    assert!(load_source_urls(&effects).is_empty());
}

#[test]
fn reload_failure_reverts_the_timeline() {
    let mut c = controller();
    let t0 = Instant::now();

    let mut request = load_request(ItemID::new());
    request.preferred_label = Some("1080p".to_string());
    c.update(SessionMessage::LoadItem(request), t0);
    c.update(SessionMessage::Playable { epoch: c.epoch() }, t0);

    c.update(SessionMessage::Seek(300.0), t0 + Duration::from_secs(1));
    let effects = c.update(
        frame(c.epoch(), 60.0, vec![], false),
        t0 + Duration::from_secs(2),
    );
    assert_eq!(load_source_urls(&effects).len(), 1);

    let effects = c.update(
        SessionMessage::LoadFailed {
            epoch: c.epoch(),
            error: "manifest 503".to_string(),
        },
        t0 + Duration::from_secs(3),
    );
    assert!(matches!(
        events(&effects).as_slice(),
        [SessionEvent::ReloadFailed { .. }]
    ));
    assert!(effects.contains(&Effect::AdjustCaptions { offset: 0.0 }));

    // Prior resource keeps playing at its old anchor
    c.update(
        frame(c.epoch(), 61.0, vec![BufferedRange::new(0.0, 120.0)], false),
        t0 + Duration::from_secs(4),
    );
    assert_eq!(c.current_virtual_time(), 61.0);
}

#[test]
fn codec_error_falls_back_once_then_fails() {
    let mut c = controller();
    let t0 = Instant::now();

    c.update(SessionMessage::LoadItem(load_request(ItemID::new())), t0);
    c.update(SessionMessage::Playable { epoch: c.epoch() }, t0);
    c.update(
        frame(c.epoch(), 90.0, vec![BufferedRange::new(0.0, 120.0)], false),
        t0,
    );
    assert_eq!(c.active_source().unwrap().label, "Original");

    let effects = c.update(
        SessionMessage::DecodeError {
            epoch: c.epoch(),
            error: "unsupported codec hevc".to_string(),
        },
        t0 + Duration::from_secs(1),
    );
    assert_eq!(c.phase(), Phase::FallingBack);
    // Best transcoded rendition within the source's resolution
    assert!(
        events(&effects)
            .iter()
            .any(|e| matches!(e, SessionEvent::FallbackStarted { label } if label == "1080p"))
    );
    let urls = load_source_urls(&effects);
    assert_eq!(urls.len(), 1);
    // Swap picks up at the failure position via server-side anchoring
    assert!(urls[0].query_pairs().any(|(k, v)| k == "start" && v == "90.000"));

    // A second decode error while the swap is pending is dropped
    let effects = c.update(
        SessionMessage::DecodeError {
            epoch: c.epoch(),
            error: "still broken".to_string(),
        },
        t0 + Duration::from_secs(2),
    );
    assert!(effects.is_empty());

    let effects = c.update(
        SessionMessage::Playable { epoch: c.epoch() },
        t0 + Duration::from_secs(3),
    );
    assert!(effects.contains(&Effect::SetPaused(false)));
    assert_eq!(c.phase(), Phase::Playing);
    assert_eq!(c.active_source().unwrap().label, "1080p");

    // Fallback is once per item: the next decode error is fatal
    let effects = c.update(
        SessionMessage::DecodeError {
            epoch: c.epoch(),
            error: "audio codec".to_string(),
        },
        t0 + Duration::from_secs(4),
    );
    assert!(
        events(&effects)
            .iter()
            .any(|e| matches!(e, SessionEvent::PlaybackFailed { .. }))
    );
    assert_eq!(c.phase(), Phase::Failed);
}

#[test]
fn codec_error_with_no_transcoded_rendition_is_fatal() {
    let mut c = controller();
    let t0 = Instant::now();

    let mut request = load_request(ItemID::new());
    request.streams.truncate(1); // direct only
    c.update(SessionMessage::LoadItem(request), t0);
    c.update(SessionMessage::Playable { epoch: c.epoch() }, t0);
    c.update(frame(c.epoch(), 10.0, vec![], false), t0);

    let effects = c.update(
        SessionMessage::DecodeError {
            epoch: c.epoch(),
            error: "unsupported".to_string(),
        },
        t0 + Duration::from_secs(1),
    );
    assert!(
        events(&effects)
            .iter()
            .any(|e| matches!(e, SessionEvent::PlaybackFailed { .. }))
    );
    assert_eq!(c.phase(), Phase::Failed);
}

#[test]
fn end_of_stream_advances_the_playlist() {
    let mut c = controller();
    let t0 = Instant::now();
    let items: Vec<ItemID> = (0..3).map(|_| ItemID::new()).collect();

    c.update(
        SessionMessage::SetPlaylist {
            items: items.clone(),
            start_index: 0,
        },
        t0,
    );
    c.update(SessionMessage::LoadItem(load_request(items[0])), t0);
    c.update(SessionMessage::Playable { epoch: c.epoch() }, t0);
    c.update(frame(c.epoch(), 598.0, vec![], false), t0);
    c.update(
        frame(c.epoch(), 599.0, vec![], false),
        t0 + Duration::from_secs(1),
    );

    let effects = c.update(SessionMessage::EndOfStream, t0 + Duration::from_secs(2));
    assert!(events(&effects).iter().any(
        |e| matches!(e, SessionEvent::NavigateTo { index: 1, item_id } if *item_id == items[1])
    ));
    // Watched to the end: the final save clears the resume point
    let save = effects
        .iter()
        .find_map(|e| match e {
            Effect::Save(update) => Some(update),
            _ => None,
        })
        .expect("final save on end of stream");
    assert_eq!(save.resume_position, 0.0);
}

#[test]
fn end_of_stream_with_autoplay_off_just_ends() {
    let mut c = controller();
    let t0 = Instant::now();
    let items: Vec<ItemID> = (0..2).map(|_| ItemID::new()).collect();

    c.update(
        SessionMessage::SetPlaylist {
            items: items.clone(),
            start_index: 0,
        },
        t0,
    );
    c.update(SessionMessage::SetAutoplayNext(false), t0);
    c.update(SessionMessage::LoadItem(load_request(items[0])), t0);
    c.update(SessionMessage::Playable { epoch: c.epoch() }, t0);
    c.update(frame(c.epoch(), 599.0, vec![], false), t0);

    let effects = c.update(SessionMessage::EndOfStream, t0 + Duration::from_secs(1));
    assert!(events(&effects).contains(&&SessionEvent::Ended));
    assert_eq!(c.phase(), Phase::Ended);
}

#[test]
fn repeat_one_replays_from_the_start() {
    let mut c = controller();
    let t0 = Instant::now();
    let items: Vec<ItemID> = (0..2).map(|_| ItemID::new()).collect();

    c.update(
        SessionMessage::SetPlaylist {
            items,
            start_index: 0,
        },
        t0,
    );
    c.update(SessionMessage::SetRepeat(RepeatMode::One), t0);
    c.update(SessionMessage::LoadItem(load_request(ItemID::new())), t0);
    c.update(SessionMessage::Playable { epoch: c.epoch() }, t0);
    c.update(frame(c.epoch(), 599.0, vec![], false), t0);

    let effects = c.update(SessionMessage::EndOfStream, t0 + Duration::from_secs(1));
    assert_eq!(seeks(&effects), vec![0.0]);
    assert!(effects.contains(&Effect::SetPaused(false)));
    assert_eq!(c.phase(), Phase::Playing);
}

#[test]
fn previous_restarts_when_deep_enough_in() {
    let mut c = controller();
    let t0 = Instant::now();
    let items: Vec<ItemID> = (0..3).map(|_| ItemID::new()).collect();

    c.update(
        SessionMessage::SetPlaylist {
            items: items.clone(),
            start_index: 1,
        },
        t0,
    );
    c.update(SessionMessage::LoadItem(load_request(items[1])), t0);
    c.update(SessionMessage::Playable { epoch: c.epoch() }, t0);

    // 100s of 600s is past the restart threshold: restart, don't navigate
    c.update(frame(c.epoch(), 100.0, vec![], false), t0);
    let effects = c.update(SessionMessage::Previous, t0 + Duration::from_secs(1));
    assert_eq!(seeks(&effects), vec![0.0]);
    assert!(events(&effects).is_empty());

    // 10s of 600s is early: navigate to the previous entry
    c.update(
        frame(c.epoch(), 10.0, vec![], false),
        t0 + Duration::from_secs(2),
    );
    let effects = c.update(SessionMessage::Previous, t0 + Duration::from_secs(3));
    assert!(events(&effects).iter().any(
        |e| matches!(e, SessionEvent::NavigateTo { index: 0, item_id } if *item_id == items[0])
    ));
}

#[test]
fn stop_discards_item_state_but_keeps_the_playlist() {
    let mut c = controller();
    let t0 = Instant::now();
    let items: Vec<ItemID> = (0..2).map(|_| ItemID::new()).collect();

    c.update(
        SessionMessage::SetPlaylist {
            items,
            start_index: 0,
        },
        t0,
    );
    c.update(SessionMessage::LoadItem(load_request(ItemID::new())), t0);
    c.update(SessionMessage::Playable { epoch: c.epoch() }, t0);
    c.update(frame(c.epoch(), 30.0, vec![], false), t0);
    c.update(
        frame(c.epoch(), 31.0, vec![], false),
        t0 + Duration::from_secs(1),
    );

    let effects = c.update(SessionMessage::Stop, t0 + Duration::from_secs(2));
    assert!(events(&effects).contains(&&SessionEvent::Stopped));
    assert!(effects.iter().any(|e| matches!(e, Effect::Save(_))));
    assert_eq!(c.phase(), Phase::Idle);
    assert!(c.active_source().is_none());
    assert!(c.playlist().is_some());

    // Frames for the torn-down item are inert
    let effects = c.update(
        frame(c.epoch(), 32.0, vec![], false),
        t0 + Duration::from_secs(3),
    );
    assert!(effects.is_empty());
}

#[test]
fn frames_drive_periodic_saves_and_play_count() {
    let config = PlaybackConfig {
        save_interval_secs: 5,
        minimum_play_percent: 0.01,
        ..PlaybackConfig::default()
    };
    let mut c = controller_with(config);
    let t0 = Instant::now();

    c.update(SessionMessage::LoadItem(load_request(ItemID::new())), t0);
    c.update(SessionMessage::Playable { epoch: c.epoch() }, t0);

    let mut saves = 0;
    let mut counted = 0;
    for s in 0..=8u64 {
        let effects = c.update(
            frame(c.epoch(), s as f64, vec![], false),
            t0 + Duration::from_secs(s),
        );
        saves += effects.iter().filter(|e| matches!(e, Effect::Save(_))).count();
        counted += effects
            .iter()
            .filter(|e| matches!(e, Effect::PlayCounted(_)))
            .count();
    }
    assert!(saves >= 1);
    assert_eq!(counted, 1);
}

#[test]
fn pause_checkpoints_progress() {
    let mut c = controller();
    let t0 = Instant::now();

    c.update(SessionMessage::LoadItem(load_request(ItemID::new())), t0);
    c.update(SessionMessage::Playable { epoch: c.epoch() }, t0);
    c.update(frame(c.epoch(), 40.0, vec![], false), t0);
    c.update(
        frame(c.epoch(), 41.0, vec![], false),
        t0 + Duration::from_secs(1),
    );

    let effects = c.update(SessionMessage::Pause, t0 + Duration::from_secs(2));
    assert!(effects.contains(&Effect::SetPaused(true)));
    let save = effects
        .iter()
        .find_map(|e| match e {
            Effect::Save(update) => Some(update),
            _ => None,
        })
        .expect("pause flushes pending progress");
    assert_eq!(save.resume_position, 41.0);
    assert_eq!(c.phase(), Phase::Paused);
}
