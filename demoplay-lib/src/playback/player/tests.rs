use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::*;
use crate::clock::ManualClock;
use crate::playback::{IssueKind, MediaErrorCode, PlayError, PlayErrorKind, TapError};
use crate::testing::{ElementRemote, ScriptedElement};

fn player_with(config: PlayerConfig) -> (Player, ElementRemote, ManualClock) {
    let (element, remote) = ScriptedElement::new();
    let clock = ManualClock::new();
    let player = Player::with_clock(Box::new(element), config, Arc::new(clock.clone()));
    (player, remote, clock)
}

fn playing_player(config: PlayerConfig) -> (Player, ElementRemote, ManualClock) {
    let (mut player, remote, clock) = player_with(config);
    player.set_source(Some("song-a.mp3"));
    player.play().unwrap();
    player.pump();
    assert_eq!(player.state(), PlaybackState::Playing);
    (player, remote, clock)
}

#[test]
fn play_moves_through_loading_to_playing() {
    let (mut player, _remote, _clock) = player_with(PlayerConfig::default());
    assert_eq!(player.state(), PlaybackState::Idle);
    player.set_source(Some("song-a.mp3"));
    assert_eq!(player.state(), PlaybackState::Loading);
    assert!(!player.is_playing());

    player.play().unwrap();
    assert_eq!(player.state(), PlaybackState::Loading);
    assert!(player.is_playing());

    player.pump();
    assert_eq!(player.state(), PlaybackState::Playing);
    assert!(player.is_playing());
}

#[test]
fn loading_without_intent_settles_idle() {
    let (mut player, remote, _clock) = player_with(PlayerConfig::default());
    player.set_source(Some("song-a.mp3"));
    remote.push_event(MediaEvent::CanPlay);
    player.pump();
    assert_eq!(player.state(), PlaybackState::Idle);
    assert_eq!(remote.play_calls(), 0);
}

#[test]
fn retry_for_previous_source_never_fires() {
    let (mut player, remote, clock) = playing_player(PlayerConfig::default());
    remote.push_event(MediaEvent::Error(MediaErrorCode::Network));
    player.pump();
    assert_eq!(player.store().retries(), 1);

    clock.advance(400);
    player.set_source(Some("song-b.mp3"));
    clock.advance(1_000);
    player.pump();

    assert_eq!(
        remote.loads(),
        vec![Some("song-a.mp3".to_string()), Some("song-b.mp3".to_string())]
    );
    assert_eq!(player.store().retries(), 0);
}

#[test]
fn retries_stop_at_the_ceiling() {
    let (mut player, remote, clock) = playing_player(PlayerConfig::default());

    for expected_loads in 2..=3 {
        remote.push_event(MediaEvent::Error(MediaErrorCode::Network));
        player.pump();
        clock.advance(1_000);
        player.pump();
        assert_eq!(remote.loads().len(), expected_loads);
        assert!(player.store().retries() <= 3);
    }

    remote.push_event(MediaEvent::Error(MediaErrorCode::Network));
    player.pump();
    assert_eq!(player.state(), PlaybackState::Error);
    assert_eq!(player.store().retries(), 3);
    assert!(!player.is_playing());
    assert_eq!(
        player.store().issue().map(|issue| issue.kind),
        Some(IssueKind::LoadFailed)
    );

    clock.advance(10_000);
    player.pump();
    assert_eq!(remote.loads().len(), 3);
}

#[test]
fn errors_while_retry_pending_are_ignored() {
    let (mut player, remote, _clock) = playing_player(PlayerConfig::default());
    remote.push_event(MediaEvent::Error(MediaErrorCode::Network));
    remote.push_event(MediaEvent::Error(MediaErrorCode::Decode));
    remote.push_event(MediaEvent::Error(MediaErrorCode::Network));
    player.pump();
    assert_eq!(player.store().retries(), 1);
}

#[test]
fn unsupported_source_fails_without_retry() {
    let (mut player, remote, clock) = playing_player(PlayerConfig::default());
    remote.push_event(MediaEvent::Error(MediaErrorCode::SrcNotSupported));
    player.pump();
    assert_eq!(player.state(), PlaybackState::Error);
    assert_eq!(
        player.store().issue().map(|issue| issue.kind),
        Some(IssueKind::FormatUnsupported)
    );
    clock.advance(5_000);
    player.pump();
    assert_eq!(remote.loads().len(), 1);

    // A fresh play intent reloads.
    player.play().unwrap();
    assert_eq!(remote.loads().len(), 2);
    assert_eq!(player.store().retries(), 0);
    assert!(player.store().issue().is_none());
}

#[test]
fn autoplay_rejection_is_recoverable() {
    let (mut player, remote, _clock) = player_with(PlayerConfig::default());
    player.set_source(Some("song-a.mp3"));
    remote.reject_next_play(PlayError::new(PlayErrorKind::AutoplayBlocked, "NotAllowedError"));

    let err = player.play().unwrap_err();
    assert_eq!(err.kind, PlayErrorKind::AutoplayBlocked);
    assert_eq!(player.state(), PlaybackState::Paused);
    assert!(!player.is_playing());
    assert_eq!(
        player.store().issue().map(|issue| issue.kind),
        Some(IssueKind::AutoplayBlocked)
    );

    player.play().unwrap();
    player.pump();
    assert_eq!(player.state(), PlaybackState::Playing);
    assert!(player.store().issue().is_none());
}

#[test]
fn format_rejection_is_an_error() {
    let (mut player, remote, _clock) = player_with(PlayerConfig::default());
    player.set_source(Some("song-a.opus"));
    remote.reject_next_play(PlayError::new(
        PlayErrorKind::FormatUnsupported,
        "NotSupportedError",
    ));
    assert!(player.play().is_err());
    assert_eq!(player.state(), PlaybackState::Error);
    let issue = player.store().issue().cloned().unwrap();
    assert_eq!(issue.kind, IssueKind::FormatUnsupported);
    assert_eq!(issue.message, "This audio format is not supported on this device");
}

#[test]
fn seek_clamps_to_known_duration() {
    let (mut player, remote, _clock) = player_with(PlayerConfig::default());
    player.set_source(Some("song-a.mp3"));
    assert_eq!(player.seek(500.0), 500.0);

    remote.set_live_duration(100.0);
    remote.push_event(MediaEvent::DurationChange);
    player.pump();
    assert_eq!(player.duration(), MediaDuration::Known(100.0));

    assert_eq!(player.seek(150.0), 100.0);
    assert_eq!(remote.live_time(), 100.0);
    assert_eq!(player.seek(-5.0), 0.0);
    assert_eq!(player.current_time(), 0.0);
}

#[test]
fn buffering_is_debounced_and_suppressed_after_seek() {
    let config = PlayerConfig {
        show_buffering_indicator: true,
        ..PlayerConfig::default()
    };
    let (mut player, remote, clock) = player_with(config);
    clock.set(10_000);
    player.set_source(Some("song-a.mp3"));
    player.play().unwrap();
    player.pump();

    remote.push_event(MediaEvent::Waiting);
    player.pump();
    clock.set(10_700);
    player.seek(5.0);
    player.pump();

    clock.set(10_800);
    remote.push_event(MediaEvent::Waiting);
    player.pump();
    for now in [10_900, 11_000, 11_100, 11_199] {
        clock.set(now);
        player.pump();
        assert!(!player.store().is_buffering(), "visible at {}", now);
    }

    clock.set(11_800);
    player.pump();
    assert!(player.store().is_buffering());

    remote.set_live_time(6.0);
    remote.push_event(MediaEvent::TimeUpdate);
    player.pump();
    assert!(!player.store().is_buffering());
}

#[test]
fn buffering_check_inside_window_is_deferred() {
    let config = PlayerConfig {
        show_buffering_indicator: true,
        ..PlayerConfig::default()
    };
    let (mut player, remote, clock) = player_with(config);
    remote.set_auto_events(false);
    player.set_source(Some("song-a.mp3"));
    player.play().unwrap();
    remote.push_event(MediaEvent::Play);
    remote.push_event(MediaEvent::Playing);
    player.pump();

    clock.set(1_000);
    remote.push_event(MediaEvent::Stalled);
    player.pump();

    clock.set(1_800);
    player.play().unwrap();

    clock.set(2_000);
    player.pump();
    assert!(!player.store().is_buffering());

    clock.set(2_300);
    player.pump();
    assert!(player.store().is_buffering());
}

#[test]
fn buffering_indicator_is_off_by_default() {
    let (mut player, remote, clock) = playing_player(PlayerConfig::default());
    remote.push_event(MediaEvent::Waiting);
    player.pump();
    clock.advance(5_000);
    player.pump();
    assert!(!player.store().is_buffering());
}

#[test]
fn buffering_stays_hidden_through_visibility_restore_window() {
    let config = PlayerConfig {
        show_buffering_indicator: true,
        buffering_debounce_ms: 200,
        ..PlayerConfig::default()
    };
    let (mut player, remote, clock) = playing_player(config);

    clock.set(4_000);
    player.on_visibility(VisibilitySignal::Hidden);
    clock.set(5_000);
    player.on_visibility(VisibilitySignal::Visible);
    assert_eq!(player.state(), PlaybackState::Playing);

    // First stall check lands at 5_300, inside the window, and is deferred.
    for (now, stall) in [(5_100, true), (5_300, false), (5_400, true), (5_499, false)] {
        clock.set(now);
        if stall {
            remote.push_event(MediaEvent::Waiting);
        }
        player.pump();
        assert!(!player.store().is_buffering(), "visible at {}", now);
    }

    clock.set(5_500);
    player.pump();
    assert!(player.store().is_buffering());
}

#[test]
fn visibility_restore_adopts_live_position() {
    let (mut player, remote, _clock) = playing_player(PlayerConfig::default());
    remote.set_live_duration(300.0);
    remote.set_live_time(42.0);
    remote.push_event(MediaEvent::TimeUpdate);
    player.pump();
    assert_eq!(player.current_time(), 42.0);

    player.on_visibility(VisibilitySignal::Hidden);
    assert_eq!(player.state(), PlaybackState::Playing);
    remote.set_live_time(55.0);

    player.on_visibility(VisibilitySignal::Visible);
    assert_eq!(player.current_time(), 55.0);
    assert_eq!(player.state(), PlaybackState::Playing);
    assert_eq!(player.duration(), MediaDuration::Known(300.0));

    player.on_visibility(VisibilitySignal::Visible);
    assert_eq!(player.visibility_resyncs(), 1);
}

#[test]
fn hidden_page_pauses_without_background_playback() {
    let config = PlayerConfig {
        allow_background_playback: false,
        ..PlayerConfig::default()
    };
    let (mut player, remote, _clock) = playing_player(config);
    player.on_visibility(VisibilitySignal::Hidden);
    assert_eq!(remote.pause_calls(), 1);
    assert_eq!(player.state(), PlaybackState::Paused);
    player.pump();
    assert_eq!(player.state(), PlaybackState::Paused);
}

#[test]
fn restore_picks_up_pause_that_happened_while_hidden() {
    let (mut player, remote, _clock) = playing_player(PlayerConfig::default());
    remote.set_auto_events(false);
    player.on_visibility(VisibilitySignal::Hidden);
    remote.set_paused(true);
    player.on_visibility(VisibilitySignal::Restored);
    assert_eq!(player.state(), PlaybackState::Paused);
    assert!(!player.is_playing());
}

#[test]
fn track_end_fires_once_and_resets_position() {
    let (mut player, remote, _clock) = playing_player(PlayerConfig::default());
    let ends = Arc::new(AtomicUsize::new(0));
    let counter = ends.clone();
    player.set_on_track_end(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    remote.set_live_time(10.0);
    remote.set_ended(true);
    remote.push_event(MediaEvent::Pause);
    remote.push_event(MediaEvent::Ended);
    player.pump();
    remote.push_event(MediaEvent::Ended);
    player.pump();

    assert_eq!(ends.load(Ordering::SeqCst), 1);
    assert_eq!(player.state(), PlaybackState::Idle);
    assert_eq!(player.current_time(), 0.0);
    assert!(!player.is_playing());
}

fn recording_sink(calls: Arc<Mutex<Vec<String>>>) -> Box<dyn PlayCountSink> {
    Box::new(
        move |track_id: &str, _share: Option<&str>| -> Result<(), PlayCountError> {
            calls.lock().unwrap().push(track_id.to_string());
            Ok(())
        },
    )
}

#[test]
fn listening_past_threshold_counts_one_play() {
    let (mut player, remote, _clock) = player_with(PlayerConfig::default());
    let calls = Arc::new(Mutex::new(Vec::new()));
    player.set_play_count_sink(recording_sink(calls.clone()));
    player.set_source(Some("song-a.mp3"));
    player.set_track_identity(Some(TrackIdentity::new("track-1", None)));
    player.play().unwrap();
    player.pump();

    remote.set_live_time(2.5);
    player.pause();
    player.pump();

    assert_eq!(calls.lock().unwrap().as_slice(), ["track-1".to_string()]);
    assert_eq!(player.plays_counted(), 1);
}

#[test]
fn short_listen_is_not_counted() {
    let (mut player, remote, _clock) = player_with(PlayerConfig::default());
    let calls = Arc::new(Mutex::new(Vec::new()));
    player.set_play_count_sink(recording_sink(calls.clone()));
    player.set_source(Some("song-a.mp3"));
    player.set_track_identity(Some(TrackIdentity::new("track-1", None)));
    player.play().unwrap();
    player.pump();

    remote.set_live_time(1.5);
    player.pause();
    assert!(calls.lock().unwrap().is_empty());
}

#[test]
fn play_count_failure_does_not_disturb_playback() {
    let (mut player, remote, _clock) = player_with(PlayerConfig::default());
    player.set_play_count_sink(Box::new(
        |_: &str, _: Option<&str>| -> Result<(), PlayCountError> { Err(PlayCountError::Unavailable) },
    ));
    player.set_source(Some("song-a.mp3"));
    player.set_track_identity(Some(TrackIdentity::new("track-1", None)));
    player.play().unwrap();
    player.pump();
    remote.set_live_time(30.0);
    player.pause();

    assert_eq!(player.play_count_failures(), 1);
    assert_eq!(player.last_play_count_error(), Some(&PlayCountError::Unavailable));
    assert_eq!(player.state(), PlaybackState::Paused);
}

#[test]
fn cross_origin_source_plays_without_analysis() {
    let (mut player, remote, _clock) = player_with(PlayerConfig::default());
    remote.fail_tap(TapError::CrossOrigin("no CORS headers".into()));
    player.set_source(Some("https://cdn.example/song-a.mp3"));
    player.play().unwrap();
    player.pump();
    remote.push_event(MediaEvent::CanPlay);
    player.pump();

    assert_eq!(player.state(), PlaybackState::Playing);
    assert_eq!(remote.tap_attempts(), 1);
    let snapshot = player.snapshot();
    assert!(snapshot.cors_issue_detected);
    assert!(!snapshot.analysis_ready);
}

#[test]
fn analysis_waits_for_user_gesture() {
    let (mut player, remote, _clock) = player_with(PlayerConfig::default());
    player.set_source(Some("song-a.mp3"));
    remote.push_event(MediaEvent::CanPlay);
    player.pump();
    assert_eq!(remote.tap_attempts(), 0);

    player.play().unwrap();
    player.pump();
    assert_eq!(remote.tap_attempts(), 1);
    assert!(player.analysis_taps().is_some());
}

#[test]
fn non_finite_duration_shows_placeholder_then_repolls() {
    let (mut player, remote, clock) = player_with(PlayerConfig::default());
    player.set_source(Some("stream.mp3"));
    remote.set_live_duration(f64::INFINITY);
    remote.push_event(MediaEvent::LoadedMetadata);
    player.pump();
    assert_eq!(player.duration(), MediaDuration::Placeholder);
    assert_eq!(player.duration().display_secs(), 180.0);

    remote.set_live_duration(200.0);
    clock.advance(500);
    player.pump();
    assert_eq!(player.duration(), MediaDuration::Known(200.0));
}

#[test]
fn placeholder_stays_when_repoll_fails() {
    let (mut player, remote, clock) = player_with(PlayerConfig::default());
    player.set_source(Some("stream.mp3"));
    remote.push_event(MediaEvent::LoadedMetadata);
    player.pump();
    remote.push_event(MediaEvent::DurationChange);
    player.pump();
    clock.advance(2_000);
    player.pump();
    assert_eq!(player.duration(), MediaDuration::Placeholder);
}

#[test]
fn state_follows_latest_intent() {
    let (mut player, remote, _clock) = player_with(PlayerConfig::default());
    player.set_source(Some("song-a.mp3"));
    remote.push_event(MediaEvent::CanPlay);
    player.pump();

    let mut intent_play = false;
    for step in 0..24 {
        player.toggle_play_pause().unwrap();
        intent_play = !intent_play;
        if step % 3 != 1 {
            player.pump();
        }
        assert_eq!(player.state().is_active(), intent_play, "step {}", step);
        assert!(!player.is_playing() || player.state().is_active());
    }
}

#[test]
fn unmute_at_zero_restores_last_volume() {
    let (mut player, remote, _clock) = player_with(PlayerConfig::default());
    assert_eq!(player.volume(), 0.8);
    player.set_volume(0.5);
    player.set_volume(0.0);
    assert!(player.is_muted());
    assert!(remote.muted());
    player.toggle_mute();
    assert!(!player.is_muted());
    assert_eq!(player.volume(), 0.5);
    assert_eq!(remote.volume(), 0.5);
}

#[test]
fn clearing_source_returns_to_idle() {
    let (mut player, remote, _clock) = playing_player(PlayerConfig::default());
    player.set_source(None);
    assert_eq!(player.state(), PlaybackState::Idle);
    assert!(!player.is_playing());
    assert!(player.play().is_err());
    assert_eq!(remote.loads().len(), 1);
}
