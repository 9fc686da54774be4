use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use demoplay_lib::playback::{MediaDuration, PlaybackState, PlayerSnapshot, VisibilitySignal};
use demoplay_lib::visualizer::VisualizerKind;

const SEEK_STEP_SECS: f64 = 5.0;
const VOLUME_STEP: f32 = 0.05;

pub struct StatusSnapshot {
    pub text: String,
}

pub struct StatusArgs<'a> {
    pub snapshot: &'a PlayerSnapshot,
    pub track_name: &'a str,
    pub track_index: usize,
    pub track_count: usize,
    pub visualizer: VisualizerKind,
    pub plays_counted: u64,
}

pub fn status_text(args: StatusArgs<'_>) -> StatusSnapshot {
    let snapshot = args.snapshot;
    let state = match snapshot.state {
        PlaybackState::Playing => "▶ Playing",
        PlaybackState::Loading => "… Loading",
        PlaybackState::Paused => "⏸ Paused",
        PlaybackState::Idle => "■ Stopped",
        PlaybackState::Error => "✖ Error",
    };
    let duration = snapshot.duration.display_secs();
    let approx = if snapshot.duration == MediaDuration::Placeholder {
        "~"
    } else {
        ""
    };
    let percent = if duration > 0.0 {
        (snapshot.current_time / duration * 100.0).min(100.0)
    } else {
        0.0
    };
    let volume = if snapshot.muted {
        "muted".to_string()
    } else {
        format!("{:>3.0}%", snapshot.volume * 100.0)
    };
    let analysis = if snapshot.analysis_ready {
        "on"
    } else if snapshot.cors_issue_detected {
        "unavailable for this source"
    } else {
        "waiting"
    };

    let mut text = format!(
        "{}   {} / {}{}   ({:>5.1}%)\nTrack {}/{}: {}\nVolume: {} | Visualizer: {} | Analysis: {} | Plays: {}",
        state,
        format_time(snapshot.current_time),
        approx,
        format_time(duration),
        percent,
        args.track_index + 1,
        args.track_count,
        args.track_name,
        volume,
        args.visualizer,
        analysis,
        args.plays_counted,
    );
    if let Some(issue) = &snapshot.issue {
        text.push_str(&format!("\n{}", issue.message));
    } else if snapshot.retries > 0 {
        text.push_str(&format!("\nRetrying ({})", snapshot.retries));
    }

    StatusSnapshot { text }
}

/// What a key press asks the runner to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyAction {
    None,
    TogglePlay,
    SeekBy(f64),
    VolumeBy(f32),
    ToggleMute,
    NextVisualizer,
    NextTrack,
    Visibility(VisibilitySignal),
    Quit,
}

pub fn action_for_key(code: KeyCode) -> KeyAction {
    match code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => KeyAction::Quit,
        KeyCode::Char(' ') => KeyAction::TogglePlay,
        KeyCode::Left => KeyAction::SeekBy(-SEEK_STEP_SECS),
        KeyCode::Right => KeyAction::SeekBy(SEEK_STEP_SECS),
        KeyCode::Up => KeyAction::VolumeBy(VOLUME_STEP),
        KeyCode::Down => KeyAction::VolumeBy(-VOLUME_STEP),
        KeyCode::Char('m') | KeyCode::Char('M') => KeyAction::ToggleMute,
        KeyCode::Char('v') | KeyCode::Char('V') => KeyAction::NextVisualizer,
        KeyCode::Char('n') | KeyCode::Char('N') => KeyAction::NextTrack,
        _ => KeyAction::None,
    }
}

/// Wait up to `timeout` for input and translate it.
///
/// Terminal focus changes map onto visibility signals.
pub fn poll_action(timeout: Duration) -> KeyAction {
    if !event::poll(timeout).unwrap_or(false) {
        return KeyAction::None;
    }
    match event::read() {
        Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => action_for_key(key.code),
        Ok(Event::FocusLost) => KeyAction::Visibility(VisibilitySignal::Hidden),
        Ok(Event::FocusGained) => KeyAction::Visibility(VisibilitySignal::Visible),
        _ => KeyAction::None,
    }
}

pub fn format_time(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs.floor() as u64
    } else {
        0
    };
    let hours = total / 3_600;
    let minutes = (total / 60) % 60;
    let seconds = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
