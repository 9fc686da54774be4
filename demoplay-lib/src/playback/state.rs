//! Canonical playback values.
//!
//! [`PlaybackStore`] holds the fields a UI renders and nothing else. Readers
//! are public; mutators are crate-private so only the session binder and the
//! controls on [`super::Player`] can move the state machine.

use std::fmt::{Display, Formatter};

use crate::constants::{DEFAULT_VOLUME, PLACEHOLDER_DURATION_SECS};

/// High-level playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Paused,
    Error,
}

impl PlaybackState {
    /// `true` for the states in which playback is being attempted.
    pub fn is_active(self) -> bool {
        matches!(self, PlaybackState::Loading | PlaybackState::Playing)
    }
}

impl Display for PlaybackState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Loading => "loading",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Error => "error",
        };
        f.write_str(label)
    }
}

/// Track duration as known to the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaDuration {
    /// Nothing reported yet.
    Unknown,
    /// The backend reported a non-finite value; a stand-in is displayed.
    Placeholder,
    Known(f64),
}

impl MediaDuration {
    /// Build from a raw backend value, rejecting non-finite and non-positive input.
    pub fn from_reported(value: f64) -> Option<Self> {
        if value.is_finite() && value > 0.0 {
            Some(MediaDuration::Known(value))
        } else {
            None
        }
    }

    /// Finite duration, if the real value has arrived.
    pub fn known(self) -> Option<f64> {
        match self {
            MediaDuration::Known(value) => Some(value),
            _ => None,
        }
    }

    /// Seconds to show in a UI.
    pub fn display_secs(self) -> f64 {
        match self {
            MediaDuration::Unknown => 0.0,
            MediaDuration::Placeholder => PLACEHOLDER_DURATION_SECS,
            MediaDuration::Known(value) => value,
        }
    }
}

/// Category of a condition surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    /// Playback needs a user gesture; clicking play again recovers.
    AutoplayBlocked,
    /// The source cannot be decoded; retrying will not help.
    FormatUnsupported,
    /// Automatic retries were exhausted.
    LoadFailed,
    Unknown,
}

/// User-facing condition reported through the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackIssue {
    pub kind: IssueKind,
    pub message: String,
}

impl PlaybackIssue {
    pub fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Mutable playback values shared by the binder, controls and readers.
#[derive(Debug, Clone)]
pub struct PlaybackStore {
    state: PlaybackState,
    is_playing: bool,
    current_time: f64,
    duration: MediaDuration,
    volume: f32,
    muted: bool,
    retries: u32,
    buffering: bool,
    issue: Option<PlaybackIssue>,
    source: Option<String>,
}

impl Default for PlaybackStore {
    fn default() -> Self {
        Self::new(DEFAULT_VOLUME)
    }
}

impl PlaybackStore {
    pub fn new(volume: f32) -> Self {
        let volume = sanitize_volume(volume);
        Self {
            state: PlaybackState::Idle,
            is_playing: false,
            current_time: 0.0,
            duration: MediaDuration::Unknown,
            volume,
            muted: volume == 0.0,
            retries: 0,
            buffering: false,
            issue: None,
            source: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn duration(&self) -> MediaDuration {
        self.duration
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Whether a buffering indicator should be shown.
    pub fn is_buffering(&self) -> bool {
        self.buffering
    }

    pub fn issue(&self) -> Option<&PlaybackIssue> {
        self.issue.as_ref()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Move to `state`. Leaving the active states always clears `is_playing`.
    pub(crate) fn set_state(&mut self, state: PlaybackState) {
        self.state = state;
        if !state.is_active() {
            self.is_playing = false;
            self.buffering = false;
        }
    }

    /// Set the playing flag. Ignored when the state cannot be playing.
    pub(crate) fn set_playing(&mut self, playing: bool) {
        self.is_playing = playing && self.state.is_active();
    }

    /// Write the transport position, clamped against a known duration.
    pub(crate) fn set_current_time(&mut self, time: f64) {
        self.current_time = clamp_time(time, self.duration);
    }

    pub(crate) fn set_duration(&mut self, duration: MediaDuration) {
        self.duration = duration;
        if let Some(max) = duration.known() {
            self.current_time = self.current_time.min(max);
        }
    }

    /// Set volume and mute together so `volume == 0` always implies muted.
    pub(crate) fn set_volume_and_mute(&mut self, volume: f32, muted: bool) {
        self.volume = sanitize_volume(volume);
        self.muted = muted || self.volume == 0.0;
    }

    pub(crate) fn set_retries(&mut self, retries: u32) {
        self.retries = retries;
    }

    pub(crate) fn set_buffering(&mut self, buffering: bool) {
        self.buffering = buffering && self.state.is_active();
    }

    pub(crate) fn set_issue(&mut self, issue: Option<PlaybackIssue>) {
        self.issue = issue;
    }

    pub(crate) fn set_source(&mut self, source: Option<String>) {
        self.source = source;
    }

    /// Reset transport fields for a new source.
    pub(crate) fn reset_transport(&mut self) {
        self.current_time = 0.0;
        self.duration = MediaDuration::Unknown;
        self.retries = 0;
        self.buffering = false;
        self.issue = None;
    }
}

/// Clamp a position to `[0, duration]`, or to `[0, inf)` while the duration is not known.
pub fn clamp_time(time: f64, duration: MediaDuration) -> f64 {
    let time = if time.is_finite() { time.max(0.0) } else { 0.0 };
    match duration.known() {
        Some(max) => time.min(max),
        None => time,
    }
}

fn sanitize_volume(volume: f32) -> f32 {
    if volume.is_finite() {
        volume.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaving_active_state_clears_playing() {
        let mut store = PlaybackStore::default();
        store.set_state(PlaybackState::Loading);
        store.set_playing(true);
        assert!(store.is_playing());
        store.set_state(PlaybackState::Paused);
        assert!(!store.is_playing());
        store.set_playing(true);
        assert!(!store.is_playing());
    }

    #[test]
    fn time_clamps_to_known_duration() {
        let mut store = PlaybackStore::default();
        store.set_current_time(500.0);
        assert_eq!(store.current_time(), 500.0);
        store.set_duration(MediaDuration::Known(120.0));
        assert_eq!(store.current_time(), 120.0);
        store.set_current_time(-3.0);
        assert_eq!(store.current_time(), 0.0);
        store.set_current_time(f64::NAN);
        assert_eq!(store.current_time(), 0.0);
    }

    #[test]
    fn zero_volume_is_muted() {
        let mut store = PlaybackStore::default();
        store.set_volume_and_mute(0.0, false);
        assert!(store.is_muted());
        store.set_volume_and_mute(1.7, false);
        assert_eq!(store.volume(), 1.0);
        assert!(!store.is_muted());
    }

    #[test]
    fn non_finite_durations_are_rejected() {
        assert_eq!(MediaDuration::from_reported(f64::INFINITY), None);
        assert_eq!(MediaDuration::from_reported(f64::NAN), None);
        assert_eq!(MediaDuration::from_reported(0.0), None);
        assert_eq!(
            MediaDuration::from_reported(42.5),
            Some(MediaDuration::Known(42.5))
        );
        assert_eq!(MediaDuration::Placeholder.display_secs(), 180.0);
    }
}
