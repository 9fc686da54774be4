//! Contract between the player and the underlying media backend.
//!
//! A [`MediaElement`] is the native playback object: it loads a source,
//! plays and pauses it, reports its live transport values and queues
//! lifecycle events for the player to drain. The player owns exactly one
//! element for its whole lifetime.

use std::fmt::{Display, Formatter};

use crate::analysis::SampleTap;

/// Native lifecycle signals emitted by a media element.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    LoadStart,
    LoadedMetadata,
    DurationChange,
    CanPlay,
    Play,
    Playing,
    Pause,
    Waiting,
    Stalled,
    TimeUpdate,
    Seeking,
    Seeked,
    Ended,
    Error(MediaErrorCode),
}

/// Failure category reported with a native error event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaErrorCode {
    /// Fetch aborted, usually because the source changed.
    Aborted,
    Network,
    Decode,
    /// The source or its format cannot be played at all.
    SrcNotSupported,
}

impl MediaErrorCode {
    /// Errors that retrying the same source cannot fix.
    pub fn is_terminal(self) -> bool {
        matches!(self, MediaErrorCode::SrcNotSupported)
    }
}

impl Display for MediaErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MediaErrorCode::Aborted => "aborted",
            MediaErrorCode::Network => "network error",
            MediaErrorCode::Decode => "decode error",
            MediaErrorCode::SrcNotSupported => "source not supported",
        };
        f.write_str(label)
    }
}

/// Why a `play()` request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayErrorKind {
    /// A user gesture is required before playback may start.
    AutoplayBlocked,
    FormatUnsupported,
    Unknown,
}

/// Rejection returned by [`MediaElement::play`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayError {
    pub kind: PlayErrorKind,
    pub detail: String,
}

impl PlayError {
    pub fn new(kind: PlayErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Message suitable for showing to a listener.
    pub fn user_message(&self) -> String {
        match self.kind {
            PlayErrorKind::AutoplayBlocked => "Click play to start playback".to_string(),
            PlayErrorKind::FormatUnsupported => {
                "This audio format is not supported on this device".to_string()
            }
            PlayErrorKind::Unknown => format!("Playback failed: {}", self.detail),
        }
    }
}

impl Display for PlayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            PlayErrorKind::AutoplayBlocked => write!(f, "autoplay blocked: {}", self.detail),
            PlayErrorKind::FormatUnsupported => write!(f, "format unsupported: {}", self.detail),
            PlayErrorKind::Unknown => write!(f, "play failed: {}", self.detail),
        }
    }
}

impl std::error::Error for PlayError {}

/// Failure to open a sample tap on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapError {
    /// The source is opaque to analysis (cross-origin without CORS headers).
    CrossOrigin(String),
    /// The backend does not expose samples.
    Unsupported,
    Other(String),
}

impl TapError {
    /// Recognize cross-origin failures, including ones reported only by message.
    pub fn is_cross_origin(&self) -> bool {
        match self {
            TapError::CrossOrigin(_) => true,
            TapError::Unsupported => false,
            TapError::Other(message) => {
                let lower = message.to_ascii_lowercase();
                lower.contains("cross-origin")
                    || lower.contains("cors")
                    || lower.contains("securityerror")
            }
        }
    }
}

impl Display for TapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TapError::CrossOrigin(message) => write!(f, "cross-origin source: {}", message),
            TapError::Unsupported => f.write_str("sample tap unsupported"),
            TapError::Other(message) => write!(f, "tap failed: {}", message),
        }
    }
}

impl std::error::Error for TapError {}

/// Native playback object driven by [`super::Player`].
pub trait MediaElement {
    /// Point the element at a new source without loading it.
    fn set_source(&mut self, url: &str);

    /// Detach the current source.
    fn clear_source(&mut self);

    /// Currently assigned source.
    fn source(&self) -> Option<&str>;

    /// Start (or restart) loading the current source.
    fn load(&mut self);

    fn play(&mut self) -> Result<(), PlayError>;

    fn pause(&mut self);

    fn paused(&self) -> bool;

    fn ended(&self) -> bool;

    /// Live position in seconds.
    fn current_time(&self) -> f64;

    fn set_current_time(&mut self, time: f64);

    /// Raw duration in seconds. May be `NaN` or infinite.
    fn duration(&self) -> f64;

    fn set_volume(&mut self, volume: f32);

    fn set_muted(&mut self, muted: bool);

    /// Drain events queued since the last call.
    fn poll_events(&mut self) -> Vec<MediaEvent>;

    /// Open a tap on the decoded samples of the current source.
    fn open_tap(&mut self) -> Result<SampleTap, TapError> {
        Err(TapError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_origin_detected_from_message() {
        assert!(TapError::CrossOrigin("x".into()).is_cross_origin());
        assert!(TapError::Other("SecurityError: media is tainted".into()).is_cross_origin());
        assert!(TapError::Other("blocked by CORS policy".into()).is_cross_origin());
        assert!(!TapError::Other("out of memory".into()).is_cross_origin());
        assert!(!TapError::Unsupported.is_cross_origin());
    }

    #[test]
    fn play_errors_have_distinct_messages() {
        let blocked = PlayError::new(PlayErrorKind::AutoplayBlocked, "NotAllowedError");
        let format = PlayError::new(PlayErrorKind::FormatUnsupported, "NotSupportedError");
        let other = PlayError::new(PlayErrorKind::Unknown, "device lost");
        assert_ne!(blocked.user_message(), format.user_message());
        assert!(other.user_message().contains("device lost"));
    }
}
