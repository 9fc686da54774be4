//! Listening sessions and play-count reporting.

use std::fmt::{Display, Formatter};

use log::{debug, info, warn};

/// Track identity attached to a source for play counting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackIdentity {
    pub track_id: String,
    /// Present when the track was opened through a share link.
    pub share_key: Option<String>,
}

impl TrackIdentity {
    pub fn new(track_id: impl Into<String>, share_key: Option<String>) -> Self {
        Self {
            track_id: track_id.into(),
            share_key,
        }
    }
}

/// Failure reported by a [`PlayCountSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayCountError {
    /// The counter service rejected or failed the call.
    Rpc(String),
    Unavailable,
}

impl Display for PlayCountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayCountError::Rpc(message) => write!(f, "play count call failed: {}", message),
            PlayCountError::Unavailable => f.write_str("play count service unavailable"),
        }
    }
}

impl std::error::Error for PlayCountError {}

/// Destination for counted plays.
pub trait PlayCountSink {
    fn increment(&mut self, track_id: &str, share_key: Option<&str>) -> Result<(), PlayCountError>;
}

impl<F> PlayCountSink for F
where
    F: FnMut(&str, Option<&str>) -> Result<(), PlayCountError>,
{
    fn increment(&mut self, track_id: &str, share_key: Option<&str>) -> Result<(), PlayCountError> {
        self(track_id, share_key)
    }
}

/// Sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl PlayCountSink for LogSink {
    fn increment(&mut self, track_id: &str, share_key: Option<&str>) -> Result<(), PlayCountError> {
        info!(
            "play counted for {}{}",
            track_id,
            share_key.map(|key| format!(" (share {})", key)).unwrap_or_default()
        );
        Ok(())
    }
}

/// Result of closing a listening session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    NoSession,
    /// Shorter than the counting threshold.
    Discarded,
    Counted,
    /// Long enough, but the sink failed.
    FlushFailed,
}

#[derive(Debug, Clone)]
struct Session {
    identity: TrackIdentity,
    started_at: f64,
}

/// Counts a play once per session that lasts past the threshold.
pub struct PlayCountTracker {
    min_secs: f64,
    sink: Box<dyn PlayCountSink>,
    session: Option<Session>,
    counted: u64,
    failures: u64,
    last_error: Option<PlayCountError>,
}

impl PlayCountTracker {
    pub fn new(min_secs: f64, sink: Box<dyn PlayCountSink>) -> Self {
        Self {
            min_secs,
            sink,
            session: None,
            counted: 0,
            failures: 0,
            last_error: None,
        }
    }

    pub fn set_sink(&mut self, sink: Box<dyn PlayCountSink>) {
        self.sink = sink;
    }

    /// Open a session at media time `position`.
    ///
    /// An unflushed session is dropped without being counted.
    pub fn start_tracking(&mut self, identity: &TrackIdentity, position: f64) {
        if let Some(previous) = self.session.take() {
            debug!(
                "dropping unflushed session for {} started at {:.2}s",
                previous.identity.track_id, previous.started_at
            );
        }
        debug!(
            "listening session for {} starts at {:.2}s",
            identity.track_id, position
        );
        self.session = Some(Session {
            identity: identity.clone(),
            started_at: position,
        });
    }

    /// Close the session at media time `position`, counting it if long enough.
    pub fn end_tracking(&mut self, position: f64) -> SessionOutcome {
        let Some(session) = self.session.take() else {
            return SessionOutcome::NoSession;
        };
        let listened = position - session.started_at;
        if listened.is_nan() || listened <= self.min_secs {
            debug!(
                "session for {} too short ({:.2}s); not counted",
                session.identity.track_id, listened
            );
            return SessionOutcome::Discarded;
        }
        match self.sink.increment(
            &session.identity.track_id,
            session.identity.share_key.as_deref(),
        ) {
            Ok(()) => {
                self.counted += 1;
                SessionOutcome::Counted
            }
            Err(err) => {
                warn!(
                    "failed to count play for {}: {}",
                    session.identity.track_id, err
                );
                self.failures += 1;
                self.last_error = Some(err);
                SessionOutcome::FlushFailed
            }
        }
    }

    /// Flush at natural end of the track.
    pub fn track_end_of_play(&mut self, position: f64) -> SessionOutcome {
        self.end_tracking(position)
    }

    /// Drop the session without counting.
    pub fn cancel_tracking(&mut self) {
        self.session = None;
    }

    pub fn is_tracking(&self) -> bool {
        self.session.is_some()
    }

    pub fn counted(&self) -> u64 {
        self.counted
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn last_error(&self) -> Option<&PlayCountError> {
        self.last_error.as_ref()
    }
}

impl std::fmt::Debug for PlayCountTracker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayCountTracker")
            .field("min_secs", &self.min_secs)
            .field("session", &self.session)
            .field("counted", &self.counted)
            .field("failures", &self.failures)
            .finish()
    }
}
