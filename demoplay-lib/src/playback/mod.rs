//! Playback state machine, media backends and listening sessions.

mod binder;
mod config;
pub mod media;
mod play_count;
mod player;
mod rodio_element;
pub mod state;
mod tasks;
mod timing;
mod visibility;

pub use config::{ConfigError, PlayerConfig};
pub use media::{MediaElement, MediaErrorCode, MediaEvent, PlayError, PlayErrorKind, TapError};
pub use play_count::{
    LogSink, PlayCountError, PlayCountSink, PlayCountTracker, SessionOutcome, TrackIdentity,
};
pub use player::{Player, PlayerSnapshot};
pub use rodio_element::{RodioElement, TapSource};
pub use state::{clamp_time, IssueKind, MediaDuration, PlaybackIssue, PlaybackState, PlaybackStore};
pub use tasks::{ScheduledTask, TaskKind, TaskQueue};
pub use timing::TimingState;
pub use visibility::VisibilitySignal;
