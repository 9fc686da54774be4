//! High-level playback controller.

mod controls;

use std::sync::Arc;

use log::{debug, info};

use crate::analysis::{AnalysisContext, AnalyserOptions, AnalysisTaps, InitOutcome};
use crate::clock::{Clock, SystemClock};

use super::binder::{BinderContext, MediaSessionBinder, Transition};
use super::config::PlayerConfig;
use super::media::{MediaElement, MediaEvent};
use super::play_count::{LogSink, PlayCountError, PlayCountSink, PlayCountTracker, TrackIdentity};
use super::state::{MediaDuration, PlaybackIssue, PlaybackState, PlaybackStore};
use super::tasks::TaskQueue;
use super::timing::TimingState;
use super::visibility::{VisibilityAction, VisibilityCoordinator, VisibilitySignal};

/// Point-in-time copy of everything a UI renders.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub state: PlaybackState,
    pub is_playing: bool,
    pub current_time: f64,
    pub duration: MediaDuration,
    pub volume: f32,
    pub muted: bool,
    pub buffering: bool,
    pub retries: u32,
    pub issue: Option<PlaybackIssue>,
    pub source: Option<String>,
    pub analysis_ready: bool,
    pub cors_issue_detected: bool,
}

/// Playback controller bound to one media element.
///
/// The player is driven from a single thread: controls and [`Player::pump`]
/// take `&mut self`, so transitions never interleave. Timers scheduled by the
/// state machine run from `pump` once the clock passes their due time.
pub struct Player {
    config: PlayerConfig,
    clock: Arc<dyn Clock>,
    element: Box<dyn MediaElement>,
    store: PlaybackStore,
    timing: TimingState,
    tasks: TaskQueue,
    binder: MediaSessionBinder,
    visibility: VisibilityCoordinator,
    tracker: PlayCountTracker,
    analysis: AnalysisContext,
    identity: Option<TrackIdentity>,
    on_track_end: Option<Box<dyn FnMut()>>,
    last_audible_volume: f32,
}

impl Player {
    /// Create a player on the system clock.
    pub fn new(element: Box<dyn MediaElement>, config: PlayerConfig) -> Self {
        Self::with_clock(element, config, Arc::new(SystemClock::new()))
    }

    /// Create a player with an explicit time source.
    pub fn with_clock(
        element: Box<dyn MediaElement>,
        config: PlayerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = config.sanitized();
        let store = PlaybackStore::new(config.initial_volume);
        let last_audible_volume = if store.volume() > 0.0 {
            store.volume()
        } else {
            crate::constants::DEFAULT_VOLUME
        };
        let mut player = Self {
            timing: TimingState::new(config.suppression_window_ms),
            tasks: TaskQueue::new(),
            binder: MediaSessionBinder::new(&config),
            visibility: VisibilityCoordinator::new(),
            tracker: PlayCountTracker::new(config.min_counted_play_secs, Box::new(LogSink)),
            analysis: AnalysisContext::new(AnalyserOptions::default()),
            identity: None,
            on_track_end: None,
            last_audible_volume,
            config,
            clock,
            element,
            store,
        };
        player.sync_volume();
        player
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn store(&self) -> &PlaybackStore {
        &self.store
    }

    pub fn state(&self) -> PlaybackState {
        self.store.state()
    }

    pub fn is_playing(&self) -> bool {
        self.store.is_playing()
    }

    pub fn current_time(&self) -> f64 {
        self.store.current_time()
    }

    pub fn duration(&self) -> MediaDuration {
        self.store.duration()
    }

    pub fn element(&self) -> &dyn MediaElement {
        self.element.as_ref()
    }

    /// Copy the renderable state.
    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            state: self.store.state(),
            is_playing: self.store.is_playing(),
            current_time: self.store.current_time(),
            duration: self.store.duration(),
            volume: self.store.volume(),
            muted: self.store.is_muted(),
            buffering: self.store.is_buffering(),
            retries: self.store.retries(),
            issue: self.store.issue().cloned(),
            source: self.store.source().map(str::to_string),
            analysis_ready: self.analysis.is_initialized(),
            cors_issue_detected: self.analysis.cors_issue_detected(),
        }
    }

    /// Switch to a new source, or clear it with `None`.
    ///
    /// The open listening session is closed first, and every timer scheduled
    /// for the previous source is cancelled. Play intent survives the switch.
    pub fn set_source(&mut self, url: Option<&str>) {
        let position = self.element.current_time();
        self.tracker.end_tracking(position);
        let now_ms = self.clock.now_ms();
        let mut ctx = BinderContext {
            store: &mut self.store,
            element: self.element.as_mut(),
            tasks: &mut self.tasks,
            timing: &mut self.timing,
            now_ms,
        };
        self.binder.load_source(&mut ctx, url);
        self.binder.sync_volume(&mut ctx);
    }

    /// Attach the track identity used for play counting.
    pub fn set_track_identity(&mut self, identity: Option<TrackIdentity>) {
        if self.identity != identity {
            let position = self.element.current_time();
            self.tracker.end_tracking(position);
        }
        self.identity = identity;
    }

    pub fn set_play_count_sink(&mut self, sink: Box<dyn PlayCountSink>) {
        self.tracker.set_sink(sink);
    }

    pub fn play_count_failures(&self) -> u64 {
        self.tracker.failures()
    }

    pub fn last_play_count_error(&self) -> Option<&PlayCountError> {
        self.tracker.last_error()
    }

    pub fn plays_counted(&self) -> u64 {
        self.tracker.counted()
    }

    /// Register the callback fired once per natural end of a track.
    pub fn set_on_track_end(&mut self, callback: impl FnMut() + 'static) {
        self.on_track_end = Some(Box::new(callback));
    }

    /// Drain element events and run due timers.
    pub fn pump(&mut self) {
        self.drain_events();
        self.run_due_tasks();
    }

    /// Apply one native event.
    pub fn handle_event(&mut self, event: MediaEvent) {
        let position_before = self.store.current_time();
        let now_ms = self.clock.now_ms();
        let transition = {
            let mut ctx = BinderContext {
                store: &mut self.store,
                element: self.element.as_mut(),
                tasks: &mut self.tasks,
                timing: &mut self.timing,
                now_ms,
            };
            self.binder.handle_event(&mut ctx, &event)
        };
        if matches!(event, MediaEvent::Play | MediaEvent::CanPlay) {
            self.trigger_analysis();
        }
        if let Some(transition) = transition {
            self.apply_transition(transition, position_before);
        }
    }

    fn drain_events(&mut self) {
        for event in self.element.poll_events() {
            self.handle_event(event);
        }
    }

    fn run_due_tasks(&mut self) {
        let now_ms = self.clock.now_ms();
        for task in self.tasks.take_due(now_ms) {
            let position_before = self.store.current_time();
            let transition = {
                let mut ctx = BinderContext {
                    store: &mut self.store,
                    element: self.element.as_mut(),
                    tasks: &mut self.tasks,
                    timing: &mut self.timing,
                    now_ms,
                };
                self.binder.run_task(&mut ctx, task)
            };
            if let Some(transition) = transition {
                self.apply_transition(transition, position_before);
            }
        }
    }

    fn apply_transition(&mut self, transition: Transition, position_before: f64) {
        match transition {
            Transition::StartedPlaying => {
                if let Some(identity) = &self.identity {
                    self.tracker
                        .start_tracking(identity, self.element.current_time());
                }
            }
            Transition::Paused => {
                self.tracker.end_tracking(self.element.current_time());
            }
            Transition::Ended => {
                let position = self
                    .store
                    .duration()
                    .known()
                    .unwrap_or(position_before)
                    .max(position_before);
                self.tracker.track_end_of_play(position);
                info!("track ended");
                if let Some(callback) = self.on_track_end.as_mut() {
                    callback();
                }
            }
            Transition::Failed => self.tracker.cancel_tracking(),
        }
    }

    /// Feed a host visibility signal.
    pub fn on_visibility(&mut self, signal: VisibilitySignal) {
        match self.visibility.process(signal) {
            VisibilityAction::None => {}
            VisibilityAction::Hide => {
                if !self.config.allow_background_playback && self.binder.wants_play() {
                    debug!("hidden without background playback; pausing");
                    self.pause();
                }
            }
            VisibilityAction::Resync => {
                self.drain_events();
                self.resync_from_element(true);
            }
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.visibility.is_hidden()
    }

    /// Number of visibility restores that resynced the store.
    pub fn visibility_resyncs(&self) -> u64 {
        self.visibility.resync_count()
    }

    fn resync_from_element(&mut self, mark_restore: bool) {
        let position_before = self.store.current_time();
        let now_ms = self.clock.now_ms();
        let transition = {
            let mut ctx = BinderContext {
                store: &mut self.store,
                element: self.element.as_mut(),
                tasks: &mut self.tasks,
                timing: &mut self.timing,
                now_ms,
            };
            self.visibility
                .resync(&mut self.binder, &mut ctx, mark_restore)
        };
        if let Some(transition) = transition {
            self.apply_transition(transition, position_before);
        }
    }

    fn sync_volume(&mut self) {
        let mut ctx = BinderContext {
            store: &mut self.store,
            element: self.element.as_mut(),
            tasks: &mut self.tasks,
            timing: &mut self.timing,
            now_ms: 0,
        };
        self.binder.sync_volume(&mut ctx);
    }

    fn trigger_analysis(&mut self) {
        let outcome = self.analysis.on_trigger(self.element.as_mut());
        if outcome == InitOutcome::Initialized {
            debug!("analysis graph attached");
        }
    }

    /// Build the analysis graph now, without waiting for a user gesture.
    pub fn initialize_analysis(&mut self) -> InitOutcome {
        self.analysis.initialize(self.element.as_mut())
    }

    /// Analyser handles, once the graph exists.
    pub fn analysis_taps(&self) -> Option<AnalysisTaps> {
        self.analysis.taps()
    }

    pub fn analysis(&self) -> &AnalysisContext {
        &self.analysis
    }

    pub fn analysis_mut(&mut self) -> &mut AnalysisContext {
        &mut self.analysis
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        let position = self.element.current_time();
        self.tracker.end_tracking(position);
        self.analysis.teardown();
    }
}

#[cfg(test)]
mod tests;
