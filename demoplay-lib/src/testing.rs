//! Scripted media element for driving a [`crate::playback::Player`] without audio hardware.
//!
//! The element keeps its live values in shared state so a test can move the
//! "real" playhead, queue native events and inspect what the player asked
//! for through an [`ElementRemote`] after handing the element over.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::analysis::SampleTap;
use crate::playback::{MediaElement, MediaEvent, PlayError, TapError};

#[derive(Debug)]
struct ScriptedState {
    source: Option<String>,
    paused: bool,
    ended: bool,
    current_time: f64,
    duration: f64,
    volume: f32,
    muted: bool,
    events: VecDeque<MediaEvent>,
    next_play_error: Option<PlayError>,
    tap_error: Option<TapError>,
    auto_events: bool,
    loads: Vec<Option<String>>,
    play_calls: usize,
    pause_calls: usize,
    tap_attempts: usize,
    tap: Option<SampleTap>,
}

impl Default for ScriptedState {
    fn default() -> Self {
        Self {
            source: None,
            paused: true,
            ended: false,
            current_time: 0.0,
            duration: f64::NAN,
            volume: 1.0,
            muted: false,
            events: VecDeque::new(),
            next_play_error: None,
            tap_error: None,
            auto_events: true,
            loads: Vec::new(),
            play_calls: 0,
            pause_calls: 0,
            tap_attempts: 0,
            tap: None,
        }
    }
}

/// [`MediaElement`] whose behaviour is scripted through an [`ElementRemote`].
///
/// With auto events on (the default) `play` queues `Play` and `Playing`,
/// `pause` queues `Pause` and seeking queues `Seeking` and `Seeked`.
/// Loading never emits anything on its own.
pub struct ScriptedElement {
    source: Option<String>,
    state: Arc<Mutex<ScriptedState>>,
}

/// Handle for scripting and inspecting a [`ScriptedElement`].
#[derive(Clone)]
pub struct ElementRemote {
    state: Arc<Mutex<ScriptedState>>,
}

impl ScriptedElement {
    pub fn new() -> (Self, ElementRemote) {
        let state = Arc::new(Mutex::new(ScriptedState::default()));
        (
            Self {
                source: None,
                state: state.clone(),
            },
            ElementRemote { state },
        )
    }
}

impl MediaElement for ScriptedElement {
    fn set_source(&mut self, url: &str) {
        self.source = Some(url.to_string());
        let mut state = self.state.lock().unwrap();
        state.source = Some(url.to_string());
        state.paused = true;
        state.ended = false;
        state.current_time = 0.0;
        state.events.clear();
    }

    fn clear_source(&mut self) {
        self.source = None;
        let mut state = self.state.lock().unwrap();
        state.source = None;
        state.paused = true;
        state.ended = false;
        state.current_time = 0.0;
        state.events.clear();
    }

    fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn load(&mut self) {
        let mut state = self.state.lock().unwrap();
        let source = state.source.clone();
        state.loads.push(source);
    }

    fn play(&mut self) -> Result<(), PlayError> {
        let mut state = self.state.lock().unwrap();
        state.play_calls += 1;
        if let Some(err) = state.next_play_error.take() {
            return Err(err);
        }
        state.paused = false;
        state.ended = false;
        if state.auto_events {
            state.events.push_back(MediaEvent::Play);
            state.events.push_back(MediaEvent::Playing);
        }
        Ok(())
    }

    fn pause(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.pause_calls += 1;
        let was_playing = !state.paused;
        state.paused = true;
        if state.auto_events && was_playing {
            state.events.push_back(MediaEvent::Pause);
        }
    }

    fn paused(&self) -> bool {
        self.state.lock().unwrap().paused
    }

    fn ended(&self) -> bool {
        self.state.lock().unwrap().ended
    }

    fn current_time(&self) -> f64 {
        self.state.lock().unwrap().current_time
    }

    fn set_current_time(&mut self, time: f64) {
        let mut state = self.state.lock().unwrap();
        state.current_time = time;
        if state.auto_events && state.source.is_some() {
            state.events.push_back(MediaEvent::Seeking);
            state.events.push_back(MediaEvent::Seeked);
        }
    }

    fn duration(&self) -> f64 {
        self.state.lock().unwrap().duration
    }

    fn set_volume(&mut self, volume: f32) {
        self.state.lock().unwrap().volume = volume;
    }

    fn set_muted(&mut self, muted: bool) {
        self.state.lock().unwrap().muted = muted;
    }

    fn poll_events(&mut self) -> Vec<MediaEvent> {
        self.state.lock().unwrap().events.drain(..).collect()
    }

    fn open_tap(&mut self) -> Result<SampleTap, TapError> {
        let mut state = self.state.lock().unwrap();
        state.tap_attempts += 1;
        if let Some(err) = state.tap_error.clone() {
            return Err(err);
        }
        let tap = state
            .tap
            .get_or_insert_with(|| SampleTap::new(2, crate::constants::SAMPLE_RATE))
            .clone();
        tap.attach();
        Ok(tap)
    }
}

impl ElementRemote {
    /// Queue a native event for the next poll.
    pub fn push_event(&self, event: MediaEvent) {
        self.state.lock().unwrap().events.push_back(event);
    }

    /// Move the live playhead without emitting anything.
    pub fn set_live_time(&self, time: f64) {
        self.state.lock().unwrap().current_time = time;
    }

    pub fn set_live_duration(&self, duration: f64) {
        self.state.lock().unwrap().duration = duration;
    }

    pub fn set_paused(&self, paused: bool) {
        self.state.lock().unwrap().paused = paused;
    }

    pub fn set_ended(&self, ended: bool) {
        let mut state = self.state.lock().unwrap();
        state.ended = ended;
        if ended {
            state.paused = true;
        }
    }

    /// Reject the next `play()` call.
    pub fn reject_next_play(&self, err: PlayError) {
        self.state.lock().unwrap().next_play_error = Some(err);
    }

    /// Make every `open_tap()` fail with `err`.
    pub fn fail_tap(&self, err: TapError) {
        self.state.lock().unwrap().tap_error = Some(err);
    }

    pub fn set_auto_events(&self, enabled: bool) {
        self.state.lock().unwrap().auto_events = enabled;
    }

    /// Sources passed to `load()`, in order.
    pub fn loads(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().loads.clone()
    }

    pub fn play_calls(&self) -> usize {
        self.state.lock().unwrap().play_calls
    }

    pub fn pause_calls(&self) -> usize {
        self.state.lock().unwrap().pause_calls
    }

    pub fn tap_attempts(&self) -> usize {
        self.state.lock().unwrap().tap_attempts
    }

    pub fn tap(&self) -> Option<SampleTap> {
        self.state.lock().unwrap().tap.clone()
    }

    pub fn volume(&self) -> f32 {
        self.state.lock().unwrap().volume
    }

    pub fn muted(&self) -> bool {
        self.state.lock().unwrap().muted
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().unwrap().paused
    }

    pub fn live_time(&self) -> f64 {
        self.state.lock().unwrap().current_time
    }
}
