//! Translation of native media events into store transitions.
//!
//! The binder owns the retry policy, the non-finite duration re-poll and
//! the buffering episode bookkeeping. Timers it schedules are stamped with
//! the current source generation; switching sources bumps the generation
//! so callbacks belonging to an old URL become no-ops.

use log::{debug, info, warn};

use super::config::PlayerConfig;
use super::media::{MediaElement, MediaErrorCode, MediaEvent, PlayError, PlayErrorKind};
use super::state::{IssueKind, MediaDuration, PlaybackIssue, PlaybackState, PlaybackStore};
use super::tasks::{ScheduledTask, TaskKind, TaskQueue};
use super::timing::TimingState;

/// Borrowed view of everything a transition may touch.
pub(crate) struct BinderContext<'a> {
    pub store: &'a mut PlaybackStore,
    pub element: &'a mut dyn MediaElement,
    pub tasks: &'a mut TaskQueue,
    pub timing: &'a mut TimingState,
    pub now_ms: u64,
}

/// Transitions the player reacts to (play-count sessions, end callback).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    StartedPlaying,
    Paused,
    Ended,
    Failed,
}

#[derive(Debug)]
pub(crate) struct MediaSessionBinder {
    max_retries: u32,
    retry_delay_ms: u64,
    debounce_ms: u64,
    repoll_ms: u64,
    show_buffering_indicator: bool,
    generation: u64,
    attempt: u64,
    failed_attempt: Option<u64>,
    reload_in_flight: bool,
    wants_play: bool,
    duration_repolled: bool,
    end_reported: bool,
}

impl MediaSessionBinder {
    pub fn new(config: &PlayerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
            debounce_ms: config.buffering_debounce_ms,
            repoll_ms: config.duration_repoll_ms,
            show_buffering_indicator: config.show_buffering_indicator,
            generation: 0,
            attempt: 0,
            failed_attempt: None,
            reload_in_flight: false,
            wants_play: false,
            duration_repolled: false,
            end_reported: false,
        }
    }

    pub fn wants_play(&self) -> bool {
        self.wants_play
    }

    pub fn set_wants_play(&mut self, wants_play: bool) {
        self.wants_play = wants_play;
        if wants_play {
            self.end_reported = false;
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Switch to a new source (or none), cancelling everything tied to the old one.
    pub fn load_source(&mut self, ctx: &mut BinderContext<'_>, url: Option<&str>) {
        self.generation += 1;
        let generation = self.generation;
        ctx.tasks.cancel_where(|task| task.generation != generation);
        ctx.timing.clear_pending();
        ctx.store.reset_transport();
        self.failed_attempt = None;
        self.reload_in_flight = false;
        self.duration_repolled = false;
        self.end_reported = false;

        match url {
            Some(url) => {
                info!("loading source {} (generation {})", url, generation);
                ctx.element.set_source(url);
                ctx.store.set_source(Some(url.to_string()));
                self.begin_attempt(ctx);
                ctx.store.set_state(PlaybackState::Loading);
                ctx.store.set_playing(self.wants_play);
            }
            None => {
                info!("clearing source (generation {})", generation);
                ctx.element.clear_source();
                ctx.store.set_source(None);
                self.wants_play = false;
                ctx.store.set_state(PlaybackState::Idle);
            }
        }
    }

    /// Reload after a terminal error so a fresh play intent can try again.
    pub fn reload_after_error(&mut self, ctx: &mut BinderContext<'_>) {
        let generation = self.generation;
        ctx.tasks
            .cancel_where(|task| task.generation == generation && is_retry(task));
        self.failed_attempt = None;
        ctx.store.set_retries(0);
        ctx.store.set_issue(None);
        self.begin_attempt(ctx);
        ctx.store.set_state(PlaybackState::Loading);
    }

    fn begin_attempt(&mut self, ctx: &mut BinderContext<'_>) {
        self.attempt += 1;
        debug!("load attempt {}", self.attempt);
        ctx.element.load();
    }

    /// Apply a native event.
    pub fn handle_event(
        &mut self,
        ctx: &mut BinderContext<'_>,
        event: &MediaEvent,
    ) -> Option<Transition> {
        match event {
            MediaEvent::LoadStart | MediaEvent::Seeking => None,
            MediaEvent::LoadedMetadata | MediaEvent::DurationChange => {
                self.read_duration(ctx);
                None
            }
            MediaEvent::CanPlay => self.on_can_play(ctx),
            MediaEvent::Play => {
                self.set_wants_play(true);
                if ctx.store.state() != PlaybackState::Playing {
                    ctx.store.set_state(PlaybackState::Loading);
                }
                ctx.store.set_playing(true);
                None
            }
            MediaEvent::Playing => self.on_playing(ctx),
            MediaEvent::Pause => self.on_pause(ctx),
            MediaEvent::Waiting | MediaEvent::Stalled => {
                self.on_stall(ctx);
                None
            }
            MediaEvent::TimeUpdate => {
                self.on_time_update(ctx);
                None
            }
            MediaEvent::Seeked => {
                ctx.timing.finish_seek();
                ctx.timing.end_buffering();
                ctx.store.set_buffering(false);
                ctx.store.set_current_time(ctx.element.current_time());
                None
            }
            MediaEvent::Ended => self.on_ended(ctx),
            MediaEvent::Error(code) => self.on_error(ctx, *code),
        }
    }

    fn on_can_play(&mut self, ctx: &mut BinderContext<'_>) -> Option<Transition> {
        self.read_duration(ctx);
        self.reload_in_flight = false;
        if ctx.store.state() != PlaybackState::Loading {
            return None;
        }
        if !self.wants_play {
            let settled = if ctx.store.current_time() > 0.0 {
                PlaybackState::Paused
            } else {
                PlaybackState::Idle
            };
            ctx.store.set_state(settled);
            return None;
        }
        if ctx.element.paused() {
            if let Err(err) = ctx.element.play() {
                self.reject_play(ctx.store, &err);
                return Some(Transition::Failed);
            }
        }
        None
    }

    fn on_playing(&mut self, ctx: &mut BinderContext<'_>) -> Option<Transition> {
        self.reload_in_flight = false;
        if !self.wants_play {
            debug!("playing signal without play intent; pausing element");
            ctx.element.pause();
            return None;
        }
        let was_playing = ctx.store.state() == PlaybackState::Playing;
        ctx.store.set_state(PlaybackState::Playing);
        ctx.store.set_playing(true);
        ctx.store.set_retries(0);
        ctx.store.set_issue(None);
        self.failed_attempt = None;
        ctx.timing.end_buffering();
        ctx.store.set_buffering(false);
        if was_playing {
            None
        } else {
            Some(Transition::StartedPlaying)
        }
    }

    fn on_pause(&mut self, ctx: &mut BinderContext<'_>) -> Option<Transition> {
        if ctx.element.ended() || self.reload_in_flight {
            return None;
        }
        self.wants_play = false;
        ctx.timing.end_buffering();
        if ctx.store.state().is_active() {
            ctx.store.set_state(PlaybackState::Paused);
            return Some(Transition::Paused);
        }
        None
    }

    fn on_stall(&mut self, ctx: &mut BinderContext<'_>) {
        if !self.wants_play || !ctx.store.state().is_active() {
            return;
        }
        let episode = ctx.timing.begin_buffering(ctx.now_ms);
        let generation = self.generation;
        let kind = TaskKind::BufferingCheck { episode };
        if !ctx
            .tasks
            .contains(|task| task.generation == generation && task.kind == kind)
        {
            debug!("buffering episode started at {}ms", episode);
            ctx.tasks
                .schedule(episode + self.debounce_ms, generation, kind);
        }
    }

    fn on_time_update(&mut self, ctx: &mut BinderContext<'_>) {
        if ctx.timing.seek_pending(ctx.now_ms) {
            return;
        }
        let live = ctx.element.current_time();
        if live > ctx.store.current_time() && ctx.timing.buffering_started().is_some() {
            ctx.timing.end_buffering();
            ctx.store.set_buffering(false);
        }
        ctx.store.set_current_time(live);
    }

    fn on_ended(&mut self, ctx: &mut BinderContext<'_>) -> Option<Transition> {
        if self.end_reported {
            return None;
        }
        self.end_reported = true;
        self.wants_play = false;
        ctx.timing.end_buffering();
        ctx.store.set_state(PlaybackState::Idle);
        ctx.store.set_current_time(0.0);
        ctx.element.set_current_time(0.0);
        Some(Transition::Ended)
    }

    fn on_error(&mut self, ctx: &mut BinderContext<'_>, code: MediaErrorCode) -> Option<Transition> {
        if code == MediaErrorCode::Aborted {
            debug!("ignoring aborted load");
            return None;
        }
        if self.failed_attempt == Some(self.attempt) {
            debug!(
                "ignoring {} for attempt {} with a retry already pending",
                code, self.attempt
            );
            return None;
        }
        self.reload_in_flight = false;
        ctx.timing.end_buffering();

        if code.is_terminal() {
            warn!("media error is not recoverable: {}", code);
            self.fail(
                ctx,
                PlaybackIssue::new(
                    IssueKind::FormatUnsupported,
                    "This audio format is not supported on this device",
                ),
            );
            return Some(Transition::Failed);
        }

        let retries = (ctx.store.retries() + 1).min(self.max_retries);
        ctx.store.set_retries(retries);
        if retries >= self.max_retries {
            warn!("media error after {} retries: {}", retries, code);
            self.fail(
                ctx,
                PlaybackIssue::new(
                    IssueKind::LoadFailed,
                    format!("Could not load audio ({})", code),
                ),
            );
            return Some(Transition::Failed);
        }

        warn!(
            "media error on attempt {} ({}); retry {}/{} in {}ms",
            self.attempt, code, retries, self.max_retries, self.retry_delay_ms
        );
        self.failed_attempt = Some(self.attempt);
        if self.wants_play {
            ctx.store.set_state(PlaybackState::Loading);
        }
        ctx.tasks.schedule(
            ctx.now_ms + self.retry_delay_ms,
            self.generation,
            TaskKind::RetryLoad {
                attempt: self.attempt,
            },
        );
        None
    }

    fn fail(&mut self, ctx: &mut BinderContext<'_>, issue: PlaybackIssue) {
        let generation = self.generation;
        ctx.tasks
            .cancel_where(|task| task.generation == generation && is_retry(task));
        self.failed_attempt = None;
        self.wants_play = false;
        ctx.store.set_state(PlaybackState::Error);
        ctx.store.set_issue(Some(issue));
    }

    /// Pin the store according to a rejected `play()`.
    pub fn reject_play(&mut self, store: &mut PlaybackStore, err: &PlayError) {
        self.wants_play = false;
        warn!("play rejected: {}", err);
        let issue_kind = match err.kind {
            PlayErrorKind::AutoplayBlocked => {
                store.set_state(PlaybackState::Paused);
                IssueKind::AutoplayBlocked
            }
            PlayErrorKind::FormatUnsupported => {
                store.set_state(PlaybackState::Error);
                IssueKind::FormatUnsupported
            }
            PlayErrorKind::Unknown => {
                store.set_state(PlaybackState::Error);
                IssueKind::Unknown
            }
        };
        store.set_issue(Some(PlaybackIssue::new(issue_kind, err.user_message())));
    }

    /// Run a due timer. Tasks from an older generation do nothing.
    pub fn run_task(
        &mut self,
        ctx: &mut BinderContext<'_>,
        task: ScheduledTask,
    ) -> Option<Transition> {
        if task.generation != self.generation {
            debug!(
                "dropping {:?} for stale generation {} (current {})",
                task.kind, task.generation, self.generation
            );
            return None;
        }
        match task.kind {
            TaskKind::RetryLoad { attempt } => {
                if self.failed_attempt != Some(attempt)
                    || ctx.store.state() == PlaybackState::Error
                {
                    return None;
                }
                self.failed_attempt = None;
                self.reload_in_flight = true;
                info!("retrying load after failed attempt {}", attempt);
                self.begin_attempt(ctx);
                if self.wants_play {
                    ctx.store.set_state(PlaybackState::Loading);
                }
                None
            }
            TaskKind::RepollDuration => {
                match MediaDuration::from_reported(ctx.element.duration()) {
                    Some(duration) => ctx.store.set_duration(duration),
                    None => debug!("duration still unavailable; keeping placeholder"),
                }
                None
            }
            TaskKind::BufferingCheck { episode } => {
                self.check_buffering(ctx, episode);
                None
            }
        }
    }

    fn check_buffering(&mut self, ctx: &mut BinderContext<'_>, episode: u64) {
        if ctx.timing.buffering_started() != Some(episode)
            || !self.wants_play
            || !ctx.store.state().is_active()
        {
            return;
        }
        if let Some(until) = ctx.timing.suppressed_until() {
            if ctx.now_ms < until {
                ctx.tasks.schedule(
                    until,
                    self.generation,
                    TaskKind::BufferingCheck { episode },
                );
                return;
            }
        }
        debug!(
            "buffering for {}ms (indicator {})",
            ctx.now_ms - episode,
            if self.show_buffering_indicator {
                "shown"
            } else {
                "hidden"
            }
        );
        ctx.store.set_buffering(self.show_buffering_indicator);
    }

    fn read_duration(&mut self, ctx: &mut BinderContext<'_>) {
        let raw = ctx.element.duration();
        if let Some(duration) = MediaDuration::from_reported(raw) {
            ctx.store.set_duration(duration);
            return;
        }
        if ctx.store.duration().known().is_some() {
            return;
        }
        ctx.store.set_duration(MediaDuration::Placeholder);
        if !self.duration_repolled {
            self.duration_repolled = true;
            debug!("non-finite duration ({}); re-polling once", raw);
            ctx.tasks.schedule(
                ctx.now_ms + self.repoll_ms,
                self.generation,
                TaskKind::RepollDuration,
            );
        }
    }

    /// Mirror volume and mute onto the element.
    pub fn sync_volume(&self, ctx: &mut BinderContext<'_>) {
        ctx.element.set_volume(ctx.store.volume());
        ctx.element.set_muted(ctx.store.is_muted());
    }
}

fn is_retry(task: &ScheduledTask) -> bool {
    matches!(task.kind, TaskKind::RetryLoad { .. })
}
