//! Transport controls for `Player`.
//!
//! Each control records user intent first (play click, seek mark) so the
//! buffering suppression windows line up with what the listener did.

use log::{info, warn};

use crate::playback::binder::BinderContext;
use crate::playback::media::{PlayError, PlayErrorKind};
use crate::playback::state::{clamp_time, PlaybackState};
use crate::playback::tasks::TaskKind;

use super::Player;

impl Player {
    /// Request playback.
    ///
    /// A rejection is triaged into the store (autoplay blocked stays
    /// recoverable, unsupported formats become an error) and returned.
    pub fn play(&mut self) -> Result<(), PlayError> {
        let now_ms = self.clock.now_ms();
        self.timing.mark_play_click(now_ms);
        self.analysis.notify_user_gesture();

        if self.store.source().is_none() {
            warn!("play requested without a source");
            return Err(PlayError::new(PlayErrorKind::Unknown, "no source loaded"));
        }

        info!("play requested");
        let mut ctx = BinderContext {
            store: &mut self.store,
            element: self.element.as_mut(),
            tasks: &mut self.tasks,
            timing: &mut self.timing,
            now_ms,
        };
        if ctx.store.state() == PlaybackState::Error {
            self.binder.reload_after_error(&mut ctx);
        }
        self.binder.set_wants_play(true);
        match ctx.element.play() {
            Ok(()) => {
                if !ctx.store.state().is_active() {
                    ctx.store.set_state(PlaybackState::Loading);
                }
                ctx.store.set_playing(true);
                ctx.store.set_issue(None);
                Ok(())
            }
            Err(err) => {
                self.binder.reject_play(ctx.store, &err);
                self.tracker.cancel_tracking();
                Err(err)
            }
        }
    }

    /// Pause playback and close the listening session.
    pub fn pause(&mut self) {
        info!("pause requested");
        self.binder.set_wants_play(false);
        self.element.pause();
        if self.store.state().is_active() {
            self.store.set_state(PlaybackState::Paused);
        }
        self.timing.end_buffering();
        let position = self.element.current_time();
        self.tracker.end_tracking(position);
    }

    /// Pause when playback is intended, play otherwise.
    pub fn toggle_play_pause(&mut self) -> Result<(), PlayError> {
        if self.binder.wants_play() {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    /// Seek to `time` seconds.
    ///
    /// The target is clamped to `[0, duration]` once the duration is known.
    /// With background playback enabled the store is first resynced from
    /// the element, since events may have been throttled.
    ///
    /// # Returns
    ///
    /// The position actually applied.
    pub fn seek(&mut self, time: f64) -> f64 {
        if self.config.allow_background_playback {
            self.resync_from_element(false);
        }
        let now_ms = self.clock.now_ms();
        let target = clamp_time(time, self.store.duration());
        self.timing.mark_seek(now_ms);
        self.store.set_current_time(target);
        self.store.set_buffering(false);
        let generation = self.binder.generation();
        self.tasks.cancel_where(|task| {
            task.generation == generation && matches!(task.kind, TaskKind::BufferingCheck { .. })
        });
        self.element.set_current_time(target);
        target
    }

    /// Seek relative to the current position.
    pub fn seek_by(&mut self, delta: f64) -> f64 {
        let target = self.store.current_time() + delta;
        self.seek(target)
    }

    /// Set the output volume in `[0, 1]`. Zero mutes.
    ///
    /// # Arguments
    ///
    /// * `volume` - Linear gain; out-of-range values are clamped.
    pub fn set_volume(&mut self, volume: f32) {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if volume > 0.0 {
            self.last_audible_volume = volume;
        }
        self.store.set_volume_and_mute(volume, volume == 0.0);
        self.sync_volume();
    }

    pub fn volume(&self) -> f32 {
        self.store.volume()
    }

    pub fn is_muted(&self) -> bool {
        self.store.is_muted()
    }

    /// Flip mute. Unmuting at zero volume restores the last audible level.
    pub fn toggle_mute(&mut self) {
        if self.store.is_muted() {
            let volume = if self.store.volume() == 0.0 {
                self.last_audible_volume
            } else {
                self.store.volume()
            };
            self.store.set_volume_and_mute(volume, false);
        } else {
            let volume = self.store.volume();
            self.store.set_volume_and_mute(volume, true);
        }
        self.sync_volume();
    }
}
