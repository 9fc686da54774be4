//! Page visibility handling.
//!
//! While the host is hidden, event delivery to the player may be throttled
//! or frozen entirely, so the store drifts from the element. On restore the
//! live element is the source of truth.

use log::debug;

use super::binder::{BinderContext, MediaSessionBinder, Transition};
use super::state::{MediaDuration, PlaybackState};
use super::tasks::TaskKind;

/// Host visibility notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilitySignal {
    Hidden,
    Visible,
    /// Shown again from a suspended-navigation cache.
    Restored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VisibilityAction {
    None,
    Hide,
    Resync,
}

#[derive(Debug)]
pub(crate) struct VisibilityCoordinator {
    hidden: bool,
    last_signal: Option<VisibilitySignal>,
    resyncs: u64,
}

impl VisibilityCoordinator {
    pub fn new() -> Self {
        Self {
            hidden: false,
            last_signal: None,
            resyncs: 0,
        }
    }

    /// Decide what a signal requires. Repeated signals are no-ops.
    pub fn process(&mut self, signal: VisibilitySignal) -> VisibilityAction {
        let repeated = self.last_signal == Some(signal);
        self.last_signal = Some(signal);
        match signal {
            VisibilitySignal::Hidden if !self.hidden => {
                self.hidden = true;
                VisibilityAction::Hide
            }
            VisibilitySignal::Visible if self.hidden => {
                self.hidden = false;
                VisibilityAction::Resync
            }
            VisibilitySignal::Restored if !repeated => {
                self.hidden = false;
                VisibilityAction::Resync
            }
            _ => VisibilityAction::None,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn resync_count(&self) -> u64 {
        self.resyncs
    }

    /// Overwrite transport values with the live element's.
    ///
    /// `mark_restore` opens the buffering suppression window. Returns the
    /// transition implied by a play state the store had missed.
    pub fn resync(
        &mut self,
        binder: &mut MediaSessionBinder,
        ctx: &mut BinderContext<'_>,
        mark_restore: bool,
    ) -> Option<Transition> {
        if let Some(duration) = MediaDuration::from_reported(ctx.element.duration()) {
            ctx.store.set_duration(duration);
        }
        let live_time = ctx.element.current_time();
        ctx.store.set_current_time(live_time);

        let running = !ctx.element.paused() && !ctx.element.ended();
        let transition = match ctx.store.state() {
            // A load in flight reports paused until it starts; leave it alone.
            PlaybackState::Loading => None,
            PlaybackState::Playing if !running => {
                binder.set_wants_play(false);
                let settled = if ctx.element.ended() {
                    PlaybackState::Idle
                } else {
                    PlaybackState::Paused
                };
                ctx.store.set_state(settled);
                Some(Transition::Paused)
            }
            PlaybackState::Idle | PlaybackState::Paused if running => {
                binder.set_wants_play(true);
                ctx.store.set_state(PlaybackState::Playing);
                ctx.store.set_playing(true);
                Some(Transition::StartedPlaying)
            }
            _ => None,
        };

        let generation = binder.generation();
        ctx.tasks.cancel_where(|task| {
            task.generation == generation
                && matches!(task.kind, TaskKind::BufferingCheck { .. })
        });
        ctx.timing.clear_pending();
        ctx.store.set_buffering(false);
        if mark_restore {
            ctx.timing.mark_visibility_restore(ctx.now_ms);
            self.resyncs += 1;
        }
        debug!(
            "resynced from element: {:.2}s, {}",
            live_time,
            ctx.store.state()
        );
        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_signals_are_ignored() {
        let mut coordinator = VisibilityCoordinator::new();
        assert_eq!(coordinator.process(VisibilitySignal::Visible), VisibilityAction::None);
        assert_eq!(coordinator.process(VisibilitySignal::Hidden), VisibilityAction::Hide);
        assert_eq!(coordinator.process(VisibilitySignal::Hidden), VisibilityAction::None);
        assert_eq!(coordinator.process(VisibilitySignal::Visible), VisibilityAction::Resync);
        assert_eq!(coordinator.process(VisibilitySignal::Visible), VisibilityAction::None);
    }

    #[test]
    fn cache_restore_resyncs_without_hidden() {
        let mut coordinator = VisibilityCoordinator::new();
        assert_eq!(coordinator.process(VisibilitySignal::Restored), VisibilityAction::Resync);
        assert_eq!(coordinator.process(VisibilitySignal::Restored), VisibilityAction::None);
        assert_eq!(coordinator.process(VisibilitySignal::Visible), VisibilityAction::None);
        assert!(!coordinator.is_hidden());
    }
}
