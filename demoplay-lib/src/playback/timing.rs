//! Timestamps behind buffering detection and its suppression windows.

/// Marks left by user intent and stall signals.
///
/// A seek, a play click and a visibility restore each open a suppression
/// window during which the buffering flag must stay down.
#[derive(Debug, Clone, Default)]
pub struct TimingState {
    suppression_window_ms: u64,
    last_seek_ms: Option<u64>,
    last_play_click_ms: Option<u64>,
    last_visibility_restore_ms: Option<u64>,
    buffering_started_ms: Option<u64>,
    seek_pending: bool,
}

impl TimingState {
    pub fn new(suppression_window_ms: u64) -> Self {
        Self {
            suppression_window_ms,
            ..Self::default()
        }
    }

    pub fn mark_seek(&mut self, now_ms: u64) {
        self.last_seek_ms = Some(now_ms);
        self.seek_pending = true;
        self.buffering_started_ms = None;
    }

    pub fn mark_play_click(&mut self, now_ms: u64) {
        self.last_play_click_ms = Some(now_ms);
    }

    pub fn mark_visibility_restore(&mut self, now_ms: u64) {
        self.last_visibility_restore_ms = Some(now_ms);
    }

    /// Latest instant at which any suppression window closes.
    pub fn suppressed_until(&self) -> Option<u64> {
        [
            self.last_seek_ms,
            self.last_play_click_ms,
            self.last_visibility_restore_ms,
        ]
        .into_iter()
        .flatten()
        .map(|mark| mark + self.suppression_window_ms)
        .max()
    }

    pub fn is_suppressed(&self, now_ms: u64) -> bool {
        self.suppressed_until()
            .map(|until| now_ms < until)
            .unwrap_or(false)
    }

    /// Open a buffering episode unless one is already running.
    ///
    /// Returns the episode start.
    pub fn begin_buffering(&mut self, now_ms: u64) -> u64 {
        *self.buffering_started_ms.get_or_insert(now_ms)
    }

    pub fn end_buffering(&mut self) {
        self.buffering_started_ms = None;
    }

    pub fn buffering_started(&self) -> Option<u64> {
        self.buffering_started_ms
    }

    /// `true` between a seek request and the backend confirming it.
    ///
    /// A backend that never confirms releases the flag once the suppression
    /// window has passed.
    pub fn seek_pending(&self, now_ms: u64) -> bool {
        match self.last_seek_ms {
            Some(mark) if self.seek_pending => now_ms < mark + self.suppression_window_ms,
            _ => false,
        }
    }

    pub fn finish_seek(&mut self) {
        self.seek_pending = false;
    }

    /// Drop stale per-episode flags after a resync from the live element.
    pub fn clear_pending(&mut self) {
        self.seek_pending = false;
        self.buffering_started_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppression_uses_latest_mark() {
        let mut timing = TimingState::new(500);
        assert!(!timing.is_suppressed(0));
        timing.mark_seek(1_000);
        timing.mark_play_click(1_200);
        assert!(timing.is_suppressed(1_699));
        assert!(!timing.is_suppressed(1_700));
        assert_eq!(timing.suppressed_until(), Some(1_700));
    }

    #[test]
    fn episode_start_is_sticky() {
        let mut timing = TimingState::new(500);
        assert_eq!(timing.begin_buffering(10), 10);
        assert_eq!(timing.begin_buffering(40), 10);
        timing.end_buffering();
        assert_eq!(timing.begin_buffering(40), 40);
    }

    #[test]
    fn seek_clears_episode_and_resync_clears_seek() {
        let mut timing = TimingState::new(500);
        timing.begin_buffering(5);
        timing.mark_seek(6);
        assert_eq!(timing.buffering_started(), None);
        assert!(timing.seek_pending(7));
        assert!(!timing.seek_pending(506));
        timing.clear_pending();
        assert!(!timing.seek_pending(7));
    }
}
