//! Shared constants for playback and analysis defaults.

/// Duration shown while the media backend has not reported a finite value (seconds).
pub const PLACEHOLDER_DURATION_SECS: f64 = 180.0;

/// Retry ceiling for load errors before playback is pinned to `Error`.
pub const MAX_LOAD_RETRIES: u32 = 3;

/// Delay between a load error and the scheduled reload (ms).
pub const RETRY_DELAY_MS: u64 = 1_000;

/// How long a buffering episode must last before it may become visible (ms).
pub const BUFFERING_DEBOUNCE_MS: u64 = 1_000;

/// Window after a seek, play click or visibility restore during which the
/// buffering flag is never raised (ms).
pub const SUPPRESSION_WINDOW_MS: u64 = 500;

/// Delay before re-reading a non-finite duration (ms).
pub const DURATION_REPOLL_MS: u64 = 500;

/// Media time that must elapse before a play session counts (seconds).
pub const MIN_COUNTED_PLAY_SECS: f64 = 2.0;

/// Initial player volume (linear gain).
pub const DEFAULT_VOLUME: f32 = 0.8;

/// Default analyser FFT size.
pub const DEFAULT_FFT_SIZE: usize = 2048;

/// Smallest and largest analyser FFT sizes.
pub const MIN_FFT_SIZE: usize = 32;
pub const MAX_FFT_SIZE: usize = 32_768;

/// Fallback sample rate used before a backend reports one (Hz).
pub const SAMPLE_RATE: u32 = 44_100;
