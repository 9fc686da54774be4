//! Audio analysis graph shared by the visualizers.
//!
//! The graph taps the media element once and fans the samples out to a
//! main analyser plus optional left/right analysers. Construction is lazy:
//! it waits for a user gesture and a play or can-play signal, and it is
//! skipped for sources known to be opaque to analysis.

mod analyser;
mod tap;

use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};

use crate::playback::{MediaElement, TapError};

pub use analyser::{blackman_window, validate_fft_size, Analyser, AnalyserOptions};
pub use tap::{ChannelSelect, SampleTap};

/// Errors raised while configuring analysers.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    InvalidFftSize(usize),
    InvalidDecibelRange { min: f32, max: f32 },
    Tap(TapError),
    NoSource,
}

impl Display for AnalysisError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisError::InvalidFftSize(size) => write!(
                f,
                "invalid FFT size {} (expected a power of two between 32 and 32768)",
                size
            ),
            AnalysisError::InvalidDecibelRange { min, max } => {
                write!(f, "invalid decibel range {}..{}", min, max)
            }
            AnalysisError::Tap(err) => write!(f, "{}", err),
            AnalysisError::NoSource => f.write_str("no source to analyse"),
        }
    }
}

impl std::error::Error for AnalysisError {}

impl From<TapError> for AnalysisError {
    fn from(err: TapError) -> Self {
        AnalysisError::Tap(err)
    }
}

/// Shared analyser handles handed to visualizers.
#[derive(Clone)]
pub struct AnalysisTaps {
    pub main: Arc<Mutex<Analyser>>,
    pub left: Option<Arc<Mutex<Analyser>>>,
    pub right: Option<Arc<Mutex<Analyser>>>,
    tap: SampleTap,
}

impl AnalysisTaps {
    /// Build analysers over `tap`.
    pub fn build(tap: SampleTap, options: AnalyserOptions) -> Result<Self, AnalysisError> {
        let main = Analyser::new(tap.clone(), ChannelSelect::Mix, options)?;
        let (left, right) = if options.split_channels {
            (
                Some(Arc::new(Mutex::new(Analyser::new(
                    tap.clone(),
                    ChannelSelect::Channel(0),
                    options,
                )?))),
                Some(Arc::new(Mutex::new(Analyser::new(
                    tap.clone(),
                    ChannelSelect::Channel(1),
                    options,
                )?))),
            )
        } else {
            (None, None)
        };
        Ok(Self {
            main: Arc::new(Mutex::new(main)),
            left,
            right,
            tap,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.tap.sample_rate()
    }

    pub fn tap(&self) -> &SampleTap {
        &self.tap
    }

    fn analysers(&self) -> impl Iterator<Item = &Arc<Mutex<Analyser>>> {
        std::iter::once(&self.main)
            .chain(self.left.iter())
            .chain(self.right.iter())
    }
}

impl std::fmt::Debug for AnalysisTaps {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisTaps")
            .field("tap", &self.tap)
            .field("split", &self.left.is_some())
            .finish()
    }
}

/// What an initialization request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Initialized,
    AlreadyInitialized,
    /// No user gesture has been seen yet.
    AwaitingGesture,
    /// The source is opaque to analysis; playback continues without it.
    SkippedCrossOrigin,
    Unavailable,
}

/// Owner of the analysis graph for one media element.
pub struct AnalysisContext {
    options: AnalyserOptions,
    taps: Option<AnalysisTaps>,
    user_gesture: bool,
    cors_issue_detected: bool,
    opaque_sources: HashSet<String>,
    attach_attempts: u64,
    last_error: Option<AnalysisError>,
}

impl AnalysisContext {
    pub fn new(options: AnalyserOptions) -> Self {
        Self {
            options,
            taps: None,
            user_gesture: false,
            cors_issue_detected: false,
            opaque_sources: HashSet::new(),
            attach_attempts: 0,
            last_error: None,
        }
    }

    pub fn notify_user_gesture(&mut self) {
        self.user_gesture = true;
    }

    /// Initialize in response to a play or can-play signal.
    pub fn on_trigger(&mut self, element: &mut dyn MediaElement) -> InitOutcome {
        if self.taps.is_some() {
            return InitOutcome::AlreadyInitialized;
        }
        if !self.user_gesture {
            return InitOutcome::AwaitingGesture;
        }
        self.initialize(element)
    }

    /// Build the graph if it does not exist yet.
    pub fn initialize(&mut self, element: &mut dyn MediaElement) -> InitOutcome {
        if self.taps.is_some() {
            return InitOutcome::AlreadyInitialized;
        }
        let Some(source) = element.source().map(str::to_string) else {
            self.last_error = Some(AnalysisError::NoSource);
            return InitOutcome::Unavailable;
        };
        if self.opaque_sources.contains(&source) {
            debug!("skipping analysis for opaque source {}", source);
            return InitOutcome::SkippedCrossOrigin;
        }

        self.attach_attempts += 1;
        let tap = match element.open_tap() {
            Ok(tap) => tap,
            Err(err) if err.is_cross_origin() => {
                warn!("analysis disabled for {}: {}", source, err);
                self.cors_issue_detected = true;
                self.opaque_sources.insert(source);
                self.last_error = Some(AnalysisError::Tap(err));
                return InitOutcome::SkippedCrossOrigin;
            }
            Err(err) => {
                warn!("analysis unavailable: {}", err);
                self.last_error = Some(AnalysisError::Tap(err));
                return InitOutcome::Unavailable;
            }
        };

        match AnalysisTaps::build(tap.clone(), self.options) {
            Ok(taps) => {
                info!(
                    "analysis graph ready (fft {}, {} analysers)",
                    self.options.fft_size,
                    taps.analysers().count()
                );
                self.taps = Some(taps);
                self.last_error = None;
                InitOutcome::Initialized
            }
            Err(err) => {
                warn!("failed to build analysers: {}", err);
                tap.detach();
                self.last_error = Some(err);
                InitOutcome::Unavailable
            }
        }
    }

    /// Disconnect the graph and release the tap.
    pub fn teardown(&mut self) {
        if let Some(taps) = self.taps.take() {
            debug!("tearing down analysis graph");
            taps.tap.detach();
        }
    }

    /// Analyser handles, once built.
    pub fn taps(&self) -> Option<AnalysisTaps> {
        self.taps.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.taps.is_some()
    }

    pub fn cors_issue_detected(&self) -> bool {
        self.cors_issue_detected
    }

    /// Number of times a tap was requested from the element.
    pub fn attach_attempts(&self) -> u64 {
        self.attach_attempts
    }

    pub fn last_error(&self) -> Option<&AnalysisError> {
        self.last_error.as_ref()
    }

    pub fn options(&self) -> AnalyserOptions {
        self.options
    }

    /// Resize every analyser. Invalid sizes leave the graph untouched.
    pub fn set_fft_size(&mut self, size: usize) -> Result<(), AnalysisError> {
        let size = validate_fft_size(size)?;
        self.options.fft_size = size;
        if let Some(taps) = &self.taps {
            for analyser in taps.analysers() {
                analyser.lock().unwrap().set_fft_size(size)?;
            }
        }
        Ok(())
    }

    /// Non-finite values fall back to the default smoothing.
    pub fn set_smoothing(&mut self, smoothing: f32) {
        let smoothing = if smoothing.is_finite() {
            smoothing.clamp(0.0, 1.0)
        } else {
            AnalyserOptions::default().smoothing
        };
        self.options.smoothing = smoothing;
        if let Some(taps) = &self.taps {
            for analyser in taps.analysers() {
                analyser.lock().unwrap().set_smoothing(smoothing);
            }
        }
    }
}

impl Drop for AnalysisContext {
    fn drop(&mut self) {
        self.teardown();
    }
}
