//! Visualizer engines.
//!
//! Every engine pulls samples from the analysis taps once per frame, derives
//! its own visual quantity and draws into a [`Surface`]. Frames are skipped
//! silently while the taps are missing, playback is stopped or the surface
//! has no area, since the analysis graph is built lazily and may race the
//! first tick.

mod bars;
mod color;
mod loudness;
mod meter;
mod oscilloscope;
mod particles;
mod settings;
mod spectrogram;
mod surface;

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use crate::analysis::AnalysisTaps;
use crate::scheduler::{FrameScheduler, FrameSubscription};

pub use bars::{band_averages, update_caps, BarsVisualizer};
pub use color::{ColorCache, Palette, Rgb};
pub use loudness::{LoudnessMeter, LoudnessVisualizer, LUFS_OFFSET};
pub use meter::{normalize_db, rms, rms_to_db, PeakHold, StereoMeterVisualizer};
pub use oscilloscope::OscilloscopeVisualizer;
pub use particles::{band_energy, BandEnergy, ParticleVisualizer};
pub use settings::{
    BarsSettings, FrequencyScale, LoudnessSettings, MeterSettings, OscilloscopeSettings,
    ParticleSettings, SettingsError, SpectrogramSettings, VisualizerSettings,
};
pub use spectrogram::{FrequencyMap, SpectrogramVisualizer};
pub use surface::{ParentLayout, Surface};

/// Everything an engine may read in one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    pub taps: Option<&'a AnalysisTaps>,
    pub playing: bool,
    pub now_ms: u64,
}

/// One rendering engine.
pub trait Visualizer: Send {
    fn kind(&self) -> VisualizerKind;

    /// Draw one frame. Returns whether the surface was touched.
    fn render(&mut self, input: &FrameInput<'_>, surface: &mut Surface) -> bool;

    /// Size of the container the surface lives in.
    fn set_parent_layout(&mut self, _layout: ParentLayout) {}

    /// Drop decaying state (caps, peaks, history).
    fn reset(&mut self) {}
}

/// Taps for this frame, or `None` when the frame must be skipped.
pub(crate) fn frame_taps<'a>(input: &FrameInput<'a>, surface: &Surface) -> Option<&'a AnalysisTaps> {
    if !input.playing || surface.is_empty() {
        return None;
    }
    input.taps
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisualizerKind {
    Bars,
    Oscilloscope,
    Spectrogram,
    StereoMeter,
    Loudness,
    Particles,
}

impl VisualizerKind {
    pub fn all() -> &'static [VisualizerKind] {
        &[
            VisualizerKind::Bars,
            VisualizerKind::Oscilloscope,
            VisualizerKind::Spectrogram,
            VisualizerKind::StereoMeter,
            VisualizerKind::Loudness,
            VisualizerKind::Particles,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            VisualizerKind::Bars => "bars",
            VisualizerKind::Oscilloscope => "oscilloscope",
            VisualizerKind::Spectrogram => "spectrogram",
            VisualizerKind::StereoMeter => "meter",
            VisualizerKind::Loudness => "loudness",
            VisualizerKind::Particles => "particles",
        }
    }

    /// Next kind in display order, wrapping around.
    pub fn next(self) -> VisualizerKind {
        let all = Self::all();
        let index = all.iter().position(|kind| *kind == self).unwrap_or(0);
        all[(index + 1) % all.len()]
    }

    /// Build the engine for this kind.
    pub fn create(self, settings: &VisualizerSettings) -> Box<dyn Visualizer> {
        match self {
            VisualizerKind::Bars => Box::new(BarsVisualizer::new(settings.bars.clone())),
            VisualizerKind::Oscilloscope => {
                Box::new(OscilloscopeVisualizer::new(settings.oscilloscope.clone()))
            }
            VisualizerKind::Spectrogram => {
                Box::new(SpectrogramVisualizer::new(settings.spectrogram.clone()))
            }
            VisualizerKind::StereoMeter => {
                Box::new(StereoMeterVisualizer::new(settings.meter.clone()))
            }
            VisualizerKind::Loudness => Box::new(LoudnessVisualizer::new(settings.loudness.clone())),
            VisualizerKind::Particles => {
                Box::new(ParticleVisualizer::new(settings.particles.clone()))
            }
        }
    }
}

impl Display for VisualizerKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VisualizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bars" | "fft" => Ok(VisualizerKind::Bars),
            "oscilloscope" | "scope" => Ok(VisualizerKind::Oscilloscope),
            "spectrogram" => Ok(VisualizerKind::Spectrogram),
            "meter" | "stereo" | "stereo-meter" => Ok(VisualizerKind::StereoMeter),
            "loudness" | "lufs" => Ok(VisualizerKind::Loudness),
            "particles" => Ok(VisualizerKind::Particles),
            other => Err(format!("unknown visualizer '{}'", other)),
        }
    }
}

/// An engine, its surface and the inputs it draws from.
///
/// Shared with the frame loop through [`SharedStage`].
pub struct VisualizerStage {
    visualizer: Box<dyn Visualizer>,
    surface: Surface,
    taps: Option<AnalysisTaps>,
    playing: bool,
    frames_drawn: u64,
}

pub type SharedStage = Arc<Mutex<VisualizerStage>>;

impl VisualizerStage {
    pub fn new(visualizer: Box<dyn Visualizer>, width: usize, height: usize) -> Self {
        Self {
            visualizer,
            surface: Surface::new(width, height),
            taps: None,
            playing: false,
            frames_drawn: 0,
        }
    }

    pub fn shared(self) -> SharedStage {
        Arc::new(Mutex::new(self))
    }

    pub fn kind(&self) -> VisualizerKind {
        self.visualizer.kind()
    }

    /// Replace the engine, keeping the surface size.
    pub fn set_visualizer(&mut self, visualizer: Box<dyn Visualizer>) {
        self.visualizer = visualizer;
        self.surface.clear(Rgb::BLACK);
    }

    pub fn set_taps(&mut self, taps: Option<AnalysisTaps>) {
        self.taps = taps;
    }

    pub fn has_taps(&self) -> bool {
        self.taps.is_some()
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    /// Resize the surface to the container and tell the engine about it.
    pub fn set_parent_layout(&mut self, layout: ParentLayout) {
        let (width, height) = layout.pixel_size();
        self.surface.resize(width, height);
        self.visualizer.set_parent_layout(layout);
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Frames in which the engine drew something.
    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    /// Draw one frame now.
    pub fn draw(&mut self, now_ms: u64) -> bool {
        let input = FrameInput {
            taps: self.taps.as_ref(),
            playing: self.playing,
            now_ms,
        };
        let drawn = self.visualizer.render(&input, &mut self.surface);
        if drawn {
            self.frames_drawn += 1;
        }
        drawn
    }
}

/// Register `stage` with the frame loop. Dropping the subscription stops it.
pub fn attach_stage(stage: &SharedStage, scheduler: &FrameScheduler) -> FrameSubscription {
    let stage = stage.clone();
    scheduler.register(move |tick| {
        stage.lock().unwrap().draw(tick.now_ms);
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::analysis::{AnalyserOptions, AnalysisTaps, SampleTap};

    /// Taps over a stereo tap pre-filled with `frames` of interleaved data.
    pub fn taps_with(frames: &[[f32; 2]], fft_size: usize) -> AnalysisTaps {
        let tap = SampleTap::new(2, 48_000);
        tap.attach();
        let interleaved: Vec<f32> = frames.iter().flat_map(|frame| frame.iter().copied()).collect();
        tap.write(&interleaved);
        AnalysisTaps::build(
            tap,
            AnalyserOptions {
                fft_size,
                smoothing: 0.0,
                ..AnalyserOptions::default()
            },
        )
        .unwrap()
    }

    /// A full-scale sine on both channels.
    pub fn sine_frames(freq: f32, count: usize) -> Vec<[f32; 2]> {
        (0..count)
            .map(|i| {
                let v = (2.0 * std::f32::consts::PI * freq * i as f32 / 48_000.0).sin();
                [v, v]
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_support::{sine_frames, taps_with};

    #[test]
    fn kinds_parse_and_cycle() {
        assert_eq!("LUFS".parse::<VisualizerKind>(), Ok(VisualizerKind::Loudness));
        assert!("waterfall".parse::<VisualizerKind>().is_err());
        let mut kind = VisualizerKind::Bars;
        for _ in 0..VisualizerKind::all().len() {
            kind = kind.next();
        }
        assert_eq!(kind, VisualizerKind::Bars);
    }

    #[test]
    fn every_engine_skips_without_taps_or_playback() {
        let settings = VisualizerSettings::default();
        let taps = taps_with(&sine_frames(440.0, 4_096), 1_024);
        for kind in VisualizerKind::all() {
            let mut engine = kind.create(&settings);
            let mut surface = Surface::new(32, 16);
            let missing = FrameInput { taps: None, playing: true, now_ms: 0 };
            assert!(!engine.render(&missing, &mut surface), "{} drew without taps", kind);
            let stopped = FrameInput { taps: Some(&taps), playing: false, now_ms: 0 };
            assert!(!engine.render(&stopped, &mut surface), "{} drew while stopped", kind);
            let mut empty = Surface::new(0, 0);
            let live = FrameInput { taps: Some(&taps), playing: true, now_ms: 0 };
            assert!(!engine.render(&live, &mut empty), "{} drew on empty surface", kind);
            engine.set_parent_layout(ParentLayout::new(0.0, 0.0));
            assert!(!engine.render(&live, &mut empty), "{} drew into a collapsed layout", kind);
        }
    }

    #[test]
    fn every_engine_draws_live_signal() {
        let settings = VisualizerSettings::default();
        let taps = taps_with(&sine_frames(440.0, 4_096), 1_024);
        for kind in VisualizerKind::all() {
            let mut stage = VisualizerStage::new(kind.create(&settings), 48, 24);
            stage.set_parent_layout(ParentLayout::new(48.0, 24.0));
            stage.set_taps(Some(taps.clone()));
            stage.set_playing(true);
            assert!(stage.draw(1_000), "{} skipped a live frame", kind);
            assert!(
                stage.surface().pixels().iter().any(|p| *p != Rgb::BLACK),
                "{} left the surface blank",
                kind
            );
        }
    }

    #[test]
    fn stage_draws_from_frame_loop() {
        let settings = VisualizerSettings::default();
        let stage = VisualizerStage::new(VisualizerKind::Bars.create(&settings), 16, 8).shared();
        {
            let mut stage = stage.lock().unwrap();
            stage.set_taps(Some(taps_with(&sine_frames(1_000.0, 2_048), 512)));
            stage.set_playing(true);
        }
        let scheduler = FrameScheduler::new();
        let subscription = attach_stage(&stage, &scheduler);
        scheduler.tick(16);
        scheduler.tick(33);
        assert_eq!(stage.lock().unwrap().frames_drawn(), 2);
        drop(subscription);
        assert!(!scheduler.tick(50));
        assert_eq!(stage.lock().unwrap().frames_drawn(), 2);
    }
}
