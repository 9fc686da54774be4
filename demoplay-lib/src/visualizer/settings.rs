//! Visualizer configuration bag.
//!
//! Settings are read once per session and never written by the engines.

use std::fmt::{Display, Formatter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analysis::{validate_fft_size, AnalyserOptions};
use crate::constants::DEFAULT_FFT_SIZE;

use super::color::Palette;

/// Frequency axis used by the spectrogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyScale {
    Linear,
    #[default]
    #[serde(alias = "log")]
    Logarithmic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarsSettings {
    #[serde(alias = "bars")]
    pub bar_count: usize,
    /// Multiplicative cap decay per frame.
    pub fall_speed: f32,
    pub bar_gap: usize,
    pub show_caps: bool,
    pub palette: Palette,
}

impl Default for BarsSettings {
    fn default() -> Self {
        Self {
            bar_count: 64,
            fall_speed: 0.8,
            bar_gap: 1,
            show_caps: true,
            palette: Palette::Gradient,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OscilloscopeSettings {
    pub sensitivity: f32,
    pub line_color: [u8; 3],
}

impl Default for OscilloscopeSettings {
    fn default() -> Self {
        Self {
            sensitivity: 1.0,
            line_color: [0x4a, 0xde, 0x80],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrogramSettings {
    pub palette: Palette,
    pub frequency_scale: FrequencyScale,
}

impl Default for SpectrogramSettings {
    fn default() -> Self {
        Self {
            palette: Palette::Gradient,
            frequency_scale: FrequencyScale::Logarithmic,
        }
    }
}

/// Range and peak behaviour shared by the stereo and loudness meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterSettings {
    pub min_db: f32,
    pub max_db: f32,
    /// Linear fall of the peak marker per frame, in display units.
    pub peak_decay: f32,
}

impl Default for MeterSettings {
    fn default() -> Self {
        Self {
            min_db: -60.0,
            max_db: 0.0,
            peak_decay: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoudnessSettings {
    pub min_db: f32,
    pub max_db: f32,
    pub peak_decay: f32,
    /// Momentary readings kept for the integrated value.
    pub history_len: usize,
    /// Readings below this level are left out of the integrated value.
    pub silence_floor_db: f32,
}

impl Default for LoudnessSettings {
    fn default() -> Self {
        Self {
            min_db: -60.0,
            max_db: 0.0,
            peak_decay: 0.01,
            history_len: 300,
            silence_floor_db: -70.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleSettings {
    pub count: usize,
    pub target_fps: u32,
    /// Base rotation in radians per second.
    pub rotation_speed: f32,
    /// How far band energy pushes particles outwards.
    pub displacement: f32,
    pub palette: Palette,
    pub seed: u64,
}

impl Default for ParticleSettings {
    fn default() -> Self {
        Self {
            count: 1_500,
            target_fps: 30,
            rotation_speed: 0.35,
            displacement: 0.6,
            palette: Palette::Plasma,
            seed: 7,
        }
    }
}

/// Settings for every visualizer engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerSettings {
    pub fft_size: usize,
    pub smoothing: f32,
    pub bars: BarsSettings,
    pub oscilloscope: OscilloscopeSettings,
    pub spectrogram: SpectrogramSettings,
    #[serde(alias = "stereo_meter")]
    pub meter: MeterSettings,
    pub loudness: LoudnessSettings,
    pub particles: ParticleSettings,
}

impl Default for VisualizerSettings {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            smoothing: 0.8,
            bars: BarsSettings::default(),
            oscilloscope: OscilloscopeSettings::default(),
            spectrogram: SpectrogramSettings::default(),
            meter: MeterSettings::default(),
            loudness: LoudnessSettings::default(),
            particles: ParticleSettings::default(),
        }
    }
}

impl VisualizerSettings {
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        let settings: VisualizerSettings =
            serde_json::from_str(json).map_err(SettingsError::Parse)?;
        settings.validated()
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(SettingsError::Io)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String, SettingsError> {
        serde_json::to_string_pretty(self).map_err(SettingsError::Parse)
    }

    /// Reject unusable values and clamp the recoverable ones.
    pub fn validated(mut self) -> Result<Self, SettingsError> {
        validate_fft_size(self.fft_size)
            .map_err(|err| SettingsError::Invalid(err.to_string()))?;
        check_range("meter", self.meter.min_db, self.meter.max_db)?;
        check_range("loudness", self.loudness.min_db, self.loudness.max_db)?;

        let defaults = VisualizerSettings::default();
        self.smoothing = finite_or(self.smoothing, defaults.smoothing).clamp(0.0, 1.0);
        self.bars.bar_count = self.bars.bar_count.max(1);
        self.bars.fall_speed = finite_or(self.bars.fall_speed, defaults.bars.fall_speed).clamp(0.0, 1.0);
        self.oscilloscope.sensitivity = finite_or(
            self.oscilloscope.sensitivity,
            defaults.oscilloscope.sensitivity,
        )
        .max(0.0);
        self.meter.peak_decay = finite_or(self.meter.peak_decay, defaults.meter.peak_decay).max(0.0);
        self.loudness.peak_decay =
            finite_or(self.loudness.peak_decay, defaults.loudness.peak_decay).max(0.0);
        self.loudness.history_len = self.loudness.history_len.max(1);
        self.loudness.silence_floor_db = finite_or(
            self.loudness.silence_floor_db,
            defaults.loudness.silence_floor_db,
        );
        self.particles.target_fps = self.particles.target_fps.max(1);
        Ok(self)
    }

    /// Analyser options implied by these settings.
    pub fn analyser_options(&self) -> AnalyserOptions {
        AnalyserOptions {
            fft_size: self.fft_size,
            smoothing: self.smoothing,
            ..AnalyserOptions::default()
        }
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

fn check_range(name: &str, min: f32, max: f32) -> Result<(), SettingsError> {
    if min.is_finite() && max.is_finite() && min < max {
        Ok(())
    } else {
        Err(SettingsError::Invalid(format!(
            "{} range {}..{} is empty",
            name, min, max
        )))
    }
}

/// Failure to load visualizer settings.
#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Io(err) => write!(f, "failed to read settings: {}", err),
            SettingsError::Parse(err) => write!(f, "invalid settings json: {}", err),
            SettingsError::Invalid(msg) => write!(f, "invalid settings: {}", msg),
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SettingsError::Io(err) => Some(err),
            SettingsError::Parse(err) => Some(err),
            SettingsError::Invalid(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_nested_defaults() {
        let settings = VisualizerSettings::from_json_str(
            r#"{"bars": {"bars": 32}, "spectrogram": {"palette": "viridis", "frequency_scale": "linear"}}"#,
        )
        .unwrap();
        assert_eq!(settings.bars.bar_count, 32);
        assert_eq!(settings.bars.fall_speed, 0.8);
        assert_eq!(settings.spectrogram.palette, Palette::Viridis);
        assert_eq!(settings.spectrogram.frequency_scale, FrequencyScale::Linear);
        assert_eq!(settings.fft_size, 2048);
    }

    #[test]
    fn invalid_fft_size_is_rejected() {
        let err = VisualizerSettings::from_json_str(r#"{"fft_size": 1000}"#).unwrap_err();
        assert!(matches!(err, SettingsError::Invalid(_)));
    }

    #[test]
    fn empty_meter_range_is_rejected() {
        let err =
            VisualizerSettings::from_json_str(r#"{"meter": {"min_db": 0, "max_db": -10}}"#)
                .unwrap_err();
        assert!(err.to_string().contains("meter"));
    }

    #[test]
    fn defaults_serialize_and_reload() {
        let json = VisualizerSettings::default().to_json_pretty().unwrap();
        let reloaded = VisualizerSettings::from_json_str(&json).unwrap();
        assert_eq!(reloaded, VisualizerSettings::default());
    }

    #[test]
    fn analyser_options_follow_settings() {
        let settings =
            VisualizerSettings::from_json_str(r#"{"fft_size": 512, "smoothing": 3.0}"#).unwrap();
        let options = settings.analyser_options();
        assert_eq!(options.fft_size, 512);
        assert_eq!(options.smoothing, 1.0);
    }
}
