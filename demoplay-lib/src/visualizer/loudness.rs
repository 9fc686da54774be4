//! Loudness meter.
//!
//! An RMS approximation of LUFS: the momentary value is the mixed RMS in
//! decibels with the K-weighting offset, and the integrated value is the
//! mean of recent momentary readings above the silence floor.

use std::collections::VecDeque;

use super::color::Rgb;
use super::meter::{draw_meter_row, normalize_db, rms, rms_to_db, PeakHold};
use super::settings::LoudnessSettings;
use super::surface::Surface;
use super::{frame_taps, FrameInput, Visualizer, VisualizerKind};

/// Offset applied to the RMS level, in dB.
pub const LUFS_OFFSET: f32 = -0.691;

/// Momentary and integrated loudness over a bounded history.
#[derive(Debug, Clone)]
pub struct LoudnessMeter {
    history: VecDeque<f32>,
    history_len: usize,
    silence_floor_db: f32,
    momentary: f32,
}

impl LoudnessMeter {
    pub fn new(history_len: usize, silence_floor_db: f32) -> Self {
        Self {
            history: VecDeque::with_capacity(history_len.max(1)),
            history_len: history_len.max(1),
            silence_floor_db,
            momentary: f32::NEG_INFINITY,
        }
    }

    /// Measure one block and return its momentary loudness.
    ///
    /// Readings below the silence floor are not added to the history.
    pub fn measure(&mut self, samples: &[f32]) -> f32 {
        let momentary = LUFS_OFFSET + rms_to_db(rms(samples));
        self.momentary = momentary;
        if momentary.is_finite() && momentary >= self.silence_floor_db {
            if self.history.len() == self.history_len {
                self.history.pop_front();
            }
            self.history.push_back(momentary);
        }
        momentary
    }

    pub fn momentary(&self) -> f32 {
        self.momentary
    }

    /// Mean of the gated history, `None` until something audible arrived.
    pub fn integrated(&self) -> Option<f32> {
        if self.history.is_empty() {
            return None;
        }
        Some(self.history.iter().sum::<f32>() / self.history.len() as f32)
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.momentary = f32::NEG_INFINITY;
    }
}

pub struct LoudnessVisualizer {
    settings: LoudnessSettings,
    meter: LoudnessMeter,
    peak: PeakHold,
    samples: Vec<f32>,
}

impl LoudnessVisualizer {
    pub fn new(settings: LoudnessSettings) -> Self {
        Self {
            meter: LoudnessMeter::new(settings.history_len, settings.silence_floor_db),
            peak: PeakHold::new(settings.peak_decay),
            settings,
            samples: Vec::new(),
        }
    }

    pub fn meter(&self) -> &LoudnessMeter {
        &self.meter
    }
}

impl Visualizer for LoudnessVisualizer {
    fn kind(&self) -> VisualizerKind {
        VisualizerKind::Loudness
    }

    fn render(&mut self, input: &FrameInput<'_>, surface: &mut Surface) -> bool {
        let Some(taps) = frame_taps(input, surface) else {
            return false;
        };
        {
            let mut analyser = taps.main.lock().unwrap();
            self.samples.resize(analyser.fft_size(), 0.0);
            analyser.get_float_time_domain_data(&mut self.samples);
        }
        let momentary = self.meter.measure(&self.samples);
        let (min_db, max_db) = (self.settings.min_db, self.settings.max_db);
        let level = normalize_db(momentary, min_db, max_db);
        let peak = self.peak.update(level);
        let integrated = self
            .meter
            .integrated()
            .map(|db| normalize_db(db, min_db, max_db))
            .unwrap_or(0.0);

        surface.clear(Rgb::BLACK);
        let height = surface.height();
        let row_height = (height / 2).max(1);
        draw_meter_row(surface, 0, row_height, level, peak);
        if height > row_height {
            draw_meter_row(surface, height - row_height, row_height, integrated, 0.0);
        }
        true
    }

    fn reset(&mut self) {
        self.meter.reset();
        self.peak.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn momentary_includes_offset() {
        let mut meter = LoudnessMeter::new(10, -70.0);
        let momentary = meter.measure(&[1.0, -1.0, 1.0, -1.0]);
        assert!((momentary - LUFS_OFFSET).abs() < 1e-5);
    }

    #[test]
    fn silence_does_not_drag_integrated_down() {
        let mut meter = LoudnessMeter::new(10, -70.0);
        let half = vec![0.5f32; 128];
        meter.measure(&half);
        meter.measure(&half);
        let before = meter.integrated().unwrap();
        meter.measure(&[0.0; 128]);
        meter.measure(&[1e-5; 128]);
        assert_eq!(meter.history_len(), 2);
        assert_eq!(meter.integrated(), Some(before));
        assert!(meter.momentary() < -70.0);
    }

    #[test]
    fn history_is_bounded() {
        let mut meter = LoudnessMeter::new(3, -70.0);
        meter.measure(&[0.1; 16]);
        for _ in 0..3 {
            meter.measure(&[1.0; 16]);
        }
        assert_eq!(meter.history_len(), 3);
        assert!((meter.integrated().unwrap() - LUFS_OFFSET).abs() < 1e-5);
    }

    #[test]
    fn nothing_audible_has_no_integrated_value() {
        let mut meter = LoudnessMeter::new(3, -70.0);
        meter.measure(&[]);
        assert_eq!(meter.integrated(), None);
        assert_eq!(meter.momentary(), f32::NEG_INFINITY);
    }
}
