//! Stereo level meter and the level helpers shared with the loudness meter.

use super::color::{Palette, Rgb};
use super::settings::MeterSettings;
use super::surface::Surface;
use super::{frame_taps, FrameInput, Visualizer, VisualizerKind};

const PEAK_COLOR: Rgb = Rgb::new(0xff, 0xff, 0xff);
const TRACK_COLOR: Rgb = Rgb::new(0x18, 0x18, 0x18);

/// Root mean square of `samples`; zero for an empty slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples
        .iter()
        .filter(|s| s.is_finite())
        .map(|s| s * s)
        .sum();
    (sum / samples.len() as f32).sqrt()
}

/// Decibels of a linear level. Silence is `-inf`.
pub fn rms_to_db(rms: f32) -> f32 {
    if rms > 0.0 {
        20.0 * rms.log10()
    } else {
        f32::NEG_INFINITY
    }
}

/// Map `db` from `[min_db, max_db]` onto `[0, 1]`.
pub fn normalize_db(db: f32, min_db: f32, max_db: f32) -> f32 {
    if db.is_nan() || max_db <= min_db {
        return 0.0;
    }
    ((db - min_db) / (max_db - min_db)).clamp(0.0, 1.0)
}

/// Peak marker that falls by a fixed amount per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakHold {
    value: f32,
    decay: f32,
}

impl PeakHold {
    pub fn new(decay: f32) -> Self {
        Self { value: 0.0, decay }
    }

    /// Feed the current level and return the marker position.
    pub fn update(&mut self, level: f32) -> f32 {
        if level >= self.value {
            self.value = level;
        } else {
            self.value = (self.value - self.decay).max(level).max(0.0);
        }
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
    }
}

/// Draw a horizontal meter bar with a peak marker.
pub(crate) fn draw_meter_row(
    surface: &mut Surface,
    y: usize,
    height: usize,
    level: f32,
    peak: f32,
) {
    let width = surface.width();
    surface.fill_rect(0, y, width, height, TRACK_COLOR);
    let filled = (level.clamp(0.0, 1.0) * width as f32).round() as usize;
    for x in 0..filled {
        let color = Palette::Gradient.sample(x as f32 / width.max(1) as f32);
        surface.fill_rect(x, y, 1, height, color);
    }
    if peak > 0.0 && width > 0 {
        let x = ((peak.clamp(0.0, 1.0) * width as f32).round() as usize).clamp(1, width) - 1;
        surface.fill_rect(x, y, 1, height, PEAK_COLOR);
    }
}

/// Left and right RMS levels with peak markers.
pub struct StereoMeterVisualizer {
    settings: MeterSettings,
    left: Vec<f32>,
    right: Vec<f32>,
    levels: [f32; 2],
    peaks: [PeakHold; 2],
}

impl StereoMeterVisualizer {
    pub fn new(settings: MeterSettings) -> Self {
        let decay = settings.peak_decay;
        Self {
            settings,
            left: Vec::new(),
            right: Vec::new(),
            levels: [0.0; 2],
            peaks: [PeakHold::new(decay); 2],
        }
    }

    /// Display levels in `[0, 1]` for left and right.
    pub fn levels(&self) -> [f32; 2] {
        self.levels
    }

    pub fn peaks(&self) -> [f32; 2] {
        [self.peaks[0].value(), self.peaks[1].value()]
    }

    /// Update levels from per-channel time-domain samples.
    pub fn measure(&mut self, left: &[f32], right: &[f32]) {
        for (index, samples) in [left, right].into_iter().enumerate() {
            let db = rms_to_db(rms(samples));
            let level = normalize_db(db, self.settings.min_db, self.settings.max_db);
            self.levels[index] = level;
            self.peaks[index].update(level);
        }
    }
}

impl Visualizer for StereoMeterVisualizer {
    fn kind(&self) -> VisualizerKind {
        VisualizerKind::StereoMeter
    }

    fn render(&mut self, input: &FrameInput<'_>, surface: &mut Surface) -> bool {
        let Some(taps) = frame_taps(input, surface) else {
            return false;
        };
        let left_tap = taps.left.as_ref().unwrap_or(&taps.main);
        let right_tap = taps.right.as_ref().unwrap_or(&taps.main);
        {
            let mut analyser = left_tap.lock().unwrap();
            self.left.resize(analyser.fft_size(), 0.0);
            analyser.get_float_time_domain_data(&mut self.left);
        }
        {
            let mut analyser = right_tap.lock().unwrap();
            self.right.resize(analyser.fft_size(), 0.0);
            analyser.get_float_time_domain_data(&mut self.right);
        }
        let left = std::mem::take(&mut self.left);
        let right = std::mem::take(&mut self.right);
        self.measure(&left, &right);
        self.left = left;
        self.right = right;

        surface.clear(Rgb::BLACK);
        let height = surface.height();
        let row_height = (height / 2).max(1);
        draw_meter_row(surface, 0, row_height, self.levels[0], self.peaks[0].value());
        if height > row_height {
            draw_meter_row(
                surface,
                height - row_height,
                row_height,
                self.levels[1],
                self.peaks[1].value(),
            );
        }
        true
    }

    fn reset(&mut self) {
        self.levels = [0.0; 2];
        for peak in self.peaks.iter_mut() {
            peak.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_scale_square_is_zero_db() {
        let square: Vec<f32> = (0..64).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert!((rms(&square) - 1.0).abs() < 1e-6);
        assert!(rms_to_db(rms(&square)).abs() < 1e-5);
        assert_eq!(rms_to_db(0.0), f32::NEG_INFINITY);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn levels_clamp_to_display_range() {
        assert_eq!(normalize_db(f32::NEG_INFINITY, -60.0, 0.0), 0.0);
        assert_eq!(normalize_db(6.0, -60.0, 0.0), 1.0);
        assert!((normalize_db(-30.0, -60.0, 0.0) - 0.5).abs() < 1e-6);
        assert_eq!(normalize_db(f32::NAN, -60.0, 0.0), 0.0);
    }

    #[test]
    fn peak_falls_linearly() {
        let mut peak = PeakHold::new(0.1);
        assert_eq!(peak.update(0.5), 0.5);
        let falls: Vec<f32> = (0..3).map(|_| peak.update(0.0)).collect();
        for (got, want) in falls.iter().zip([0.4, 0.3, 0.2]) {
            assert!((got - want).abs() < 1e-6);
        }
        assert_eq!(peak.update(0.9), 0.9);
        assert_eq!(peak.update(0.85), 0.85);
    }

    #[test]
    fn channels_are_measured_independently() {
        let mut meter = StereoMeterVisualizer::new(MeterSettings::default());
        let loud = vec![0.5f32; 256];
        let quiet = vec![0.0f32; 256];
        meter.measure(&loud, &quiet);
        let [left, right] = meter.levels();
        // -6.02 dB on a -60..0 scale.
        assert!((left - 0.8997).abs() < 1e-3);
        assert_eq!(right, 0.0);
        assert_eq!(meter.peaks(), meter.levels());
    }
}
