//! FFT bar engine.

use super::color::{ColorCache, Rgb};
use super::settings::BarsSettings;
use super::surface::Surface;
use super::{frame_taps, FrameInput, Visualizer, VisualizerKind};

const CAP_COLOR: Rgb = Rgb::new(0xf5, 0xf5, 0xf5);

/// Average `bins` into `bands` equal-width groups, scaled to `[0, 1]`.
///
/// When there are more bands than bins, neighbouring bands share a bin.
pub fn band_averages(bins: &[u8], bands: usize, out: &mut Vec<f32>) {
    out.clear();
    if bins.is_empty() || bands == 0 {
        out.resize(bands, 0.0);
        return;
    }
    let total = bins.len();
    for band in 0..bands {
        let start = (band * total / bands).min(total - 1);
        let end = ((band + 1) * total / bands).clamp(start + 1, total);
        let sum: u32 = bins[start..end].iter().map(|&b| b as u32).sum();
        out.push(sum as f32 / ((end - start) as f32 * 255.0));
    }
}

/// Update falling cap markers: `cap = max(value, cap * fall_speed)`.
pub fn update_caps(caps: &mut Vec<f32>, values: &[f32], fall_speed: f32) {
    if caps.len() != values.len() {
        caps.clear();
        caps.resize(values.len(), 0.0);
    }
    for (cap, &value) in caps.iter_mut().zip(values) {
        *cap = value.max(*cap * fall_speed);
    }
}

pub struct BarsVisualizer {
    settings: BarsSettings,
    colors: ColorCache,
    bins: Vec<u8>,
    values: Vec<f32>,
    caps: Vec<f32>,
}

impl BarsVisualizer {
    pub fn new(settings: BarsSettings) -> Self {
        Self {
            colors: ColorCache::new(settings.palette),
            settings,
            bins: Vec::new(),
            values: Vec::new(),
            caps: Vec::new(),
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn caps(&self) -> &[f32] {
        &self.caps
    }

    fn draw(&self, surface: &mut Surface) {
        surface.clear(Rgb::BLACK);
        let width = surface.width();
        let height = surface.height();
        let count = self.values.len().max(1);
        let gap = self.settings.bar_gap;
        let bar_width = (width.saturating_sub(gap * (count - 1)) / count).max(1);

        for (index, &value) in self.values.iter().enumerate() {
            let x = index * (bar_width + gap);
            if x >= width {
                break;
            }
            let bar_height = (value.clamp(0.0, 1.0) * height as f32).round() as usize;
            for row in 0..bar_height {
                let y = height - 1 - row;
                let shade = ((row + 1) as f32 / height as f32 * 255.0) as u8;
                surface.fill_rect(x, y, bar_width, 1, self.colors.lookup(shade));
            }
            if self.settings.show_caps {
                if let Some(&cap) = self.caps.get(index) {
                    let cap_row = (cap.clamp(0.0, 1.0) * height as f32).round() as usize;
                    let y = height - cap_row.clamp(1, height);
                    surface.fill_rect(x, y, bar_width, 1, CAP_COLOR);
                }
            }
        }
    }
}

impl Visualizer for BarsVisualizer {
    fn kind(&self) -> VisualizerKind {
        VisualizerKind::Bars
    }

    fn render(&mut self, input: &FrameInput<'_>, surface: &mut Surface) -> bool {
        let Some(taps) = frame_taps(input, surface) else {
            return false;
        };
        {
            let mut analyser = taps.main.lock().unwrap();
            self.bins.resize(analyser.frequency_bin_count(), 0);
            analyser.get_byte_frequency_data(&mut self.bins);
        }
        band_averages(&self.bins, self.settings.bar_count, &mut self.values);
        update_caps(&mut self.caps, &self.values, self.settings.fall_speed);
        self.draw(surface);
        true
    }

    fn reset(&mut self) {
        self.values.clear();
        self.caps.clear();
    }
}
