//! Scrolling spectrogram.
//!
//! Columns are kept newest-first and drawn right to left, so the latest
//! spectrum is always on the right edge.

use std::collections::VecDeque;

use log::debug;

use super::color::ColorCache;
use super::settings::{FrequencyScale, SpectrogramSettings};
use super::surface::Surface;
use super::{frame_taps, FrameInput, Visualizer, VisualizerKind};

/// Row-to-bin lookup for one surface height.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyMap {
    height: usize,
    bins: usize,
    scale: FrequencyScale,
    /// Bin shown on each row, top row first.
    rows: Vec<usize>,
    rebuilds: u64,
}

impl FrequencyMap {
    pub fn new() -> Self {
        Self {
            height: 0,
            bins: 0,
            scale: FrequencyScale::Linear,
            rows: Vec::new(),
            rebuilds: 0,
        }
    }

    /// Rebuild when the height, bin count or scale changed.
    pub fn ensure(&mut self, height: usize, bins: usize, scale: FrequencyScale) {
        if self.rebuilds > 0 && height == self.height && bins == self.bins && scale == self.scale {
            return;
        }
        self.height = height;
        self.bins = bins;
        self.scale = scale;
        self.rows = (0..height)
            .map(|row| Self::bin_for_row(height - 1 - row, height, bins, scale))
            .collect();
        self.rebuilds += 1;
        debug!(
            "spectrogram map rebuilt: {} rows over {} bins ({:?})",
            height, bins, scale
        );
    }

    /// Bin for `row` counted from the bottom.
    fn bin_for_row(row: usize, height: usize, bins: usize, scale: FrequencyScale) -> usize {
        if bins == 0 {
            return 0;
        }
        let last = bins - 1;
        let fraction = if height > 1 {
            row as f32 / (height - 1) as f32
        } else {
            0.0
        };
        let bin = match scale {
            FrequencyScale::Linear => fraction * last as f32,
            FrequencyScale::Logarithmic => (bins as f32).powf(fraction) - 1.0,
        };
        (bin.round().max(0.0) as usize).min(last)
    }

    pub fn bin_for(&self, row_from_top: usize) -> usize {
        self.rows.get(row_from_top).copied().unwrap_or(0)
    }

    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }
}

impl Default for FrequencyMap {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SpectrogramVisualizer {
    settings: SpectrogramSettings,
    colors: ColorCache,
    map: FrequencyMap,
    history: VecDeque<Vec<u8>>,
}

impl SpectrogramVisualizer {
    pub fn new(settings: SpectrogramSettings) -> Self {
        Self {
            colors: ColorCache::new(settings.palette),
            map: FrequencyMap::new(),
            history: VecDeque::new(),
            settings,
        }
    }

    /// Newest column first.
    pub fn history(&self) -> &VecDeque<Vec<u8>> {
        &self.history
    }

    pub fn frequency_map(&self) -> &FrequencyMap {
        &self.map
    }

    pub fn color_cache(&self) -> &ColorCache {
        &self.colors
    }

    /// Push a spectrum column and trim history to `width`.
    fn push_column(&mut self, column: Vec<u8>, width: usize) {
        self.history.push_front(column);
        self.history.truncate(width);
    }

    fn draw(&self, surface: &mut Surface) {
        let width = surface.width();
        let height = surface.height();
        for (age, column) in self.history.iter().enumerate() {
            let x = width - 1 - age;
            for y in 0..height {
                let value = column.get(self.map.bin_for(y)).copied().unwrap_or(0);
                surface.set(x, y, self.colors.lookup(value));
            }
        }
        for x in 0..width.saturating_sub(self.history.len()) {
            for y in 0..height {
                surface.set(x, y, self.colors.lookup(0));
            }
        }
    }
}

impl Visualizer for SpectrogramVisualizer {
    fn kind(&self) -> VisualizerKind {
        VisualizerKind::Spectrogram
    }

    fn render(&mut self, input: &FrameInput<'_>, surface: &mut Surface) -> bool {
        let Some(taps) = frame_taps(input, surface) else {
            return false;
        };
        let column = {
            let mut analyser = taps.main.lock().unwrap();
            let mut column = vec![0u8; analyser.frequency_bin_count()];
            analyser.get_byte_frequency_data(&mut column);
            column
        };
        self.map
            .ensure(surface.height(), column.len(), self.settings.frequency_scale);
        self.push_column(column, surface.width());
        self.draw(surface);
        true
    }

    fn reset(&mut self) {
        self.history.clear();
    }
}
