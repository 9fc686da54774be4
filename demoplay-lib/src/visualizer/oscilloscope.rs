//! Time-domain line trace.
//!
//! The surface is sized from the parent layout every frame. Measuring the
//! surface itself would feed its own size back into the next resize.

use super::color::Rgb;
use super::settings::OscilloscopeSettings;
use super::surface::{ParentLayout, Surface};
use super::{frame_taps, FrameInput, Visualizer, VisualizerKind};

const CENTER_LINE: Rgb = Rgb::new(0x22, 0x22, 0x22);

pub struct OscilloscopeVisualizer {
    settings: OscilloscopeSettings,
    layout: Option<ParentLayout>,
    samples: Vec<f32>,
}

impl OscilloscopeVisualizer {
    pub fn new(settings: OscilloscopeSettings) -> Self {
        Self {
            settings,
            layout: None,
            samples: Vec::new(),
        }
    }

    /// Vertical pixel for `sample` on a surface `height` pixels tall.
    fn row_for(&self, sample: f32, height: usize) -> i64 {
        let mid = (height as f32 - 1.0) / 2.0;
        let scaled = (sample * self.settings.sensitivity).clamp(-1.0, 1.0);
        (mid - scaled * mid).round() as i64
    }
}

impl Visualizer for OscilloscopeVisualizer {
    fn kind(&self) -> VisualizerKind {
        VisualizerKind::Oscilloscope
    }

    fn set_parent_layout(&mut self, layout: ParentLayout) {
        self.layout = Some(layout);
    }

    fn render(&mut self, input: &FrameInput<'_>, surface: &mut Surface) -> bool {
        if let Some(layout) = self.layout {
            let (width, height) = layout.pixel_size();
            surface.resize(width, height);
        }
        let Some(taps) = frame_taps(input, surface) else {
            return false;
        };
        {
            let mut analyser = taps.main.lock().unwrap();
            self.samples.resize(analyser.fft_size(), 0.0);
            analyser.get_float_time_domain_data(&mut self.samples);
        }

        let width = surface.width();
        let height = surface.height();
        surface.clear(Rgb::BLACK);
        let mid = (height - 1) / 2;
        surface.fill_rect(0, mid, width, 1, CENTER_LINE);

        let [r, g, b] = self.settings.line_color;
        let color = Rgb::new(r, g, b);
        let len = self.samples.len();
        let mut previous: Option<(i64, i64)> = None;
        for x in 0..width {
            let index = if width > 1 { x * (len - 1) / (width - 1) } else { 0 };
            let y = self.row_for(self.samples[index], height);
            let point = (x as i64, y);
            match previous {
                Some((px, py)) => surface.draw_line(px, py, point.0, point.1, color),
                None => surface.set(x, y as usize, color),
            }
            previous = Some(point);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visualizer::test_support::{sine_frames, taps_with};

    #[test]
    fn surface_follows_parent_layout() {
        let taps = taps_with(&sine_frames(220.0, 2_048), 1_024);
        let mut scope = OscilloscopeVisualizer::new(OscilloscopeSettings::default());
        let mut surface = Surface::new(10, 10);
        scope.set_parent_layout(ParentLayout {
            width: 40.0,
            height: 12.0,
            scale: 2.0,
        });
        let input = FrameInput {
            taps: Some(&taps),
            playing: true,
            now_ms: 0,
        };
        assert!(scope.render(&input, &mut surface));
        assert_eq!((surface.width(), surface.height()), (80, 24));
        // Rendering again must not grow the surface.
        assert!(scope.render(&input, &mut surface));
        assert_eq!((surface.width(), surface.height()), (80, 24));
    }

    #[test]
    fn sensitivity_scales_and_clamps() {
        let scope = OscilloscopeVisualizer::new(OscilloscopeSettings {
            sensitivity: 2.0,
            ..OscilloscopeSettings::default()
        });
        assert_eq!(scope.row_for(0.0, 11), 5);
        assert_eq!(scope.row_for(0.25, 11), 3);
        assert_eq!(scope.row_for(1.0, 11), 0);
        assert_eq!(scope.row_for(-1.0, 11), 10);
    }
}
