//! Pixel surfaces the engines draw into.

use super::color::Rgb;

/// Layout size of the container a surface is placed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParentLayout {
    pub width: f32,
    pub height: f32,
    /// Pixels per layout unit.
    pub scale: f32,
}

impl ParentLayout {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            scale: 1.0,
        }
    }

    /// Backing pixel size for this layout. Non-finite or negative sizes
    /// collapse to zero.
    pub fn pixel_size(&self) -> (usize, usize) {
        let scale = if self.scale.is_finite() && self.scale > 0.0 {
            self.scale
        } else {
            1.0
        };
        let px = |v: f32| {
            if v.is_finite() && v > 0.0 {
                (v * scale).round() as usize
            } else {
                0
            }
        };
        (px(self.width), px(self.height))
    }
}

/// Row-major RGB pixel buffer. `(0, 0)` is the top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    width: usize,
    height: usize,
    pixels: Vec<Rgb>,
}

impl Surface {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgb::BLACK; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `true` when there is nothing to draw on.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Resize and clear. Returns whether the size changed.
    pub fn resize(&mut self, width: usize, height: usize) -> bool {
        if width == self.width && height == self.height {
            return false;
        }
        self.width = width;
        self.height = height;
        self.pixels = vec![Rgb::BLACK; width * height];
        true
    }

    pub fn clear(&mut self, color: Rgb) {
        self.pixels.fill(color);
    }

    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    pub fn row(&self, y: usize) -> &[Rgb] {
        &self.pixels[y * self.width..(y + 1) * self.width]
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Rgb> {
        if x < self.width && y < self.height {
            Some(self.pixels[y * self.width + x])
        } else {
            None
        }
    }

    /// Set one pixel; out-of-bounds writes are dropped.
    pub fn set(&mut self, x: usize, y: usize, color: Rgb) {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = color;
        }
    }

    /// Fill a rectangle clipped to the surface.
    pub fn fill_rect(&mut self, x: usize, y: usize, width: usize, height: usize, color: Rgb) {
        let x_end = x.saturating_add(width).min(self.width);
        let y_end = y.saturating_add(height).min(self.height);
        for row in y.min(y_end)..y_end {
            let start = row * self.width;
            self.pixels[start + x.min(x_end)..start + x_end].fill(color);
        }
    }

    /// Bresenham line between two points, clipped per pixel.
    pub fn draw_line(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let (mut x, mut y) = (x0, y0);
        loop {
            if x >= 0 && y >= 0 {
                self.set(x as usize, y as usize, color);
            }
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_scale_sets_backing_size() {
        let layout = ParentLayout {
            width: 100.0,
            height: 40.5,
            scale: 2.0,
        };
        assert_eq!(layout.pixel_size(), (200, 81));
        assert_eq!(ParentLayout::new(f32::NAN, -3.0).pixel_size(), (0, 0));
    }

    #[test]
    fn drawing_clips_to_bounds() {
        let mut surface = Surface::new(4, 3);
        let red = Rgb::new(255, 0, 0);
        surface.fill_rect(2, 1, 10, 10, red);
        assert_eq!(surface.get(3, 2), Some(red));
        assert_eq!(surface.get(1, 1), Some(Rgb::BLACK));
        surface.draw_line(-2, 0, 6, 0, red);
        assert!(surface.row(0).iter().all(|p| *p == red));
        assert_eq!(surface.get(4, 0), None);
    }

    #[test]
    fn resize_reports_changes() {
        let mut surface = Surface::new(0, 0);
        assert!(surface.is_empty());
        assert!(surface.resize(8, 2));
        assert!(!surface.resize(8, 2));
        assert_eq!(surface.pixels().len(), 16);
    }
}
