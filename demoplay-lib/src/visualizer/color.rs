//! Palettes and the 256-entry colour lookup used by the engines.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    const fn hex(value: u32) -> Self {
        Self::new((value >> 16) as u8, (value >> 8) as u8, value as u8)
    }

    /// Blend towards `other` by `t` in `[0, 1]`.
    pub fn lerp(self, other: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgb::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }

    /// Scale brightness by `factor` in `[0, 1]`.
    pub fn scaled(self, factor: f32) -> Rgb {
        Rgb::BLACK.lerp(self, factor)
    }
}

/// Colour maps available to the engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Palette {
    /// Three-stop gradient from deep blue through cyan to yellow.
    #[default]
    Gradient,
    Viridis,
    Magma,
    Inferno,
    Plasma,
    #[serde(alias = "greyscale")]
    Grayscale,
}

const GRADIENT: [Rgb; 3] = [Rgb::hex(0x000033), Rgb::hex(0x00a0ff), Rgb::hex(0xffff00)];

const VIRIDIS: [Rgb; 11] = [
    Rgb::hex(0x440154),
    Rgb::hex(0x482475),
    Rgb::hex(0x414487),
    Rgb::hex(0x355f8d),
    Rgb::hex(0x2a788e),
    Rgb::hex(0x21918c),
    Rgb::hex(0x22a884),
    Rgb::hex(0x44bf70),
    Rgb::hex(0x7ad151),
    Rgb::hex(0xbddf26),
    Rgb::hex(0xfde725),
];

const MAGMA: [Rgb; 11] = [
    Rgb::hex(0x000004),
    Rgb::hex(0x140e36),
    Rgb::hex(0x3b0f70),
    Rgb::hex(0x641a80),
    Rgb::hex(0x8c2981),
    Rgb::hex(0xb73779),
    Rgb::hex(0xde4968),
    Rgb::hex(0xf7705c),
    Rgb::hex(0xfe9f6d),
    Rgb::hex(0xfecf92),
    Rgb::hex(0xfcfdbf),
];

const INFERNO: [Rgb; 11] = [
    Rgb::hex(0x000004),
    Rgb::hex(0x160b39),
    Rgb::hex(0x420a68),
    Rgb::hex(0x6a176e),
    Rgb::hex(0x932667),
    Rgb::hex(0xbc3754),
    Rgb::hex(0xdd513a),
    Rgb::hex(0xf37819),
    Rgb::hex(0xfca50a),
    Rgb::hex(0xf6d746),
    Rgb::hex(0xfcffa4),
];

const PLASMA: [Rgb; 11] = [
    Rgb::hex(0x0d0887),
    Rgb::hex(0x41049d),
    Rgb::hex(0x6a00a8),
    Rgb::hex(0x8f0da4),
    Rgb::hex(0xb12a90),
    Rgb::hex(0xcc4778),
    Rgb::hex(0xe16462),
    Rgb::hex(0xf2844b),
    Rgb::hex(0xfca636),
    Rgb::hex(0xfcce25),
    Rgb::hex(0xf0f921),
];

const GRAYSCALE: [Rgb; 2] = [Rgb::hex(0x000000), Rgb::hex(0xffffff)];

impl Palette {
    pub fn all() -> &'static [Palette] {
        &[
            Palette::Gradient,
            Palette::Viridis,
            Palette::Magma,
            Palette::Inferno,
            Palette::Plasma,
            Palette::Grayscale,
        ]
    }

    /// Evenly spaced anchor colours.
    pub fn stops(self) -> &'static [Rgb] {
        match self {
            Palette::Gradient => &GRADIENT,
            Palette::Viridis => &VIRIDIS,
            Palette::Magma => &MAGMA,
            Palette::Inferno => &INFERNO,
            Palette::Plasma => &PLASMA,
            Palette::Grayscale => &GRAYSCALE,
        }
    }

    /// Interpolated colour at `t` in `[0, 1]`.
    pub fn sample(self, t: f32) -> Rgb {
        let stops = self.stops();
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let scaled = t * (stops.len() - 1) as f32;
        let index = (scaled.floor() as usize).min(stops.len() - 2);
        stops[index].lerp(stops[index + 1], scaled - index as f32)
    }
}

/// Precomputed colour for every byte value of one palette.
///
/// The table is rebuilt only when the palette changes.
#[derive(Debug, Clone)]
pub struct ColorCache {
    palette: Palette,
    table: [Rgb; 256],
    builds: u64,
}

impl ColorCache {
    pub fn new(palette: Palette) -> Self {
        let mut cache = Self {
            palette,
            table: [Rgb::BLACK; 256],
            builds: 0,
        };
        cache.rebuild();
        cache
    }

    fn rebuild(&mut self) {
        for (value, entry) in self.table.iter_mut().enumerate() {
            *entry = self.palette.sample(value as f32 / 255.0);
        }
        self.builds += 1;
    }

    pub fn palette(&self) -> Palette {
        self.palette
    }

    /// Switch palettes; a no-op when `palette` is already active.
    pub fn set_palette(&mut self, palette: Palette) {
        if palette != self.palette {
            self.palette = palette;
            self.rebuild();
        }
    }

    #[inline]
    pub fn lookup(&self, value: u8) -> Rgb {
        self.table[value as usize]
    }

    /// Number of times the table has been computed.
    pub fn builds(&self) -> u64 {
        self.builds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_never_rebuild_the_table() {
        let cache = ColorCache::new(Palette::Viridis);
        let first = cache.lookup(200);
        for _ in 0..1_000 {
            assert_eq!(cache.lookup(200), first);
        }
        assert_eq!(cache.builds(), 1);
    }

    #[test]
    fn palette_change_rebuilds_once() {
        let mut cache = ColorCache::new(Palette::Gradient);
        cache.set_palette(Palette::Gradient);
        assert_eq!(cache.builds(), 1);
        cache.set_palette(Palette::Magma);
        cache.set_palette(Palette::Magma);
        assert_eq!(cache.builds(), 2);
        assert_eq!(cache.lookup(0), Rgb::hex(0x000004));
        assert_eq!(cache.lookup(255), Rgb::hex(0xfcfdbf));
    }

    #[test]
    fn gradient_hits_its_middle_stop() {
        assert_eq!(Palette::Gradient.sample(0.5), Rgb::hex(0x00a0ff));
        assert_eq!(Palette::Grayscale.sample(0.5), Rgb::new(128, 128, 128));
        assert_eq!(Palette::Plasma.sample(f32::NAN), Rgb::hex(0x0d0887));
    }
}
