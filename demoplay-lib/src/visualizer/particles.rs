//! 3D particle field driven by band energy.
//!
//! Runs at its own frame rate: ticks arriving sooner than the target
//! interval return early without drawing.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::color::{ColorCache, Rgb};
use super::settings::ParticleSettings;
use super::surface::Surface;
use super::{frame_taps, FrameInput, Visualizer, VisualizerKind};

const BASS_HZ: (f32, f32) = (20.0, 250.0);
const MID_HZ: (f32, f32) = (250.0, 4_000.0);
const HIGH_HZ: (f32, f32) = (4_000.0, 20_000.0);
const CAMERA_DISTANCE: f32 = 3.5;

/// Mean byte magnitude between `low_hz` and `high_hz`, scaled to `[0, 1]`.
pub fn band_energy(bins: &[u8], sample_rate: u32, low_hz: f32, high_hz: f32) -> f32 {
    if bins.is_empty() || sample_rate == 0 {
        return 0.0;
    }
    // Bins span 0..nyquist.
    let hz_per_bin = sample_rate as f32 / 2.0 / bins.len() as f32;
    let start = ((low_hz / hz_per_bin).floor() as usize).min(bins.len() - 1);
    let end = ((high_hz / hz_per_bin).ceil() as usize).clamp(start + 1, bins.len());
    let sum: u32 = bins[start..end].iter().map(|&b| b as u32).sum();
    sum as f32 / ((end - start) as f32 * 255.0)
}

/// Energy per band for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BandEnergy {
    pub bass: f32,
    pub mid: f32,
    pub high: f32,
    pub full: f32,
}

impl BandEnergy {
    pub fn from_bins(bins: &[u8], sample_rate: u32) -> Self {
        let full = if bins.is_empty() {
            0.0
        } else {
            bins.iter().map(|&b| b as u32).sum::<u32>() as f32 / (bins.len() as f32 * 255.0)
        };
        Self {
            bass: band_energy(bins, sample_rate, BASS_HZ.0, BASS_HZ.1),
            mid: band_energy(bins, sample_rate, MID_HZ.0, MID_HZ.1),
            high: band_energy(bins, sample_rate, HIGH_HZ.0, HIGH_HZ.1),
            full,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Band {
    Bass,
    Mid,
    High,
}

#[derive(Debug, Clone, Copy)]
struct Particle {
    /// Unit-sphere direction.
    home: [f32; 3],
    band: Band,
    shade: u8,
}

pub struct ParticleVisualizer {
    settings: ParticleSettings,
    colors: ColorCache,
    particles: Vec<Particle>,
    bins: Vec<u8>,
    energy: BandEnergy,
    angle: f32,
    last_frame_ms: Option<u64>,
    frames_rendered: u64,
}

impl ParticleVisualizer {
    pub fn new(settings: ParticleSettings) -> Self {
        let mut rng = StdRng::seed_from_u64(settings.seed);
        let particles = (0..settings.count)
            .map(|index| {
                let z: f32 = rng.gen_range(-1.0..1.0);
                let theta: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
                let radius = (1.0 - z * z).sqrt();
                let band = match index % 3 {
                    0 => Band::Bass,
                    1 => Band::Mid,
                    _ => Band::High,
                };
                Particle {
                    home: [radius * theta.cos(), radius * theta.sin(), z],
                    band,
                    shade: rng.gen_range(64..=255),
                }
            })
            .collect();
        Self {
            colors: ColorCache::new(settings.palette),
            settings,
            particles,
            bins: Vec::new(),
            energy: BandEnergy::default(),
            angle: 0.0,
            last_frame_ms: None,
            frames_rendered: 0,
        }
    }

    pub fn energy(&self) -> BandEnergy {
        self.energy
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// Whether enough time has passed since the last drawn frame.
    fn frame_due(&self, now_ms: u64) -> bool {
        let interval = 1_000 / self.settings.target_fps.max(1) as u64;
        match self.last_frame_ms {
            Some(last) => now_ms.saturating_sub(last) >= interval,
            None => true,
        }
    }

    fn band_level(&self, band: Band) -> f32 {
        match band {
            Band::Bass => self.energy.bass,
            Band::Mid => self.energy.mid,
            Band::High => self.energy.high,
        }
    }

    fn draw(&self, surface: &mut Surface) {
        surface.clear(Rgb::BLACK);
        let width = surface.width() as f32;
        let height = surface.height() as f32;
        let focal = width.min(height) * 1.2;
        let tilt = 0.35 + self.energy.mid * 0.25;
        let (sin_a, cos_a) = self.angle.sin_cos();
        let (sin_t, cos_t) = tilt.sin_cos();

        for particle in &self.particles {
            let push = 1.0 + self.settings.displacement * self.band_level(particle.band);
            let [x, y, z] = particle.home.map(|v| v * push);
            // Yaw, then pitch.
            let (x, z) = (x * cos_a + z * sin_a, -x * sin_a + z * cos_a);
            let (y, z) = (y * cos_t - z * sin_t, y * sin_t + z * cos_t);
            let depth = z + CAMERA_DISTANCE;
            if depth <= 0.1 {
                continue;
            }
            let sx = width / 2.0 + x / depth * focal;
            let sy = height / 2.0 - y / depth * focal;
            if sx < 0.0 || sy < 0.0 {
                continue;
            }
            let brightness = (1.5 / depth).clamp(0.2, 1.0) * (0.5 + self.energy.full);
            let shade = ((particle.shade as f32) * brightness).clamp(1.0, 255.0) as u8;
            surface.set(sx as usize, sy as usize, self.colors.lookup(shade));
        }
    }
}

impl Visualizer for ParticleVisualizer {
    fn kind(&self) -> VisualizerKind {
        VisualizerKind::Particles
    }

    fn render(&mut self, input: &FrameInput<'_>, surface: &mut Surface) -> bool {
        let Some(taps) = frame_taps(input, surface) else {
            return false;
        };
        if !self.frame_due(input.now_ms) {
            return false;
        }
        let elapsed_secs = self
            .last_frame_ms
            .map(|last| input.now_ms.saturating_sub(last) as f32 / 1_000.0)
            .unwrap_or(0.0);
        self.last_frame_ms = Some(input.now_ms);

        let sample_rate = {
            let mut analyser = taps.main.lock().unwrap();
            self.bins.resize(analyser.frequency_bin_count(), 0);
            analyser.get_byte_frequency_data(&mut self.bins);
            analyser.sample_rate()
        };
        self.energy = BandEnergy::from_bins(&self.bins, sample_rate);
        self.angle = (self.angle
            + self.settings.rotation_speed * elapsed_secs * (1.0 + self.energy.bass))
            % std::f32::consts::TAU;

        self.draw(surface);
        self.frames_rendered += 1;
        true
    }

    fn reset(&mut self) {
        self.energy = BandEnergy::default();
        self.angle = 0.0;
        self.last_frame_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visualizer::test_support::{sine_frames, taps_with};

    #[test]
    fn energy_lands_in_the_matching_band() {
        // 8 bins over 0..24 kHz: 3 kHz each.
        let bins = [255, 0, 0, 0, 0, 0, 0, 0];
        let energy = BandEnergy::from_bins(&bins, 48_000);
        assert_eq!(energy.bass, 1.0);
        assert_eq!(energy.high, 0.0);
        assert!((energy.full - 0.125).abs() < 1e-6);
        assert_eq!(band_energy(&[], 48_000, 0.0, 100.0), 0.0);
    }

    #[test]
    fn frames_are_capped_to_target_rate() {
        let taps = taps_with(&sine_frames(100.0, 2_048), 512);
        let mut particles = ParticleVisualizer::new(ParticleSettings {
            count: 200,
            target_fps: 20,
            ..ParticleSettings::default()
        });
        let mut surface = Surface::new(40, 20);
        let mut drawn = 0;
        for now_ms in (0..=200).step_by(10) {
            let input = FrameInput {
                taps: Some(&taps),
                playing: true,
                now_ms,
            };
            if particles.render(&input, &mut surface) {
                drawn += 1;
            }
        }
        // 50 ms budget over 200 ms: frames at 0, 50, 100, 150 and 200.
        assert_eq!(drawn, 5);
        assert_eq!(particles.frames_rendered(), 5);
    }

    #[test]
    fn same_seed_builds_the_same_cloud() {
        let settings = ParticleSettings {
            count: 50,
            ..ParticleSettings::default()
        };
        let a = ParticleVisualizer::new(settings.clone());
        let b = ParticleVisualizer::new(settings);
        assert_eq!(a.particle_count(), 50);
        for (pa, pb) in a.particles.iter().zip(&b.particles) {
            assert_eq!(pa.home, pb.home);
        }
    }
}
