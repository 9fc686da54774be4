//! Windowed FFT analyser over a [`SampleTap`].
//!
//! Readouts follow the conventions visualizers expect: magnitudes are
//! normalized by the FFT size, smoothed over time, converted to decibels
//! and mapped onto bytes between `min_decibels` and `max_decibels`.

use log::warn;

use crate::constants::{DEFAULT_FFT_SIZE, MAX_FFT_SIZE, MIN_FFT_SIZE};

use super::tap::{ChannelSelect, SampleTap};
use super::AnalysisError;

const DEFAULT_SMOOTHING: f32 = 0.8;
const DEFAULT_MIN_DECIBELS: f32 = -100.0;
const DEFAULT_MAX_DECIBELS: f32 = -30.0;
const BLACKMAN_ALPHA: f32 = 0.16;

#[cfg(not(feature = "real-fft"))]
mod complex_fft {
    use std::sync::Arc;

    use rustfft::{num_complex::Complex, Fft, FftPlanner};

    pub struct Spectrum {
        fft: Arc<dyn Fft<f32>>,
        buffer: Vec<Complex<f32>>,
    }

    impl Spectrum {
        pub fn new(fft_size: usize) -> Self {
            let mut planner = FftPlanner::<f32>::new();
            Self {
                fft: planner.plan_fft_forward(fft_size),
                buffer: vec![Complex::new(0.0, 0.0); fft_size],
            }
        }

        /// Write `|X[k]| / N` for the first `N / 2` bins into `out`.
        pub fn magnitudes(&mut self, windowed: &[f32], out: &mut [f32]) {
            for (slot, &sample) in self.buffer.iter_mut().zip(windowed) {
                *slot = Complex::new(sample, 0.0);
            }
            self.fft.process(&mut self.buffer);
            let scale = 1.0 / windowed.len() as f32;
            for (value, bin) in out.iter_mut().zip(&self.buffer) {
                *value = bin.norm() * scale;
            }
        }
    }
}

#[cfg(feature = "real-fft")]
mod real_fft {
    use std::sync::Arc;

    use log::warn;
    use realfft::num_complex::Complex;
    use realfft::{RealFftPlanner, RealToComplex};

    pub struct Spectrum {
        fft: Arc<dyn RealToComplex<f32>>,
        input: Vec<f32>,
        output: Vec<Complex<f32>>,
        scratch: Vec<Complex<f32>>,
    }

    impl Spectrum {
        pub fn new(fft_size: usize) -> Self {
            let mut planner = RealFftPlanner::<f32>::new();
            let fft = planner.plan_fft_forward(fft_size);
            Self {
                input: fft.make_input_vec(),
                output: fft.make_output_vec(),
                scratch: fft.make_scratch_vec(),
                fft,
            }
        }

        /// Write `|X[k]| / N` for the first `N / 2` bins into `out`.
        pub fn magnitudes(&mut self, windowed: &[f32], out: &mut [f32]) {
            self.input.copy_from_slice(windowed);
            if let Err(err) =
                self.fft
                    .process_with_scratch(&mut self.input, &mut self.output, &mut self.scratch)
            {
                warn!("spectrum FFT failed: {}", err);
                out.fill(0.0);
                return;
            }
            let scale = 1.0 / windowed.len() as f32;
            for (value, bin) in out.iter_mut().zip(&self.output) {
                *value = bin.norm() * scale;
            }
        }
    }
}

#[cfg(not(feature = "real-fft"))]
use complex_fft::Spectrum;
#[cfg(feature = "real-fft")]
use real_fft::Spectrum;

/// Analyser parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyserOptions {
    pub fft_size: usize,
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
    /// Build per-channel analysers next to the main one.
    pub split_channels: bool,
}

impl Default for AnalyserOptions {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            smoothing: DEFAULT_SMOOTHING,
            min_decibels: DEFAULT_MIN_DECIBELS,
            max_decibels: DEFAULT_MAX_DECIBELS,
            split_channels: true,
        }
    }
}

/// Reject sizes that are not a power of two in `[32, 32768]`.
pub fn validate_fft_size(size: usize) -> Result<usize, AnalysisError> {
    if size.is_power_of_two() && (MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&size) {
        Ok(size)
    } else {
        Err(AnalysisError::InvalidFftSize(size))
    }
}

/// Blackman window of `size` points.
pub fn blackman_window(size: usize) -> Vec<f32> {
    let a0 = (1.0 - BLACKMAN_ALPHA) / 2.0;
    let a1 = 0.5;
    let a2 = BLACKMAN_ALPHA / 2.0;
    let n = size as f32;
    (0..size)
        .map(|i| {
            let x = i as f32 / n;
            a0 - a1 * (2.0 * std::f32::consts::PI * x).cos()
                + a2 * (4.0 * std::f32::consts::PI * x).cos()
        })
        .collect()
}

/// Frequency analyser reading one channel selection of a tap.
pub struct Analyser {
    tap: SampleTap,
    select: ChannelSelect,
    fft_size: usize,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    window: Vec<f32>,
    time_domain: Vec<f32>,
    windowed: Vec<f32>,
    magnitudes: Vec<f32>,
    smoothed: Vec<f32>,
    spectrum: Spectrum,
    analysed_at: Option<u64>,
}

impl Analyser {
    pub fn new(
        tap: SampleTap,
        select: ChannelSelect,
        options: AnalyserOptions,
    ) -> Result<Self, AnalysisError> {
        let fft_size = validate_fft_size(options.fft_size)?;
        check_decibel_range(options.min_decibels, options.max_decibels)?;
        let mut analyser = Self {
            tap,
            select,
            fft_size,
            smoothing: options.smoothing.clamp(0.0, 1.0),
            min_decibels: options.min_decibels,
            max_decibels: options.max_decibels,
            window: Vec::new(),
            time_domain: Vec::new(),
            windowed: Vec::new(),
            magnitudes: Vec::new(),
            smoothed: Vec::new(),
            spectrum: Spectrum::new(fft_size),
            analysed_at: None,
        };
        analyser.allocate();
        Ok(analyser)
    }

    fn allocate(&mut self) {
        let bins = self.fft_size / 2;
        self.window = blackman_window(self.fft_size);
        self.time_domain = vec![0.0; self.fft_size];
        self.windowed = vec![0.0; self.fft_size];
        self.magnitudes = vec![0.0; bins];
        self.smoothed = vec![0.0; bins];
        self.spectrum = Spectrum::new(self.fft_size);
        self.analysed_at = None;
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn sample_rate(&self) -> u32 {
        self.tap.sample_rate()
    }

    pub fn select(&self) -> ChannelSelect {
        self.select
    }

    pub fn min_decibels(&self) -> f32 {
        self.min_decibels
    }

    pub fn max_decibels(&self) -> f32 {
        self.max_decibels
    }

    pub fn smoothing(&self) -> f32 {
        self.smoothing
    }

    /// Centre frequency of `bin` in Hz.
    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.sample_rate() as f32 / self.fft_size as f32
    }

    /// Change the FFT size. Smoothing history is discarded.
    pub fn set_fft_size(&mut self, size: usize) -> Result<(), AnalysisError> {
        let size = validate_fft_size(size)?;
        if size != self.fft_size {
            self.fft_size = size;
            self.allocate();
        }
        Ok(())
    }

    pub fn set_smoothing(&mut self, smoothing: f32) {
        self.smoothing = if smoothing.is_finite() {
            smoothing.clamp(0.0, 1.0)
        } else {
            DEFAULT_SMOOTHING
        };
    }

    pub fn set_decibel_range(&mut self, min: f32, max: f32) -> Result<(), AnalysisError> {
        check_decibel_range(min, max)?;
        self.min_decibels = min;
        self.max_decibels = max;
        Ok(())
    }

    /// Latest samples in `[-1, 1]`, newest last.
    pub fn get_float_time_domain_data(&mut self, out: &mut [f32]) {
        let len = out.len().min(self.fft_size);
        self.tap.read_latest(self.select, &mut self.time_domain);
        let start = self.fft_size - len;
        out[..len].copy_from_slice(&self.time_domain[start..]);
        out[len..].fill(0.0);
    }

    /// Latest samples as bytes, `128` being silence.
    pub fn get_byte_time_domain_data(&mut self, out: &mut [u8]) {
        self.tap.read_latest(self.select, &mut self.time_domain);
        let len = out.len().min(self.fft_size);
        let start = self.fft_size - len;
        for (byte, &sample) in out.iter_mut().zip(&self.time_domain[start..]) {
            *byte = (128.0 * (1.0 + sample)).floor().clamp(0.0, 255.0) as u8;
        }
        out[len..].fill(128);
    }

    /// Smoothed spectrum in decibels.
    pub fn get_float_frequency_data(&mut self, out: &mut [f32]) {
        self.analyse();
        for (value, &magnitude) in out.iter_mut().zip(&self.smoothed) {
            *value = linear_to_db(magnitude);
        }
        let len = out.len().min(self.smoothed.len());
        out[len..].fill(f32::NEG_INFINITY);
    }

    /// Smoothed spectrum mapped onto `[0, 255]` between the decibel bounds.
    pub fn get_byte_frequency_data(&mut self, out: &mut [u8]) {
        self.analyse();
        let range = self.max_decibels - self.min_decibels;
        for (byte, &magnitude) in out.iter_mut().zip(&self.smoothed) {
            let db = linear_to_db(magnitude);
            let scaled = (255.0 / range) * (db - self.min_decibels);
            *byte = if scaled.is_finite() {
                scaled.floor().clamp(0.0, 255.0) as u8
            } else {
                0
            };
        }
        let len = out.len().min(self.smoothed.len());
        out[len..].fill(0);
    }

    /// Recompute the smoothed spectrum when new samples arrived.
    fn analyse(&mut self) {
        let written = self.tap.frames_written();
        if self.analysed_at == Some(written) {
            return;
        }
        self.analysed_at = Some(written);

        self.tap.read_latest(self.select, &mut self.time_domain);
        for ((out, &sample), &weight) in self
            .windowed
            .iter_mut()
            .zip(&self.time_domain)
            .zip(&self.window)
        {
            *out = sample * weight;
        }
        self.spectrum
            .magnitudes(&self.windowed, &mut self.magnitudes);

        let tau = self.smoothing;
        for (smoothed, &magnitude) in self.smoothed.iter_mut().zip(&self.magnitudes) {
            let next = tau * *smoothed + (1.0 - tau) * magnitude;
            *smoothed = if next.is_finite() {
                next
            } else {
                warn!("non-finite spectrum value; resetting bin");
                0.0
            };
        }
    }
}

impl std::fmt::Debug for Analyser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyser")
            .field("select", &self.select)
            .field("fft_size", &self.fft_size)
            .field("smoothing", &self.smoothing)
            .field("min_decibels", &self.min_decibels)
            .field("max_decibels", &self.max_decibels)
            .finish()
    }
}

fn check_decibel_range(min: f32, max: f32) -> Result<(), AnalysisError> {
    if min.is_finite() && max.is_finite() && min < max {
        Ok(())
    } else {
        Err(AnalysisError::InvalidDecibelRange { min, max })
    }
}

fn linear_to_db(value: f32) -> f32 {
    if value > 0.0 {
        20.0 * value.log10()
    } else {
        f32::NEG_INFINITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_tap(frequency: f32, sample_rate: u32, frames: usize) -> SampleTap {
        let tap = SampleTap::new(1, sample_rate);
        tap.attach();
        let samples: Vec<f32> = (0..frames)
            .map(|i| {
                (2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate as f32).sin()
            })
            .collect();
        tap.write(&samples);
        tap
    }

    #[test]
    fn rejects_invalid_fft_sizes() {
        assert!(validate_fft_size(2048).is_ok());
        assert!(validate_fft_size(16).is_err());
        assert!(validate_fft_size(65_536).is_err());
        assert!(validate_fft_size(1000).is_err());
    }

    #[test]
    fn sine_peaks_in_expected_bin() {
        let sample_rate = 44_100;
        let options = AnalyserOptions {
            smoothing: 0.0,
            ..AnalyserOptions::default()
        };
        let tap = sine_tap(1_000.0, sample_rate, 4096);
        let mut analyser = Analyser::new(tap, ChannelSelect::Mix, options).unwrap();
        let mut spectrum = vec![0.0_f32; analyser.frequency_bin_count()];
        analyser.get_float_frequency_data(&mut spectrum);

        let peak = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(bin, _)| bin)
            .unwrap();
        let expected = (1_000.0 * 2048.0 / sample_rate as f32).round() as usize;
        assert!(peak.abs_diff(expected) <= 1, "peak {} expected {}", peak, expected);
    }

    #[test]
    fn silence_maps_to_zero_bytes_and_midline() {
        let tap = SampleTap::new(1, 44_100);
        tap.attach();
        tap.write(&[0.0; 2048]);
        let mut analyser = Analyser::new(tap, ChannelSelect::Mix, AnalyserOptions::default()).unwrap();

        let mut bytes = vec![1_u8; 1024];
        analyser.get_byte_frequency_data(&mut bytes);
        assert!(bytes.iter().all(|&b| b == 0));

        let mut wave = vec![0_u8; 2048];
        analyser.get_byte_time_domain_data(&mut wave);
        assert!(wave.iter().all(|&b| b == 128));
    }

    #[test]
    fn smoothing_blends_with_previous_frame() {
        let tap = sine_tap(440.0, 44_100, 2048);
        let options = AnalyserOptions {
            smoothing: 0.5,
            ..AnalyserOptions::default()
        };
        let mut analyser = Analyser::new(tap.clone(), ChannelSelect::Mix, options).unwrap();
        let mut first = vec![0.0_f32; 1024];
        analyser.get_float_frequency_data(&mut first);

        tap.write(&[0.0; 2048]);
        let mut second = vec![0.0_f32; 1024];
        analyser.get_float_frequency_data(&mut second);

        let bin = (440.0_f32 * 2048.0 / 44_100.0).round() as usize;
        // Half of the previous magnitude survives: about -6 dB.
        assert!((first[bin] - second[bin] - 6.02).abs() < 0.1);
    }

    #[test]
    fn fft_size_change_resizes_bins() {
        let tap = SampleTap::new(1, 44_100);
        let mut analyser = Analyser::new(tap, ChannelSelect::Mix, AnalyserOptions::default()).unwrap();
        analyser.set_fft_size(512).unwrap();
        assert_eq!(analyser.frequency_bin_count(), 256);
        assert!(matches!(
            analyser.set_fft_size(300),
            Err(AnalysisError::InvalidFftSize(300))
        ));
        assert_eq!(analyser.fft_size(), 512);
    }
}
