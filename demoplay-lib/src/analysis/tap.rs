//! Shared window of recently decoded samples.

use std::sync::{Arc, Mutex};

use dasp_ring_buffer::Bounded;

use crate::constants::MAX_FFT_SIZE;

/// Which channel an analyser reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelSelect {
    /// Average of all channels.
    Mix,
    /// A single channel; indices past the last channel read the last one.
    Channel(usize),
}

struct TapInner {
    channels: usize,
    sample_rate: u32,
    capacity_frames: usize,
    samples: Bounded<Vec<f32>>,
    attached: bool,
    frames_written: u64,
}

impl TapInner {
    fn reset_storage(&mut self) {
        self.samples = Bounded::from(vec![0.0; self.capacity_frames * self.channels]);
    }
}

/// Interleaved ring buffer written by the playback path and read by analysers.
///
/// Writes are dropped while the tap is detached.
#[derive(Clone)]
pub struct SampleTap {
    inner: Arc<Mutex<TapInner>>,
}

impl SampleTap {
    pub fn new(channels: u16, sample_rate: u32) -> Self {
        Self::with_capacity(channels, sample_rate, MAX_FFT_SIZE)
    }

    pub fn with_capacity(channels: u16, sample_rate: u32, capacity_frames: usize) -> Self {
        let channels = channels.max(1) as usize;
        let capacity_frames = capacity_frames.max(1);
        Self {
            inner: Arc::new(Mutex::new(TapInner {
                channels,
                sample_rate,
                capacity_frames,
                samples: Bounded::from(vec![0.0; capacity_frames * channels]),
                attached: false,
                frames_written: 0,
            })),
        }
    }

    /// Change the stream layout. Buffered samples are dropped when it differs.
    pub fn set_format(&self, channels: u16, sample_rate: u32) {
        let channels = channels.max(1) as usize;
        let mut inner = self.inner.lock().unwrap();
        if inner.channels != channels || inner.sample_rate != sample_rate {
            inner.channels = channels;
            inner.sample_rate = sample_rate;
            inner.reset_storage();
        }
    }

    pub fn channels(&self) -> usize {
        self.inner.lock().unwrap().channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.lock().unwrap().sample_rate
    }

    /// Total frames accepted since creation.
    pub fn frames_written(&self) -> u64 {
        self.inner.lock().unwrap().frames_written
    }

    pub fn attach(&self) {
        self.inner.lock().unwrap().attached = true;
    }

    /// Stop accepting samples and drop what is buffered.
    pub fn detach(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.attached = false;
        inner.reset_storage();
    }

    pub fn is_attached(&self) -> bool {
        self.inner.lock().unwrap().attached
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().reset_storage();
    }

    /// Append interleaved samples. A trailing partial frame is ignored.
    pub fn write(&self, interleaved: &[f32]) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.attached {
            return;
        }
        let channels = inner.channels;
        let whole = interleaved.len() - interleaved.len() % channels;
        for &sample in &interleaved[..whole] {
            inner.samples.push(sample);
        }
        inner.frames_written += (whole / channels) as u64;
    }

    /// Copy the newest `out.len()` frames of `select` into `out`.
    ///
    /// When fewer frames are buffered the front of `out` is zero-filled so
    /// the newest sample always lands at the end.
    pub fn read_latest(&self, select: ChannelSelect, out: &mut [f32]) {
        let inner = self.inner.lock().unwrap();
        let channels = inner.channels;
        let available = inner.samples.len() / channels;
        let take = out.len().min(available);
        let pad = out.len() - take;
        out.fill(0.0);

        let skip = (available - take) * channels;
        let scale = 1.0 / channels as f32;
        for (index, &sample) in inner.samples.iter().skip(skip).enumerate() {
            let frame = pad + index / channels;
            let channel = index % channels;
            match select {
                ChannelSelect::Mix => out[frame] += sample * scale,
                ChannelSelect::Channel(wanted) => {
                    if channel == wanted.min(channels - 1) {
                        out[frame] = sample;
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for SampleTap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("SampleTap")
            .field("channels", &inner.channels)
            .field("sample_rate", &inner.sample_rate)
            .field("attached", &inner.attached)
            .field("frames_written", &inner.frames_written)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_tap_ignores_writes() {
        let tap = SampleTap::new(1, 48_000);
        tap.write(&[1.0; 16]);
        assert_eq!(tap.frames_written(), 0);
        tap.attach();
        tap.write(&[1.0; 16]);
        assert_eq!(tap.frames_written(), 16);
    }

    #[test]
    fn latest_frames_are_right_aligned() {
        let tap = SampleTap::with_capacity(2, 44_100, 8);
        tap.attach();
        tap.write(&[0.1, -0.1, 0.2, -0.2, 0.3, -0.3]);

        let mut left = [9.0; 4];
        tap.read_latest(ChannelSelect::Channel(0), &mut left);
        assert_eq!(left, [0.0, 0.1, 0.2, 0.3]);

        let mut right = [9.0; 2];
        tap.read_latest(ChannelSelect::Channel(1), &mut right);
        assert_eq!(right, [-0.2, -0.3]);

        let mut mix = [9.0; 3];
        tap.read_latest(ChannelSelect::Mix, &mut mix);
        assert!(mix.iter().all(|value| value.abs() < 1e-6));
    }

    #[test]
    fn ring_keeps_only_newest_frames() {
        let tap = SampleTap::with_capacity(1, 44_100, 4);
        tap.attach();
        tap.write(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let mut out = [0.0; 4];
        tap.read_latest(ChannelSelect::Mix, &mut out);
        assert_eq!(out, [3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn format_change_drops_buffer() {
        let tap = SampleTap::with_capacity(2, 44_100, 4);
        tap.attach();
        tap.write(&[1.0, 1.0]);
        tap.set_format(1, 44_100);
        let mut out = [5.0; 2];
        tap.read_latest(ChannelSelect::Mix, &mut out);
        assert_eq!(out, [0.0, 0.0]);
    }
}
