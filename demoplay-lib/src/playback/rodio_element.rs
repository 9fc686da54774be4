//! Media element backed by a rodio output stream.

use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::thread;
use std::time::Duration;

use log::{debug, error, warn};
use rodio::source::SeekError;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};

use crate::analysis::SampleTap;

use super::media::{MediaElement, MediaErrorCode, MediaEvent, PlayError, PlayErrorKind, TapError};

const OUTPUT_STREAM_OPEN_RETRIES: usize = 20;
const OUTPUT_STREAM_OPEN_RETRY_MS: u64 = 100;
const TAP_FLUSH_SAMPLES: usize = 1024;

/// Local-file media element playing through the default output device.
///
/// Loading is synchronous: `load` decodes the header, queues the source on a
/// paused sink and reports metadata and readiness in one batch. Progress and
/// the end of the stream are detected while polling.
pub struct RodioElement {
    _stream: OutputStream,
    sink: Sink,
    source: Option<String>,
    events: VecDeque<MediaEvent>,
    tap: SampleTap,
    total_duration: Option<Duration>,
    loaded: bool,
    load_error: Option<MediaErrorCode>,
    paused: bool,
    ended: bool,
    volume: f32,
    muted: bool,
    pending_start: Option<Duration>,
}

impl RodioElement {
    /// Open the default output stream, retrying briefly while the device settles.
    pub fn open_default() -> Result<Self, rodio::StreamError> {
        let stream = open_output_stream_with_retry()?;
        let sink = Sink::connect_new(stream.mixer());
        sink.pause();
        Ok(Self {
            _stream: stream,
            sink,
            source: None,
            events: VecDeque::new(),
            tap: SampleTap::new(2, crate::constants::SAMPLE_RATE),
            total_duration: None,
            loaded: false,
            load_error: None,
            paused: true,
            ended: false,
            volume: 1.0,
            muted: false,
            pending_start: None,
        })
    }

    fn apply_volume(&self) {
        let gain = if self.muted { 0.0 } else { self.volume };
        self.sink.set_volume(gain);
    }

    fn fail_load(&mut self, code: MediaErrorCode) {
        self.loaded = false;
        self.load_error = Some(code);
        self.events.push_back(MediaEvent::Error(code));
    }
}

fn open_output_stream_with_retry() -> Result<OutputStream, rodio::StreamError> {
    let mut attempt = 1;
    loop {
        match OutputStreamBuilder::open_default_stream() {
            Ok(stream) => return Ok(stream),
            Err(err) if attempt < OUTPUT_STREAM_OPEN_RETRIES => {
                warn!(
                    "open_default_stream attempt {}/{} failed: {}",
                    attempt, OUTPUT_STREAM_OPEN_RETRIES, err
                );
                attempt += 1;
                thread::sleep(Duration::from_millis(OUTPUT_STREAM_OPEN_RETRY_MS));
            }
            Err(err) => {
                error!(
                    "failed to open default output stream after {} attempts: {}",
                    OUTPUT_STREAM_OPEN_RETRIES, err
                );
                return Err(err);
            }
        }
    }
}

fn local_path(url: &str) -> Option<&str> {
    if url.starts_with("http://") || url.starts_with("https://") {
        return None;
    }
    Some(url.strip_prefix("file://").unwrap_or(url))
}

impl MediaElement for RodioElement {
    fn set_source(&mut self, url: &str) {
        self.sink.clear();
        self.source = Some(url.to_string());
        self.loaded = false;
        self.load_error = None;
        self.ended = false;
        self.paused = true;
        self.total_duration = None;
        self.pending_start = None;
        self.events.clear();
        self.tap.clear();
    }

    fn clear_source(&mut self) {
        self.sink.clear();
        self.source = None;
        self.loaded = false;
        self.load_error = None;
        self.ended = false;
        self.paused = true;
        self.total_duration = None;
        self.events.clear();
        self.tap.clear();
    }

    fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn load(&mut self) {
        let Some(url) = self.source.clone() else {
            return;
        };
        self.sink.clear();
        self.loaded = false;
        self.load_error = None;
        self.ended = false;
        self.paused = true;
        self.events.push_back(MediaEvent::LoadStart);

        let Some(path) = local_path(&url) else {
            warn!("remote sources are not supported: {}", url);
            self.fail_load(MediaErrorCode::SrcNotSupported);
            return;
        };
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) => {
                warn!("failed to open {}: {}", path, err);
                self.fail_load(MediaErrorCode::Network);
                return;
            }
        };
        let decoder = match Decoder::new(BufReader::new(file)) {
            Ok(decoder) => decoder,
            Err(err) => {
                warn!("failed to decode {}: {}", path, err);
                self.fail_load(MediaErrorCode::SrcNotSupported);
                return;
            }
        };

        self.total_duration = decoder.total_duration();
        self.tap.set_format(decoder.channels(), decoder.sample_rate());
        self.sink.append(TapSource::new(decoder, self.tap.clone()));
        self.sink.pause();
        self.apply_volume();
        self.loaded = true;

        if let Some(start) = self.pending_start.take() {
            if let Err(err) = self.sink.try_seek(start) {
                warn!("failed to restore position {:?}: {}", start, err);
            }
        }
        debug!(
            "loaded {} ({} ch, {} Hz, {:?})",
            path,
            self.tap.channels(),
            self.tap.sample_rate(),
            self.total_duration
        );
        self.events.push_back(MediaEvent::LoadedMetadata);
        self.events.push_back(MediaEvent::DurationChange);
        self.events.push_back(MediaEvent::CanPlay);
    }

    fn play(&mut self) -> Result<(), PlayError> {
        if self.source.is_none() {
            return Err(PlayError::new(PlayErrorKind::Unknown, "no source"));
        }
        if self.load_error == Some(MediaErrorCode::SrcNotSupported) {
            return Err(PlayError::new(
                PlayErrorKind::FormatUnsupported,
                "source cannot be decoded",
            ));
        }
        if !self.loaded || self.ended {
            self.load();
            if !self.loaded {
                return Err(PlayError::new(
                    PlayErrorKind::Unknown,
                    "source failed to load",
                ));
            }
        }
        if self.paused {
            self.sink.play();
            self.paused = false;
            self.events.push_back(MediaEvent::Play);
            self.events.push_back(MediaEvent::Playing);
        }
        Ok(())
    }

    fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.sink.pause();
        self.paused = true;
        self.events.push_back(MediaEvent::Pause);
    }

    fn paused(&self) -> bool {
        self.paused
    }

    fn ended(&self) -> bool {
        self.ended
    }

    fn current_time(&self) -> f64 {
        if self.ended {
            return self
                .total_duration
                .map(|duration| duration.as_secs_f64())
                .unwrap_or(0.0);
        }
        if !self.loaded {
            return self
                .pending_start
                .map(|start| start.as_secs_f64())
                .unwrap_or(0.0);
        }
        self.sink.get_pos().as_secs_f64()
    }

    fn set_current_time(&mut self, time: f64) {
        let target = Duration::from_secs_f64(if time.is_finite() { time.max(0.0) } else { 0.0 });
        if !self.loaded || self.ended {
            self.pending_start = Some(target);
            return;
        }
        self.events.push_back(MediaEvent::Seeking);
        if let Err(err) = self.sink.try_seek(target) {
            warn!("seek to {:?} failed: {}", target, err);
        }
        self.events.push_back(MediaEvent::Seeked);
    }

    fn duration(&self) -> f64 {
        self.total_duration
            .map(|duration| duration.as_secs_f64())
            .unwrap_or(f64::NAN)
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        self.apply_volume();
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.apply_volume();
    }

    fn poll_events(&mut self) -> Vec<MediaEvent> {
        if self.loaded && !self.paused && !self.ended {
            if self.sink.empty() {
                self.ended = true;
                self.paused = true;
                self.events.push_back(MediaEvent::Pause);
                self.events.push_back(MediaEvent::Ended);
            } else {
                self.events.push_back(MediaEvent::TimeUpdate);
            }
        }
        self.events.drain(..).collect()
    }

    fn open_tap(&mut self) -> Result<SampleTap, TapError> {
        if let Some(url) = self.source.as_deref() {
            if local_path(url).is_none() {
                return Err(TapError::CrossOrigin(url.to_string()));
            }
        }
        self.tap.attach();
        Ok(self.tap.clone())
    }
}

/// Pass-through source that copies decoded samples into a [`SampleTap`].
pub struct TapSource<S> {
    inner: S,
    tap: SampleTap,
    pending: Vec<f32>,
    channels: usize,
}

impl<S: Source> TapSource<S> {
    pub fn new(inner: S, tap: SampleTap) -> Self {
        let channels = inner.channels().max(1) as usize;
        Self {
            inner,
            tap,
            pending: Vec::with_capacity(TAP_FLUSH_SAMPLES),
            channels,
        }
    }

    fn flush(&mut self) {
        if !self.pending.is_empty() {
            self.tap.write(&self.pending);
            self.pending.clear();
        }
    }
}

impl<S: Source> Iterator for TapSource<S> {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.next() {
            Some(sample) => {
                self.pending.push(sample);
                if self.pending.len() >= TAP_FLUSH_SAMPLES
                    && self.pending.len() % self.channels == 0
                {
                    self.flush();
                }
                Some(sample)
            }
            None => {
                self.flush();
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<S: Source> Source for TapSource<S> {
    fn current_span_len(&self) -> Option<usize> {
        self.inner.current_span_len()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }

    fn try_seek(&mut self, pos: Duration) -> Result<(), SeekError> {
        self.pending.clear();
        self.inner.try_seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use rodio::buffer::SamplesBuffer;

    use super::*;

    #[test]
    fn tap_source_forwards_and_copies_samples() {
        let tap = SampleTap::new(2, 44_100);
        tap.attach();
        let samples: Vec<f32> = (0..4096).map(|i| (i % 7) as f32 / 7.0).collect();
        let source = TapSource::new(SamplesBuffer::new(2, 44_100, samples.clone()), tap.clone());
        let forwarded: Vec<f32> = source.collect();
        assert_eq!(forwarded, samples);
        assert_eq!(tap.frames_written(), 2048);
    }

    #[test]
    fn remote_urls_have_no_local_path() {
        assert_eq!(local_path("https://cdn.example/a.mp3"), None);
        assert_eq!(local_path("file:///tmp/a.wav"), Some("/tmp/a.wav"));
        assert_eq!(local_path("song.flac"), Some("song.flac"));
    }
}
