//! Symphonia helpers for opening and fully decoding audio files.

use std::fmt::{Display, Formatter};
use std::path::Path;

use log::warn;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Error type for file decoding.
#[derive(Debug)]
pub enum DecodeError {
    Io(std::io::Error),
    Unsupported(String),
    NoTrack,
    Decode(String),
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {}", err),
            Self::Unsupported(err) => write!(f, "unsupported format: {}", err),
            Self::NoTrack => write!(f, "no decodable audio track"),
            Self::Decode(err) => write!(f, "decode error: {}", err),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<Error> for DecodeError {
    fn from(value: Error) -> Self {
        match value {
            Error::IoError(err) => Self::Io(err),
            Error::Unsupported(what) => Self::Unsupported(what.to_string()),
            other => Self::Decode(other.to_string()),
        }
    }
}

/// Interleaved `f32` samples of a whole file.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub channels: usize,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Detect the container of a file and return its format reader.
pub fn open_reader(path: &Path) -> Result<Box<dyn FormatReader>, DecodeError> {
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let detected = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    Ok(detected.format)
}

fn open_decoder(format: &dyn FormatReader) -> Result<(u32, Box<dyn Decoder>), DecodeError> {
    let track = format
        .tracks()
        .iter()
        .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;
    let decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())?;
    Ok((track.id, decoder))
}

/// Decode every packet of the first audio track into interleaved samples.
///
/// Corrupt packets are skipped with a warning; end of stream finishes the
/// decode.
pub fn decode_file(path: &Path) -> Result<DecodedAudio, DecodeError> {
    let mut format = open_reader(path)?;
    let (track_id, mut decoder) = open_decoder(format.as_ref())?;
    let params = decoder.codec_params().clone();

    let mut samples = Vec::new();
    let mut channels = params.channels.map(|c| c.count()).unwrap_or(0);
    let mut sample_rate = params.sample_rate.unwrap_or(0);
    let mut buffer: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(Error::ResetRequired) => {
                return Err(DecodeError::Decode(
                    "decoder reset required mid-stream".to_string(),
                ));
            }
            Err(err) => return Err(err.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                channels = spec.channels.count();
                sample_rate = spec.rate;
                let needed = decoded.capacity() * channels;
                if buffer.as_ref().map_or(true, |buf| buf.capacity() < needed) {
                    buffer = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
                }
                if let Some(buf) = buffer.as_mut() {
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
            }
            Err(Error::DecodeError(err)) => {
                warn!("skipping corrupt packet: {}", err);
            }
            Err(err) => return Err(err.into()),
        }
    }

    if channels == 0 || sample_rate == 0 {
        return Err(DecodeError::Decode(
            "stream did not report channels or sample rate".to_string(),
        ));
    }

    Ok(DecodedAudio {
        samples,
        channels,
        sample_rate,
    })
}
