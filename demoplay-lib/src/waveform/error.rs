use std::fmt::{Display, Formatter};

use crate::decode::DecodeError;

/// Error type for waveform extraction and cache IO.
#[derive(Debug)]
pub enum WaveformError {
    Io(std::io::Error),
    Decode(DecodeError),
    Parse(serde_json::Error),
    InvalidData(String),
}

impl Display for WaveformError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {}", err),
            Self::Decode(err) => write!(f, "decode error: {}", err),
            Self::Parse(err) => write!(f, "invalid waveform json: {}", err),
            Self::InvalidData(err) => write!(f, "invalid waveform data: {}", err),
        }
    }
}

impl std::error::Error for WaveformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Decode(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<std::io::Error> for WaveformError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<DecodeError> for WaveformError {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

impl From<serde_json::Error> for WaveformError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}
