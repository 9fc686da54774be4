use std::fmt::{Display, Formatter};

use demoplay_lib::decode::DecodeError;
use demoplay_lib::playback::ConfigError;
use demoplay_lib::visualizer::SettingsError;
use demoplay_lib::waveform::WaveformError;

/// Failures that end a CLI command.
#[derive(Debug)]
pub enum CliError {
    Io(std::io::Error),
    Decode(DecodeError),
    Waveform(WaveformError),
    Settings(SettingsError),
    Config(ConfigError),
    Audio(String),
    Usage(String),
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {}", err),
            Self::Decode(err) => write!(f, "{}", err),
            Self::Waveform(err) => write!(f, "{}", err),
            Self::Settings(err) => write!(f, "{}", err),
            Self::Config(err) => write!(f, "{}", err),
            Self::Audio(err) => write!(f, "audio output unavailable: {}", err),
            Self::Usage(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<DecodeError> for CliError {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

impl From<WaveformError> for CliError {
    fn from(value: WaveformError) -> Self {
        Self::Waveform(value)
    }
}

impl From<SettingsError> for CliError {
    fn from(value: SettingsError) -> Self {
        Self::Settings(value)
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Usage(format!("failed to encode json: {}", value))
    }
}
