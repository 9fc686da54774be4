//! Player configuration.

use std::fmt::{Display, Formatter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{
    BUFFERING_DEBOUNCE_MS, DEFAULT_VOLUME, DURATION_REPOLL_MS, MAX_LOAD_RETRIES,
    MIN_COUNTED_PLAY_SECS, RETRY_DELAY_MS, SUPPRESSION_WINDOW_MS,
};

/// Serialized configuration for a [`super::Player`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Keep playing while the page is hidden.
    #[serde(alias = "background_playback")]
    pub allow_background_playback: bool,
    /// Surface debounced buffering through the store.
    pub show_buffering_indicator: bool,
    #[serde(alias = "retries")]
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub buffering_debounce_ms: u64,
    /// Window after a seek, play click or visibility restore during which
    /// buffering stays hidden.
    #[serde(alias = "suppression_ms")]
    pub suppression_window_ms: u64,
    pub duration_repoll_ms: u64,
    /// Listening time a session needs before it counts as a play.
    pub min_counted_play_secs: f64,
    #[serde(alias = "volume")]
    pub initial_volume: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            allow_background_playback: true,
            show_buffering_indicator: false,
            max_retries: MAX_LOAD_RETRIES,
            retry_delay_ms: RETRY_DELAY_MS,
            buffering_debounce_ms: BUFFERING_DEBOUNCE_MS,
            suppression_window_ms: SUPPRESSION_WINDOW_MS,
            duration_repoll_ms: DURATION_REPOLL_MS,
            min_counted_play_secs: MIN_COUNTED_PLAY_SECS,
            initial_volume: DEFAULT_VOLUME,
        }
    }
}

impl PlayerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: PlayerConfig = serde_json::from_str(json).map_err(ConfigError::Parse)?;
        Ok(config.sanitized())
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json_str(&text)
    }

    /// Clamp out-of-range values back to usable ones.
    pub fn sanitized(mut self) -> Self {
        if !self.initial_volume.is_finite() {
            self.initial_volume = DEFAULT_VOLUME;
        }
        self.initial_volume = self.initial_volume.clamp(0.0, 1.0);
        if !self.min_counted_play_secs.is_finite() || self.min_counted_play_secs < 0.0 {
            self.min_counted_play_secs = MIN_COUNTED_PLAY_SECS;
        }
        self
    }
}

/// Failure to read a configuration file.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "failed to read config: {}", err),
            ConfigError::Parse(err) => write!(f, "invalid config: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::Parse(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = PlayerConfig::from_json_str(r#"{"retries": 5}"#).unwrap();
        assert_eq!(config.max_retries, 5);
        assert!(config.allow_background_playback);
        assert!(!config.show_buffering_indicator);
        assert_eq!(config.retry_delay_ms, 1000);
    }

    #[test]
    fn out_of_range_volume_is_clamped() {
        let config = PlayerConfig::from_json_str(r#"{"volume": 3.0}"#).unwrap();
        assert_eq!(config.initial_volume, 1.0);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            PlayerConfig::from_json_str("{"),
            Err(ConfigError::Parse(_))
        ));
    }
}
