pub mod analyze;
pub mod args;
pub mod waveform;
