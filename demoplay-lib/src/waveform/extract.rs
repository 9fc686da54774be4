use std::path::Path;

use log::debug;

use crate::decode::decode_file;

use super::WaveformError;

/// Reduce interleaved samples to `bins` amplitude values in `[0, 1]`.
///
/// Each bin is the mean absolute amplitude of its frames across all
/// channels; the result is normalized so the loudest bin is `1.0`. Silence
/// yields all zeros.
///
/// # Arguments
///
/// * `samples` - Interleaved samples.
/// * `channels` - Channels per frame.
/// * `bins` - Number of output values.
pub fn waveform_from_samples(samples: &[f32], channels: usize, bins: usize) -> Vec<f32> {
    if bins == 0 {
        return Vec::new();
    }
    let channels = channels.max(1);
    let frames = samples.len() / channels;
    let mut out = vec![0.0f32; bins];
    if frames == 0 {
        return out;
    }

    for (bin, value) in out.iter_mut().enumerate() {
        let start = bin * frames / bins;
        let end = ((bin + 1) * frames / bins).max(start + 1).min(frames);
        if start >= end {
            continue;
        }
        let slice = &samples[start * channels..end * channels];
        let sum: f32 = slice
            .iter()
            .filter(|sample| sample.is_finite())
            .map(|sample| sample.abs())
            .sum();
        *value = sum / slice.len() as f32;
    }

    let max = out.iter().cloned().fold(0.0f32, f32::max);
    if max > 0.0 {
        for value in out.iter_mut() {
            *value = (*value / max).clamp(0.0, 1.0);
        }
    }
    out
}

/// Decode `path` and compute its waveform preview.
pub fn extract_waveform(path: &Path, bins: usize) -> Result<Vec<f32>, WaveformError> {
    let audio = decode_file(path)?;
    if audio.frames() == 0 {
        return Err(WaveformError::InvalidData(format!(
            "{} contains no audio frames",
            path.display()
        )));
    }
    debug!(
        "extracting {} waveform bins from {} frames",
        bins,
        audio.frames()
    );
    Ok(waveform_from_samples(&audio.samples, audio.channels, bins))
}
