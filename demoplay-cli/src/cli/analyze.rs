//! `demoplay analyze`: offline stereo level and loudness report.

use std::path::Path;

use clap::ArgMatches;
use demoplay_lib::decode::{decode_file, DecodedAudio};
use demoplay_lib::visualizer::{rms, rms_to_db, LoudnessMeter, StereoMeterVisualizer, VisualizerSettings};
use serde::Serialize;

use crate::error::CliError;

/// Summary printed by the analyze command.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub file: String,
    pub channels: usize,
    pub sample_rate: u32,
    pub duration_secs: f64,
    pub peak_db: [f32; 2],
    pub rms_db: [f32; 2],
    /// Highest display level the stereo meter reached, in `[0, 1]`.
    pub meter_peak: [f32; 2],
    pub max_momentary_lufs: Option<f32>,
    pub integrated_lufs: Option<f32>,
    pub blocks: usize,
}

fn finite(value: f32) -> Option<f32> {
    value.is_finite().then_some(value)
}

/// Walk `audio` in blocks of `block_frames` and collect levels.
pub fn analyse(audio: &DecodedAudio, settings: &VisualizerSettings, file: &str) -> AnalysisReport {
    let channels = audio.channels.max(1);
    let block_frames = settings.fft_size.max(1);
    // Integrated loudness covers the whole file.
    let mut loudness = LoudnessMeter::new(
        audio.frames() / block_frames + 1,
        settings.loudness.silence_floor_db,
    );
    let mut meter = StereoMeterVisualizer::new(settings.meter.clone());

    let mut left = Vec::with_capacity(block_frames);
    let mut right = Vec::with_capacity(block_frames);
    let mut mix = Vec::with_capacity(block_frames);
    let mut all_left = Vec::with_capacity(audio.frames());
    let mut all_right = Vec::with_capacity(audio.frames());
    let mut peaks = [0.0_f32; 2];
    let mut meter_peak = [0.0_f32; 2];
    let mut max_momentary = f32::NEG_INFINITY;
    let mut blocks = 0;

    for block in audio.samples.chunks(block_frames * channels) {
        left.clear();
        right.clear();
        mix.clear();
        for frame in block.chunks(channels) {
            let l = frame[0];
            let r = frame[channels.min(2) - 1];
            left.push(l);
            right.push(r);
            mix.push(frame.iter().sum::<f32>() / frame.len() as f32);
            peaks[0] = peaks[0].max(l.abs());
            peaks[1] = peaks[1].max(r.abs());
        }
        meter.measure(&left, &right);
        for (held, level) in meter_peak.iter_mut().zip(meter.levels()) {
            *held = held.max(level);
        }
        max_momentary = max_momentary.max(loudness.measure(&mix));
        all_left.extend_from_slice(&left);
        all_right.extend_from_slice(&right);
        blocks += 1;
    }

    AnalysisReport {
        file: file.to_string(),
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        duration_secs: audio.duration_secs(),
        peak_db: [rms_to_db(peaks[0]), rms_to_db(peaks[1])],
        rms_db: [rms_to_db(rms(&all_left)), rms_to_db(rms(&all_right))],
        meter_peak,
        max_momentary_lufs: finite(max_momentary),
        integrated_lufs: loudness.integrated(),
        blocks,
    }
}

fn format_db(value: f32) -> String {
    if value.is_finite() {
        format!("{:.1} dB", value)
    } else {
        "-inf dB".to_string()
    }
}

fn format_lufs(value: Option<f32>) -> String {
    match value {
        Some(value) => format!("{:.1} LUFS", value),
        None => "silent".to_string(),
    }
}

pub fn report_text(report: &AnalysisReport) -> String {
    format!(
        "File:         {}\n\
         Format:       {} ch @ {} Hz, {:.2} s\n\
         Peak:         L {} / R {}\n\
         RMS:          L {} / R {}\n\
         Momentary:    {} (max)\n\
         Integrated:   {}",
        report.file,
        report.channels,
        report.sample_rate,
        report.duration_secs,
        format_db(report.peak_db[0]),
        format_db(report.peak_db[1]),
        format_db(report.rms_db[0]),
        format_db(report.rms_db[1]),
        format_lufs(report.max_momentary_lufs),
        format_lufs(report.integrated_lufs),
    )
}

pub fn run_analyze(matches: &ArgMatches) -> Result<(), CliError> {
    let input = matches
        .get_one::<String>("INPUT")
        .ok_or_else(|| CliError::Usage("missing INPUT".to_string()))?;
    let settings = match matches.get_one::<String>("settings") {
        Some(path) => VisualizerSettings::from_path(path)?,
        None => VisualizerSettings::default(),
    };

    let audio = decode_file(Path::new(input))?;
    let report = analyse(&audio, &settings, input);

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report_text(&report));
    }
    Ok(())
}
