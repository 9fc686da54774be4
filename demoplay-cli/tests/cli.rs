use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

fn write_tone(dir: &Path, name: &str, seconds: f32) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 44_100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    let frames = (44_100.0 * seconds) as usize;
    for index in 0..frames {
        let t = index as f32 / 44_100.0;
        let value = (t * 440.0 * std::f32::consts::TAU).sin() * 0.5;
        let sample = (value * i16::MAX as f32) as i16;
        writer.write_sample(sample).unwrap();
        writer.write_sample(sample / 2).unwrap();
    }
    writer.finalize().unwrap();
    path
}

fn demoplay() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("demoplay"))
}

#[test]
fn settings_prints_default_json() {
    demoplay()
        .arg("settings")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"fft_size\": 2048"))
        .stdout(predicate::str::contains("\"particles\""));
}

#[test]
fn waveform_prints_requested_bins() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_tone(dir.path(), "tone.wav", 0.5);

    let output = demoplay()
        .args(["waveform", path.to_str().unwrap(), "--bins", "32"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let values: Vec<f32> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(values.len(), 32);
    assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn waveform_reuses_the_durable_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().join("cache");
    let path = write_tone(dir.path(), "tone.wav", 0.25);
    let path_arg = path.to_str().unwrap();
    let cache_arg = cache_dir.to_str().unwrap();

    let first = demoplay()
        .args(["waveform", path_arg, "--bins", "16", "--cache-dir", cache_arg])
        .output()
        .unwrap();
    assert!(first.status.success());
    assert_eq!(std::fs::read_dir(&cache_dir).unwrap().count(), 1);

    // The source is gone, so a second answer has to come from the cache.
    std::fs::remove_file(&path).unwrap();
    demoplay()
        .args(["waveform", path_arg, "--bins", "16", "--cache-dir", cache_arg])
        .assert()
        .success()
        .stdout(predicate::eq(String::from_utf8(first.stdout).unwrap()));
}

#[test]
fn analyze_reports_levels_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_tone(dir.path(), "tone.wav", 1.0);

    demoplay()
        .args(["analyze", path.to_str().unwrap(), "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"integrated_lufs\""))
        .stdout(predicate::str::contains("\"sample_rate\": 44100"))
        .stdout(predicate::str::contains("\"channels\": 2"));
}

#[test]
fn analyze_prints_a_text_report() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_tone(dir.path(), "tone.wav", 0.5);

    demoplay()
        .args(["analyze", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Integrated:"))
        .stdout(predicate::str::contains("LUFS"));
}

#[test]
fn missing_file_fails() {
    demoplay()
        .args(["analyze", "does-not-exist.wav"])
        .assert()
        .failure();
    demoplay()
        .args(["play", "--quiet", "does-not-exist.wav"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("file not found"));
}

#[test]
fn no_subcommand_shows_help() {
    demoplay()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}
