//! `demoplay waveform`: print the preview bins of a file.

use std::path::Path;

use clap::ArgMatches;
use demoplay_lib::waveform::{extract_waveform, FileStore, WaveformCache};
use log::info;

use crate::error::CliError;

pub fn run_waveform(matches: &ArgMatches) -> Result<(), CliError> {
    let input = matches
        .get_one::<String>("INPUT")
        .ok_or_else(|| CliError::Usage("missing INPUT".to_string()))?;
    let bins = *matches.get_one::<usize>("bins").unwrap_or(&200);
    if bins == 0 {
        return Err(CliError::Usage("--bins must be at least 1".to_string()));
    }

    let cache = match matches.get_one::<String>("cache-dir") {
        Some(dir) => WaveformCache::with_store(Box::new(FileStore::new(dir)?)),
        None => WaveformCache::in_memory(),
    };

    // The key carries the bin count so different resolutions do not collide.
    let key = format!("{}#{}", input, bins);
    let values = cache.get_or_compute(&key, || extract_waveform(Path::new(input), bins))?;
    info!("waveform for {}: {} bins", input, values.len());

    println!("{}", serde_json::to_string(&values)?);
    Ok(())
}
