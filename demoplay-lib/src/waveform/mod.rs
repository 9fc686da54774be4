//! Waveform previews and their cache.
//!
//! A preview is a fixed number of amplitude bins in `[0, 1]` computed from a
//! decoded file. Previews are cached per URL in memory and, best effort, in
//! a durable store keyed `"waveform_" + url`.

mod cache;
mod error;
mod extract;

pub use cache::{cache_key, DurableStore, FileStore, MemoryStore, WaveformCache};
pub use error::WaveformError;
pub use extract::{extract_waveform, waveform_from_samples};

/// Default number of bins in a waveform preview.
pub const DEFAULT_WAVEFORM_BINS: usize = 200;
