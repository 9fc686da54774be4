//! # demoplay
//!
//! Playback and visualization core for streamed music demos.
//!
//! The crate is split into a playback state machine that drives a single
//! media element ([`playback`]), an analysis graph that taps the element's
//! decoded samples ([`analysis`]), a set of visualizer engines that render
//! those samples into pixel surfaces ([`visualizer`]) and the shared frame
//! loop that drives them ([`scheduler`]). Waveform previews and their cache
//! live in [`waveform`].

pub mod analysis;
pub mod clock;
pub mod constants;
pub mod decode;
pub mod playback;
pub mod scheduler;
pub mod testing;
pub mod visualizer;
pub mod waveform;
