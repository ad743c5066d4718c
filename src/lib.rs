//! # Tonearm
//!
//! Core audio playback engine with gapless transitions, equal-power
//! crossfading, a 10-band equalizer and ReplayGain loudness normalization.
//!
//! **Purpose:** Turn a file path into sample-accurate output. Decoding
//! happens ahead of time on the control thread (symphonia first, a bounded
//! ffmpeg transcode as fallback); the audio callback only pulls already
//! decoded samples through the stream pipeline.
//!
//! **Architecture:** One [`playback::AudioEngine`] trait over two backend
//! variants (cpal and rodio), dispensed by [`playback::EngineFactory`].
//! The owning service supplies what to play; the engine reports when a
//! track ends and what, if anything, it auto-advanced to.

pub mod audio;
pub mod config;
pub mod dsp;
pub mod error;
pub mod playback;

pub use config::PlayerConfig;
pub use error::{Error, Result};
pub use playback::{
    AudioEngine, CpalEngine, EndReason, EngineCapabilities, EngineFactory, PlaybackEndInfo,
    PlaybackState, RodioEngine,
};
