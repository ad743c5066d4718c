//! Playback engines and the stream pipeline
//!
//! The [`engine::AudioEngine`] trait is the public control surface; the
//! [`factory::EngineFactory`] hands out whichever variant the runtime
//! environment supports.

pub mod cpal_engine;
pub mod engine;
pub mod factory;
pub mod rodio_engine;
pub mod state;
pub mod stream;

pub use cpal_engine::CpalEngine;
pub use engine::{AudioEngine, EndCallback, ErrorCallback};
pub use factory::{EngineFactory, PRIORITY_ORDER};
pub use rodio_engine::RodioEngine;
pub use state::{EndReason, EngineCapabilities, PlaybackEndInfo, PlaybackState};
pub use stream::{effective_gain, equal_power_gains, PreloadSlot, ReplayGain, StreamSource, StreamState};
