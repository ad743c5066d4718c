//! The engine control surface
//!
//! One trait for every backend variant: required core operations plus a
//! capability query. Operations an engine cannot honor are no-ops (or
//! return `false`) only when the matching capability flag is false — the
//! caller is expected to check the flags, not probe behavior.

use crate::playback::state::{EngineCapabilities, PlaybackEndInfo, PlaybackState};
use std::path::{Path, PathBuf};

/// Invoked when a track finishes, with what (if anything) playback
/// advanced to. Delivered from the control thread during
/// [`AudioEngine::check_if_ended`] polls.
pub type EndCallback = Box<dyn FnMut(&PlaybackEndInfo) + Send>;

/// Invoked with a human-readable message when a load or device failure
/// puts the engine into the `Error` state.
pub type ErrorCallback = Box<dyn FnMut(&str) + Send>;

/// An audio playback engine.
///
/// Engines are driven from a single control thread; concurrent calls on
/// one instance from multiple threads require external synchronization.
/// Failures surface as boolean returns plus the error callback — never as
/// panics across the real-time boundary.
pub trait AudioEngine {
    /// Decode a file and make it the active track. Stops active playback
    /// first. `false` leaves the engine in the `Error` state with the
    /// previous track's resources released.
    fn load(&mut self, path: &Path) -> bool;

    /// Start playing the loaded track, creating the output device on
    /// first use (and recreating it if the track's sample rate differs).
    fn play(&mut self) -> bool;

    /// Pause playback; only acts from `Playing`.
    fn pause(&mut self);

    /// Resume playback; only acts from `Paused`.
    fn resume(&mut self);

    /// Halt the device and release the decoded buffers.
    fn stop(&mut self);

    /// Jump to a position in milliseconds (clamped to the track).
    fn seek(&mut self, position_ms: u64);

    /// Set the playback volume, clamped to `0.0..=1.0`.
    fn set_volume(&mut self, volume: f32);

    /// Current playback volume
    fn volume(&self) -> f32;

    /// Current state machine state
    fn state(&self) -> PlaybackState;

    /// Path of the currently active track, if any
    fn current_track(&self) -> Option<PathBuf>;

    /// Current playback position in milliseconds
    fn position_ms(&self) -> u64;

    /// Total duration of the active track in milliseconds
    fn duration_ms(&self) -> u64;

    /// Non-blocking end-of-track poll, called periodically by the owner.
    ///
    /// Delivers any queued end notifications and returns `true` exactly
    /// once per natural end-of-track (auto-advance notifications are
    /// delivered but return `false` since playback continues). Never
    /// returns `true` while paused.
    fn check_if_ended(&mut self) -> bool;

    /// Preload the next track for gapless/crossfade takeover; `None`
    /// clears the slot. Requires the `gapless` capability.
    fn set_next_track(&mut self, path: Option<&Path>) -> bool;

    /// Set the crossfade duration in milliseconds. Requires the
    /// `crossfade` capability.
    fn set_crossfade_duration(&mut self, duration_ms: u64);

    /// Current crossfade duration in milliseconds (0 when unsupported)
    fn crossfade_duration(&self) -> u64;

    /// Set ReplayGain normalization. Requires the `replay_gain`
    /// capability.
    fn set_replay_gain(&mut self, gain_db: f32, peak: f32);

    /// Set the 10 equalizer band gains in dB, low to high frequency.
    /// Requires the `equalizer` capability.
    fn set_equalizer(&mut self, gains_db: [f32; 10]);

    /// Enable or disable the equalizer. Requires the `equalizer`
    /// capability.
    fn set_equalizer_enabled(&mut self, enabled: bool);

    /// Feature flags for this variant
    fn capabilities(&self) -> EngineCapabilities;

    /// Register the end-of-track callback
    fn set_on_end(&mut self, callback: EndCallback);

    /// Register the error callback
    fn set_on_error(&mut self, callback: ErrorCallback);

    /// Release the device and all decoded buffers. Idempotent.
    fn cleanup(&mut self);

    /// Backend identifier (factory registry name)
    fn name(&self) -> &'static str;
}
