//! Playback state types
//!
//! State machine states, end-of-track notification payloads and the
//! capability flags every engine variant reports.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Playback engine state machine.
///
/// `Idle → Loading → Stopped ⇄ Playing ⇄ Paused`; any state may fall to
/// `Error` on unrecoverable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Idle,
    Loading,
    Stopped,
    Playing,
    Paused,
    Error,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Loading => "loading",
            PlaybackState::Stopped => "stopped",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Why a track stopped producing audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The track ran out with no eligible preload; the device stopped.
    Ended,
    /// A preloaded track seamlessly became the active one.
    AutoAdvance,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::Ended => "ended",
            EndReason::AutoAdvance => "auto_advance",
        }
    }
}

/// End-of-track notification delivered to the owning service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackEndInfo {
    /// Track that just finished
    pub ended_path: Option<PathBuf>,
    /// Track that playback advanced to, if any
    pub next_path: Option<PathBuf>,
    pub reason: EndReason,
}

/// Feature flags reported by each engine variant.
///
/// A capability is never assumed: callers query these flags before using
/// the corresponding optional operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineCapabilities {
    pub gapless: bool,
    pub crossfade: bool,
    pub equalizer: bool,
    pub replay_gain: bool,
}
