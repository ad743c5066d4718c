//! Player configuration
//!
//! TOML-backed settings for the demo player binary. Every field has a
//! built-in default so a missing or partial file still yields a working
//! configuration.

use crate::error::{Error, Result};
use crate::playback::AudioEngine;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

fn default_volume() -> f32 {
    1.0
}

fn default_peak() -> f32 {
    1.0
}

/// Top-level player configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerConfig {
    /// Preferred backend name; the factory falls back when unavailable
    #[serde(default)]
    pub backend: Option<String>,

    /// Playback volume (0.0 - 1.0)
    #[serde(default = "default_volume")]
    pub volume: f32,

    /// Crossfade duration in milliseconds (0 disables crossfading)
    #[serde(default)]
    pub crossfade_ms: u64,

    /// ReplayGain normalization
    #[serde(default)]
    pub replay_gain: ReplayGainConfig,

    /// Equalizer settings
    #[serde(default)]
    pub equalizer: EqualizerConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            backend: None,
            volume: default_volume(),
            crossfade_ms: 0,
            replay_gain: ReplayGainConfig::default(),
            equalizer: EqualizerConfig::default(),
        }
    }
}

/// ReplayGain section
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayGainConfig {
    /// Gain adjustment in dB
    #[serde(default)]
    pub gain_db: f32,

    /// Track peak used to cap positive gain against clipping
    #[serde(default = "default_peak")]
    pub peak: f32,
}

impl Default for ReplayGainConfig {
    fn default() -> Self {
        Self {
            gain_db: 0.0,
            peak: default_peak(),
        }
    }
}

/// Equalizer section
#[derive(Debug, Clone, Deserialize)]
pub struct EqualizerConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Band gains in dB, low to high frequency (31 Hz … 16 kHz)
    #[serde(default)]
    pub gains_db: [f32; 10],
}

impl Default for EqualizerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            gains_db: [0.0; 10],
        }
    }
}

impl PlayerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: PlayerConfig = toml::from_str(&text)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))?;
        info!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply these settings to an engine, honoring its capability flags.
    pub fn apply(&self, engine: &mut dyn AudioEngine) {
        let caps = engine.capabilities();

        engine.set_volume(self.volume);

        if caps.crossfade {
            engine.set_crossfade_duration(self.crossfade_ms);
        }
        if caps.replay_gain {
            engine.set_replay_gain(self.replay_gain.gain_db, self.replay_gain.peak);
        }
        if caps.equalizer {
            engine.set_equalizer(self.equalizer.gains_db);
            engine.set_equalizer_enabled(self.equalizer.enabled);
        }
    }
}
