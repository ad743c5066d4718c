//! Fallback playback engine backed by rodio
//!
//! Simple sink-based playback with broad format coverage and ReplayGain
//! folded into the sink volume. No preload slot, crossfade or equalizer —
//! those capability flags are false and the corresponding operations are
//! no-ops, enforced by the caller querying [`EngineCapabilities`].

use crate::error::{Error, Result};
use crate::playback::engine::{AudioEngine, EndCallback, ErrorCallback};
use crate::playback::state::{
    EndReason, EngineCapabilities, PlaybackEndInfo, PlaybackState,
};
use crate::playback::stream::{effective_gain, ReplayGain};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// rodio-based fallback engine.
///
/// Construction opens the default output stream; failure there is how the
/// factory learns the backend is unavailable.
pub struct RodioEngine {
    // The stream must outlive every sink created from its handle.
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Option<Sink>,

    state: PlaybackState,
    volume: f32,
    replay_gain: ReplayGain,
    current_path: Option<PathBuf>,
    duration_ms: u64,
    playback_started: bool,

    on_end: Option<EndCallback>,
    on_error: Option<ErrorCallback>,
}

impl RodioEngine {
    /// Backend registry name
    pub const NAME: &'static str = "rodio";

    pub fn new() -> Result<Self> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| Error::Device(format!("failed to open output stream: {}", e)))?;

        Ok(Self {
            _stream: stream,
            handle,
            sink: None,
            state: PlaybackState::Idle,
            volume: 1.0,
            replay_gain: ReplayGain::default(),
            current_path: None,
            duration_ms: 0,
            playback_started: false,
            on_end: None,
            on_error: None,
        })
    }

    fn emit_error(&mut self, message: &str) {
        if let Some(callback) = self.on_error.as_mut() {
            callback(message);
        }
    }

    fn open_source(path: &Path) -> Result<Decoder<BufReader<File>>> {
        let file = File::open(path)
            .map_err(|e| Error::Decode(format!("failed to open {}: {}", path.display(), e)))?;
        Decoder::new(BufReader::new(file))
            .map_err(|e| Error::Decode(format!("failed to decode {}: {}", path.display(), e)))
    }

    /// Volume handed to the sink: playback volume × ReplayGain, capped at
    /// `1/peak` against clipping.
    fn sink_volume(&self) -> f32 {
        effective_gain(self.volume, &self.replay_gain)
    }

    fn apply_volume(&self) {
        if let Some(sink) = self.sink.as_ref() {
            sink.set_volume(self.sink_volume());
        }
    }

    fn drop_sink(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }
}

impl AudioEngine for RodioEngine {
    fn load(&mut self, path: &Path) -> bool {
        self.drop_sink();
        self.playback_started = false;

        // Validate the file and read its duration up front; playback
        // reopens it with a fresh decoder.
        match Self::open_source(path) {
            Ok(source) => {
                self.duration_ms = source
                    .total_duration()
                    .map(|d| d.as_millis() as u64)
                    .unwrap_or(0);
                self.current_path = Some(path.to_path_buf());
                self.state = PlaybackState::Stopped;
                info!("loaded {} ({} ms)", path.display(), self.duration_ms);
                true
            }
            Err(e) => {
                self.current_path = None;
                self.duration_ms = 0;
                self.state = PlaybackState::Error;
                error!("failed to load {}: {}", path.display(), e);
                self.emit_error(&format!("failed to load {}: {}", path.display(), e));
                false
            }
        }
    }

    fn play(&mut self) -> bool {
        let Some(path) = self.current_path.clone() else {
            return false;
        };
        if self.state == PlaybackState::Playing {
            return true;
        }

        let source = match Self::open_source(&path) {
            Ok(source) => source,
            Err(e) => {
                self.state = PlaybackState::Error;
                error!("playback failed: {}", e);
                self.emit_error(&format!("playback failed: {}", e));
                return false;
            }
        };

        self.drop_sink();
        let sink = match Sink::try_new(&self.handle) {
            Ok(sink) => sink,
            Err(e) => {
                self.state = PlaybackState::Error;
                error!("failed to create sink: {}", e);
                self.emit_error(&format!("failed to create sink: {}", e));
                return false;
            }
        };

        sink.set_volume(self.sink_volume());
        sink.append(source);
        sink.play();
        self.sink = Some(sink);

        self.state = PlaybackState::Playing;
        self.playback_started = true;
        true
    }

    fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            if let Some(sink) = self.sink.as_ref() {
                sink.pause();
            }
            self.state = PlaybackState::Paused;
        }
    }

    fn resume(&mut self) {
        if self.state == PlaybackState::Paused {
            if let Some(sink) = self.sink.as_ref() {
                sink.play();
            }
            self.state = PlaybackState::Playing;
        }
    }

    fn stop(&mut self) {
        self.drop_sink();
        self.state = PlaybackState::Stopped;
        self.playback_started = false;
    }

    fn seek(&mut self, position_ms: u64) {
        if let Some(sink) = self.sink.as_ref() {
            if let Err(e) = sink.try_seek(Duration::from_millis(position_ms)) {
                warn!("seek failed: {}", e);
            }
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.apply_volume();
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn state(&self) -> PlaybackState {
        self.state
    }

    fn current_track(&self) -> Option<PathBuf> {
        self.current_path.clone()
    }

    fn position_ms(&self) -> u64 {
        match (self.state, self.sink.as_ref()) {
            (PlaybackState::Playing | PlaybackState::Paused, Some(sink)) => {
                sink.get_pos().as_millis() as u64
            }
            _ => 0,
        }
    }

    fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    fn check_if_ended(&mut self) -> bool {
        if !self.playback_started || self.state != PlaybackState::Playing {
            return false;
        }
        let drained = self.sink.as_ref().map_or(true, |s| s.empty());
        if !drained {
            return false;
        }

        self.state = PlaybackState::Stopped;
        self.playback_started = false;
        self.drop_sink();

        let info = PlaybackEndInfo {
            ended_path: self.current_path.clone(),
            next_path: None,
            reason: EndReason::Ended,
        };
        debug!("track finished: {:?}", info.ended_path);
        if let Some(callback) = self.on_end.as_mut() {
            callback(&info);
        }
        true
    }

    fn set_next_track(&mut self, _path: Option<&Path>) -> bool {
        // No preload slot without the gapless capability.
        false
    }

    fn set_crossfade_duration(&mut self, _duration_ms: u64) {}

    fn crossfade_duration(&self) -> u64 {
        0
    }

    fn set_replay_gain(&mut self, gain_db: f32, peak: f32) {
        self.replay_gain = ReplayGain::new(gain_db, peak);
        self.apply_volume();
    }

    fn set_equalizer(&mut self, _gains_db: [f32; 10]) {}

    fn set_equalizer_enabled(&mut self, _enabled: bool) {}

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            gapless: false,
            crossfade: false,
            equalizer: false,
            replay_gain: true,
        }
    }

    fn set_on_end(&mut self, callback: EndCallback) {
        self.on_end = Some(callback);
    }

    fn set_on_error(&mut self, callback: ErrorCallback) {
        self.on_error = Some(callback);
    }

    fn cleanup(&mut self) {
        self.drop_sink();
        self.current_path = None;
        self.duration_ms = 0;
        self.playback_started = false;
        self.state = PlaybackState::Stopped;
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

impl Drop for RodioEngine {
    fn drop(&mut self) {
        self.cleanup();
    }
}
