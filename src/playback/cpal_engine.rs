//! Full-featured playback engine: symphonia decode + cpal output
//!
//! Owns the single lock around [`StreamState`], the state machine and the
//! output device. Decoding and transcoding run on the control thread
//! inside `load`/`set_next_track`; the audio callback only pulls already
//! decoded samples through [`StreamSource`].

use crate::audio::decoder::AudioDecoder;
use crate::audio::output::{CpalDeviceManager, DeviceManager, OutputDevice};
use crate::audio::DEFAULT_SAMPLE_RATE;
use crate::error::{Error, Result};
use crate::playback::engine::{AudioEngine, EndCallback, ErrorCallback};
use crate::playback::state::{EndReason, EngineCapabilities, PlaybackState};
use crate::playback::stream::{PreloadSlot, ReplayGain, StreamSource, StreamState};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

/// Playback engine with gapless transitions, crossfade, equalizer and
/// ReplayGain support.
///
/// The output device is opened lazily on first `play` and recreated
/// whenever a newly loaded track's sample rate differs from the device's
/// rate — nothing in the engine resamples.
pub struct CpalEngine {
    shared: Arc<Mutex<StreamState>>,
    decoder: AudioDecoder,
    manager: Box<dyn DeviceManager>,
    device: Option<Box<dyn OutputDevice>>,
    on_end: Option<EndCallback>,
    on_error: Option<ErrorCallback>,
}

impl CpalEngine {
    /// Backend registry name
    pub const NAME: &'static str = "cpal";

    /// Create an engine on the host's default output device.
    ///
    /// Fails when no output device exists, which is how the factory
    /// discovers availability.
    pub fn new() -> Result<Self> {
        if !CpalDeviceManager::probe() {
            return Err(Error::Device(
                "no default audio output device".to_string(),
            ));
        }
        Ok(Self::with_device_manager(Box::new(CpalDeviceManager::new())))
    }

    /// Create an engine with an injected device manager.
    ///
    /// The composition root owns the choice of device backend; tests use
    /// this to drive the stream without audio hardware.
    pub fn with_device_manager(manager: Box<dyn DeviceManager>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(StreamState::new(DEFAULT_SAMPLE_RATE))),
            decoder: AudioDecoder::new(DEFAULT_SAMPLE_RATE),
            manager,
            device: None,
            on_end: None,
            on_error: None,
        }
    }

    /// Take the engine lock, recovering the guard if a callback panic
    /// ever poisoned it (the callback path itself never panics).
    fn lock(&self) -> MutexGuard<'_, StreamState> {
        self.shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit_error(&mut self, message: &str) {
        if let Some(callback) = self.on_error.as_mut() {
            callback(message);
        }
    }

    fn stop_device(&mut self) {
        if let Some(device) = self.device.as_mut() {
            if let Err(e) = device.stop() {
                warn!("failed to stop device: {}", e);
            }
        }
    }

    /// Open (or reopen) the output device at the active track's rate.
    fn ensure_device(&mut self, sample_rate: u32) -> Result<()> {
        let needs_reopen = self
            .device
            .as_ref()
            .map_or(true, |d| d.sample_rate() != sample_rate);
        if !needs_reopen {
            return Ok(());
        }

        if let Some(mut device) = self.device.take() {
            debug!("recreating output device for {} Hz", sample_rate);
            let _ = device.stop();
        }

        self.device = Some(self.manager.open(sample_rate)?);
        Ok(())
    }
}

impl AudioEngine for CpalEngine {
    fn load(&mut self, path: &Path) -> bool {
        // Halt playback before the (potentially slow) decode; the decode
        // itself runs without the lock held.
        {
            let mut state = self.lock();
            state.state = PlaybackState::Loading;
            state.playback_started = false;
        }
        self.stop_device();

        match self.decoder.decode(path) {
            Ok(buffer) => {
                let buffer = Arc::new(buffer);
                let mut state = self.lock();
                info!(
                    "loaded {} ({} ms at {} Hz)",
                    path.display(),
                    buffer.duration_ms(),
                    buffer.sample_rate
                );
                state.install_track(buffer, path.to_path_buf());
                state.state = PlaybackState::Stopped;
                true
            }
            Err(e) => {
                {
                    let mut state = self.lock();
                    state.clear_tracks();
                    state.state = PlaybackState::Error;
                }
                error!("failed to load {}: {}", path.display(), e);
                self.emit_error(&format!("failed to load {}: {}", path.display(), e));
                false
            }
        }
    }

    fn play(&mut self) -> bool {
        let sample_rate = {
            let mut state = self.lock();
            if !state.has_track() {
                return false;
            }
            if state.state == PlaybackState::Playing {
                return true;
            }
            // Replaying a track that ran to its natural end starts over.
            if state.is_finished() {
                state.seek_to_ms(0);
            }
            state.sample_rate()
        };

        if let Err(e) = self.ensure_device(sample_rate) {
            {
                let mut state = self.lock();
                state.state = PlaybackState::Error;
            }
            error!("failed to open output device: {}", e);
            self.emit_error(&format!("failed to open output device: {}", e));
            return false;
        }

        {
            let mut state = self.lock();
            state.equalizer_mut().reset();
            state.state = PlaybackState::Playing;
            state.playback_started = true;
        }

        let mut source = StreamSource::new(Arc::clone(&self.shared));
        let started = match self.device.as_mut() {
            Some(device) => device.start(Box::new(move |out| source.fill(out))),
            None => Err(Error::Device("device missing after open".to_string())),
        };

        if let Err(e) = started {
            {
                let mut state = self.lock();
                state.state = PlaybackState::Error;
                state.playback_started = false;
            }
            error!("failed to start playback: {}", e);
            self.emit_error(&format!("failed to start playback: {}", e));
            return false;
        }

        true
    }

    fn pause(&mut self) {
        let should_pause = {
            let mut state = self.lock();
            if state.state == PlaybackState::Playing {
                state.state = PlaybackState::Paused;
                true
            } else {
                false
            }
        };
        if should_pause {
            if let Some(device) = self.device.as_mut() {
                if let Err(e) = device.pause() {
                    warn!("failed to pause device: {}", e);
                }
            }
        }
    }

    fn resume(&mut self) {
        let should_resume = {
            let mut state = self.lock();
            if state.state == PlaybackState::Paused {
                state.state = PlaybackState::Playing;
                true
            } else {
                false
            }
        };
        if should_resume {
            if let Some(device) = self.device.as_mut() {
                if let Err(e) = device.resume() {
                    warn!("failed to resume device: {}", e);
                }
            }
        }
    }

    fn stop(&mut self) {
        {
            let mut state = self.lock();
            state.state = PlaybackState::Stopped;
            state.playback_started = false;
            state.clear_tracks();
        }
        self.stop_device();
    }

    fn seek(&mut self, position_ms: u64) {
        // The callback reads the cursor from shared state, so a playing
        // stream picks the new position up on its next pull.
        self.lock().seek_to_ms(position_ms);
    }

    fn set_volume(&mut self, volume: f32) {
        self.lock().set_volume(volume);
    }

    fn volume(&self) -> f32 {
        self.lock().volume()
    }

    fn state(&self) -> PlaybackState {
        self.lock().state
    }

    fn current_track(&self) -> Option<PathBuf> {
        self.lock().current_path().cloned()
    }

    fn position_ms(&self) -> u64 {
        self.lock().position_ms()
    }

    fn duration_ms(&self) -> u64 {
        self.lock().duration_ms()
    }

    fn check_if_ended(&mut self) -> bool {
        let (events, device_error) = {
            let mut state = self.lock();
            if state.state == PlaybackState::Paused {
                return false;
            }
            let events = state.take_pending_end();
            let ended = events.iter().any(|e| e.reason == EndReason::Ended);
            if ended {
                state.state = PlaybackState::Stopped;
                state.playback_started = false;
            }
            let device_error = self.device.as_ref().is_some_and(|d| d.has_error());
            (events, device_error)
        };

        let ended = events.iter().any(|e| e.reason == EndReason::Ended);
        if ended {
            self.stop_device();
        }

        if device_error {
            {
                let mut state = self.lock();
                state.state = PlaybackState::Error;
                state.playback_started = false;
            }
            self.stop_device();
            self.emit_error("audio stream error");
        }

        for event in &events {
            debug!(
                "track finished ({}): {:?} -> {:?}",
                event.reason.as_str(),
                event.ended_path,
                event.next_path
            );
            if let Some(callback) = self.on_end.as_mut() {
                callback(event);
            }
        }

        ended
    }

    fn set_next_track(&mut self, path: Option<&Path>) -> bool {
        let Some(path) = path else {
            self.lock().set_preload(None);
            return true;
        };

        match self.decoder.decode(path) {
            Ok(buffer) => {
                let buffer = Arc::new(buffer);
                let mut state = self.lock();
                let crossfade_eligible = buffer.sample_rate == state.sample_rate();
                if !crossfade_eligible {
                    info!(
                        "gapless/crossfade disabled by sample rate mismatch: {} -> {}",
                        state.sample_rate(),
                        buffer.sample_rate
                    );
                }
                state.set_preload(Some(PreloadSlot {
                    buffer,
                    path: path.to_path_buf(),
                    crossfade_eligible,
                }));
                debug!("preloaded next track: {}", path.display());
                true
            }
            Err(e) => {
                warn!("failed to preload {}: {}", path.display(), e);
                false
            }
        }
    }

    fn set_crossfade_duration(&mut self, duration_ms: u64) {
        self.lock().set_crossfade_ms(duration_ms);
    }

    fn crossfade_duration(&self) -> u64 {
        self.lock().crossfade_ms()
    }

    fn set_replay_gain(&mut self, gain_db: f32, peak: f32) {
        self.lock().set_replay_gain(ReplayGain::new(gain_db, peak));
    }

    fn set_equalizer(&mut self, gains_db: [f32; 10]) {
        self.lock().set_equalizer_gains(&gains_db);
    }

    fn set_equalizer_enabled(&mut self, enabled: bool) {
        self.lock().set_equalizer_enabled(enabled);
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            gapless: true,
            crossfade: true,
            equalizer: true,
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
        {
            let mut state = self.lock();
            state.state = PlaybackState::Stopped;
            state.playback_started = false;
            state.clear_tracks();
        }
        if let Some(mut device) = self.device.take() {
            let _ = device.stop();
        }
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

impl Drop for CpalEngine {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::output::FillCallback;

    struct NoopDevice {
        sample_rate: u32,
    }

    impl OutputDevice for NoopDevice {
        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }
        fn start(&mut self, _callback: FillCallback) -> Result<()> {
            Ok(())
        }
        fn pause(&mut self) -> Result<()> {
            Ok(())
        }
        fn resume(&mut self) -> Result<()> {
            Ok(())
        }
        fn stop(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct NoopManager;

    impl DeviceManager for NoopManager {
        fn open(&mut self, sample_rate: u32) -> Result<Box<dyn OutputDevice>> {
            Ok(Box::new(NoopDevice { sample_rate }))
        }
    }

    #[test]
    fn test_initial_state() {
        let engine = CpalEngine::with_device_manager(Box::new(NoopManager));
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert_eq!(engine.position_ms(), 0);
        assert_eq!(engine.duration_ms(), 0);
        assert_eq!(engine.current_track(), None);
    }

    #[test]
    fn test_capabilities_are_complete() {
        let engine = CpalEngine::with_device_manager(Box::new(NoopManager));
        let caps = engine.capabilities();
        assert!(caps.gapless && caps.crossfade && caps.equalizer && caps.replay_gain);
        assert_eq!(engine.name(), "cpal");
    }

    #[test]
    fn test_play_without_track_fails() {
        let mut engine = CpalEngine::with_device_manager(Box::new(NoopManager));
        assert!(!engine.play());
        assert_eq!(engine.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_load_missing_file_sets_error_state() {
        let mut engine = CpalEngine::with_device_manager(Box::new(NoopManager));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        engine.set_on_error(Box::new(move |msg| {
            sink.lock().unwrap().push(msg.to_string());
        }));

        assert!(!engine.load(Path::new("/definitely/not/here.flac")));
        assert_eq!(engine.state(), PlaybackState::Error);
        assert_eq!(errors.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_volume_is_clamped() {
        let mut engine = CpalEngine::with_device_manager(Box::new(NoopManager));
        engine.set_volume(1.5);
        assert_eq!(engine.volume(), 1.0);
        engine.set_volume(-0.5);
        assert_eq!(engine.volume(), 0.0);
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let mut engine = CpalEngine::with_device_manager(Box::new(NoopManager));
        engine.cleanup();
        engine.cleanup();
        assert_eq!(engine.state(), PlaybackState::Stopped);
    }
}
