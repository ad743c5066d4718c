//! Audio output using cpal
//!
//! Wraps a cpal output stream behind the [`OutputDevice`] trait so engines
//! receive their device from a [`DeviceManager`] owned by the composition
//! root instead of reaching for global state. The device is opened at a
//! caller-chosen sample rate; nothing here resamples.

use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Callback invoked on the audio thread to fill one interleaved stereo
/// f32 buffer. Must never block.
pub type FillCallback = Box<dyn FnMut(&mut [f32]) + Send + 'static>;

/// An opened audio output device.
///
/// Implementations hold whatever platform stream they need; the engine
/// only starts, pauses, resumes and stops it. Devices are not `Send` —
/// they live with the engine on the control thread.
pub trait OutputDevice {
    /// Sample rate the device was opened at
    fn sample_rate(&self) -> u32;

    /// Begin pulling audio through `callback`. Replaces any active stream.
    fn start(&mut self, callback: FillCallback) -> Result<()>;

    /// Suspend the stream without discarding it
    fn pause(&mut self) -> Result<()>;

    /// Resume a paused stream
    fn resume(&mut self) -> Result<()>;

    /// Halt and discard the stream. A later `start` builds a fresh one.
    fn stop(&mut self) -> Result<()>;

    /// Whether the stream has reported an error since the last start
    fn has_error(&self) -> bool {
        false
    }
}

/// Opens output devices on demand.
///
/// The engine asks for a new device whenever the active buffer's sample
/// rate differs from the current device's rate.
pub trait DeviceManager {
    fn open(&mut self, sample_rate: u32) -> Result<Box<dyn OutputDevice>>;
}

/// cpal-backed device manager using the host's default output device.
#[derive(Debug, Default)]
pub struct CpalDeviceManager;

impl CpalDeviceManager {
    pub fn new() -> Self {
        Self
    }

    /// Whether a default output device exists, without opening a stream.
    pub fn probe() -> bool {
        cpal::default_host().default_output_device().is_some()
    }
}

impl DeviceManager for CpalDeviceManager {
    fn open(&mut self, sample_rate: u32) -> Result<Box<dyn OutputDevice>> {
        Ok(Box::new(CpalOutput::new(sample_rate)?))
    }
}

/// Audio output bound to one cpal device at a fixed sample rate.
pub struct CpalOutput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<Stream>,
    /// Set by the cpal error callback; polled by the engine
    error_flag: Arc<AtomicBool>,
}

impl CpalOutput {
    /// Open the default output device at `sample_rate`, stereo.
    pub fn new(sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Device("no default output device found".to_string()))?;

        let name = device.name().unwrap_or_else(|_| "unknown".to_string());
        info!("using audio device: {}", name);

        let (config, sample_format) = Self::pick_config(&device, sample_rate)?;

        debug!(
            "audio config: sample_rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );

        Ok(Self {
            device,
            config,
            sample_format,
            stream: None,
            error_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Find a stereo output configuration at the requested rate.
    ///
    /// Prefers f32 samples (our internal format); falls back to i16/u16
    /// with conversion in the callback.
    fn pick_config(device: &Device, sample_rate: u32) -> Result<(StreamConfig, SampleFormat)> {
        let configs: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| Error::Device(format!("failed to get device configs: {}", e)))?
            .filter(|c| {
                c.channels() == 2
                    && c.min_sample_rate().0 <= sample_rate
                    && c.max_sample_rate().0 >= sample_rate
            })
            .collect();

        let preferred = configs
            .iter()
            .find(|c| c.sample_format() == SampleFormat::F32)
            .or_else(|| configs.first());

        match preferred {
            Some(range) => {
                let supported = range.clone().with_sample_rate(cpal::SampleRate(sample_rate));
                let sample_format = supported.sample_format();
                Ok((supported.config(), sample_format))
            }
            None => Err(Error::Device(format!(
                "device does not support stereo output at {} Hz",
                sample_rate
            ))),
        }
    }

    fn build_stream_f32(&self, callback: FillCallback) -> Result<Stream> {
        let error_flag = Arc::clone(&self.error_flag);
        let callback = Mutex::new(callback);

        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    match callback.lock() {
                        Ok(mut cb) => cb(data),
                        // A poisoned callback degrades to silence rather
                        // than panicking the audio thread.
                        Err(_) => data.fill(0.0),
                    }
                },
                move |err| {
                    error!("audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::Device(format!("failed to build stream: {}", e)))
    }

    fn build_stream_i16(&self, callback: FillCallback) -> Result<Stream> {
        let error_flag = Arc::clone(&self.error_flag);
        let callback = Mutex::new(callback);
        let mut scratch: Vec<f32> = Vec::new();

        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0);
                    match callback.lock() {
                        Ok(mut cb) => cb(&mut scratch),
                        Err(_) => scratch.fill(0.0),
                    }
                    for (out, s) in data.iter_mut().zip(scratch.iter()) {
                        *out = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                    }
                },
                move |err| {
                    error!("audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::Device(format!("failed to build stream: {}", e)))
    }

    fn build_stream_u16(&self, callback: FillCallback) -> Result<Stream> {
        let error_flag = Arc::clone(&self.error_flag);
        let callback = Mutex::new(callback);
        let mut scratch: Vec<f32> = Vec::new();

        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0);
                    match callback.lock() {
                        Ok(mut cb) => cb(&mut scratch),
                        Err(_) => scratch.fill(0.0),
                    }
                    for (out, s) in data.iter_mut().zip(scratch.iter()) {
                        *out = ((s.clamp(-1.0, 1.0) + 1.0) * 32767.5) as u16;
                    }
                },
                move |err| {
                    error!("audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::Device(format!("failed to build stream: {}", e)))
    }
}

impl OutputDevice for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn start(&mut self, callback: FillCallback) -> Result<()> {
        // Replace any previous stream.
        self.stream = None;
        self.error_flag.store(false, Ordering::SeqCst);

        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream_f32(callback)?,
            SampleFormat::I16 => self.build_stream_i16(callback)?,
            SampleFormat::U16 => self.build_stream_u16(callback)?,
            other => {
                return Err(Error::Device(format!(
                    "unsupported sample format: {:?}",
                    other
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::Device(format!("failed to start stream: {}", e)))?;

        self.stream = Some(stream);
        info!("audio stream started");
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.as_ref() {
            stream
                .pause()
                .map_err(|e| Error::Device(format!("failed to pause stream: {}", e)))?;
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.as_ref() {
            stream
                .play()
                .map_err(|e| Error::Device(format!("failed to resume stream: {}", e)))?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("failed to pause stream on stop: {}", e);
            }
            drop(stream);
        }
        Ok(())
    }

    fn has_error(&self) -> bool {
        self.error_flag.load(Ordering::SeqCst)
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_does_not_panic() {
        // Hardware may or may not exist where tests run.
        let _ = CpalDeviceManager::probe();
    }
}
