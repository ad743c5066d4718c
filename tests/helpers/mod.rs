//! Shared test utilities
//!
//! WAV fixture generation plus a manually pumped output device, so engine
//! behavior can be driven deterministically without audio hardware.

// Not every test binary uses every helper.
#![allow(dead_code)]

use hound::{WavSpec, WavWriter};
use std::f32::consts::PI;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tonearm::audio::output::{DeviceManager, FillCallback, OutputDevice};
use tonearm::error::Result;

/// Generate a stereo sine-wave WAV file.
pub fn write_sine_wav<P: AsRef<Path>>(
    path: P,
    duration_ms: u64,
    sample_rate: u32,
    frequency_hz: f32,
    amplitude: f32,
) {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec).expect("create wav");
    let total_frames = (sample_rate as u64 * duration_ms) / 1000;

    for i in 0..total_frames {
        let t = i as f32 / sample_rate as f32;
        let sample = (2.0 * PI * frequency_hz * t).sin() * amplitude;
        let quantized = (sample * i16::MAX as f32) as i16;
        writer.write_sample(quantized).expect("write sample");
        writer.write_sample(quantized).expect("write sample");
    }

    writer.finalize().expect("finalize wav");
}

/// Generate a mono sine-wave WAV file (decoder duplicates it to stereo).
pub fn write_mono_sine_wav<P: AsRef<Path>>(
    path: P,
    duration_ms: u64,
    sample_rate: u32,
    frequency_hz: f32,
) {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec).expect("create wav");
    let total_frames = (sample_rate as u64 * duration_ms) / 1000;

    for i in 0..total_frames {
        let t = i as f32 / sample_rate as f32;
        let sample = (2.0 * PI * frequency_hz * t).sin() * 0.5;
        writer
            .write_sample((sample * i16::MAX as f32) as i16)
            .expect("write sample");
    }

    writer.finalize().expect("finalize wav");
}

#[derive(Default)]
struct PortInner {
    callback: Option<FillCallback>,
    opened_rates: Vec<u32>,
    stopped: bool,
    paused: bool,
}

/// Handle shared between the test and the manual device: the test pumps
/// the engine's fill callback the way a real audio thread would.
#[derive(Clone, Default)]
pub struct ManualPort {
    inner: Arc<Mutex<PortInner>>,
}

impl ManualPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pull `frames` stereo frames through the engine callback.
    pub fn pump_frames(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; frames * 2];
        let mut inner = self.inner.lock().unwrap();
        if let Some(callback) = inner.callback.as_mut() {
            callback(&mut out);
        }
        out
    }

    /// Sample rates the engine opened devices at, in order.
    pub fn opened_rates(&self) -> Vec<u32> {
        self.inner.lock().unwrap().opened_rates.clone()
    }

    /// Whether the engine has stopped (discarded) the stream.
    pub fn is_stopped(&self) -> bool {
        self.inner.lock().unwrap().stopped
    }

    pub fn is_paused(&self) -> bool {
        self.inner.lock().unwrap().paused
    }
}

struct ManualDevice {
    port: ManualPort,
    sample_rate: u32,
}

impl OutputDevice for ManualDevice {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&mut self, callback: FillCallback) -> Result<()> {
        let mut inner = self.port.inner.lock().unwrap();
        inner.callback = Some(callback);
        inner.stopped = false;
        inner.paused = false;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.port.inner.lock().unwrap().paused = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.port.inner.lock().unwrap().paused = false;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut inner = self.port.inner.lock().unwrap();
        inner.callback = None;
        inner.stopped = true;
        Ok(())
    }
}

/// Device manager that hands out manually pumped devices.
pub struct ManualDeviceManager {
    port: ManualPort,
}

impl ManualDeviceManager {
    pub fn new(port: ManualPort) -> Self {
        Self { port }
    }
}

impl DeviceManager for ManualDeviceManager {
    fn open(&mut self, sample_rate: u32) -> Result<Box<dyn OutputDevice>> {
        self.port.inner.lock().unwrap().opened_rates.push(sample_rate);
        Ok(Box::new(ManualDevice {
            port: self.port.clone(),
            sample_rate,
        }))
    }
}
