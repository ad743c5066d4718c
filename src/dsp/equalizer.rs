//! 10-band equalizer
//!
//! A cascade of peaking-EQ biquads over interleaved stereo samples. Bands
//! at 0 dB are skipped; a fully flat, enabled equalizer is an exact
//! identity.

use crate::dsp::biquad::BiquadFilter;
use tracing::debug;

/// Number of equalizer bands
pub const EQ_BANDS: usize = 10;

/// Band center frequencies in Hz, low to high
pub const EQ_FREQUENCIES: [f32; EQ_BANDS] = [
    31.0, 62.0, 125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0,
];

/// Band gain limits in dB
pub const EQ_GAIN_RANGE_DB: (f32, f32) = (-12.0, 12.0);

/// Cascaded 10-band peaking equalizer.
pub struct Equalizer {
    sample_rate: u32,
    enabled: bool,
    filters: Vec<BiquadFilter>,
}

impl Equalizer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            enabled: false,
            filters: Self::build_filters(sample_rate, &[0.0; EQ_BANDS]),
        }
    }

    fn build_filters(sample_rate: u32, gains: &[f32; EQ_BANDS]) -> Vec<BiquadFilter> {
        EQ_FREQUENCIES
            .iter()
            .zip(gains.iter())
            .map(|(&freq, &gain)| BiquadFilter::new(sample_rate, freq, gain))
            .collect()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Current per-band gains in dB
    pub fn gains(&self) -> [f32; EQ_BANDS] {
        let mut gains = [0.0; EQ_BANDS];
        for (slot, filter) in gains.iter_mut().zip(self.filters.iter()) {
            *slot = filter.gain_db();
        }
        gains
    }

    /// Set all band gains, clamped to the supported range.
    ///
    /// Gain changes recompute coefficients but keep each band's delay
    /// state; a live adjustment may click briefly.
    pub fn set_gains(&mut self, gains: &[f32; EQ_BANDS]) {
        let (min, max) = EQ_GAIN_RANGE_DB;
        for (filter, &gain) in self.filters.iter_mut().zip(gains.iter()) {
            filter.set_gain(gain.clamp(min, max));
        }
    }

    /// Rebuild the cascade for a new sample rate, preserving gains.
    ///
    /// Delay state is discarded; callers reset around position jumps
    /// anyway.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        if self.sample_rate == sample_rate {
            return;
        }
        debug!(
            "equalizer sample rate change: {} -> {}",
            self.sample_rate, sample_rate
        );
        let gains = self.gains();
        self.sample_rate = sample_rate;
        self.filters = Self::build_filters(sample_rate, &gains);
    }

    /// Run the cascade over an interleaved stereo chunk, in place.
    pub fn process(&mut self, samples: &mut [f32]) {
        if !self.enabled {
            return;
        }
        for filter in self.filters.iter_mut() {
            filter.process_stereo(samples);
        }
    }

    /// Zero all band delay state.
    ///
    /// Required whenever the playback position jumps (seek, track switch)
    /// so filter transients do not bleed across the discontinuity.
    pub fn reset(&mut self) {
        for filter in self.filters.iter_mut() {
            filter.reset();
        }
    }
}
