//! DSP building blocks
//!
//! Pure transforms over interleaved stereo f32 samples; no I/O, no locks.

pub mod biquad;
pub mod equalizer;

pub use biquad::BiquadFilter;
pub use equalizer::{Equalizer, EQ_BANDS, EQ_FREQUENCIES, EQ_GAIN_RANGE_DB};
