//! Audio decoding and device output
//!
//! Decoding turns file paths into in-memory PCM ahead of time on the
//! control thread; output pulls that PCM through a real-time callback.

pub mod buffer;
pub mod decoder;
pub mod output;
pub mod transcoder;

/// Sample rate engines start at before any track is loaded, and the rate
/// the transcode path is rendered at.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

pub use buffer::{DecodedBuffer, CHANNELS};
pub use decoder::{AudioDecoder, NATIVE_EXTENSIONS};
pub use output::{CpalDeviceManager, CpalOutput, DeviceManager, FillCallback, OutputDevice};
pub use transcoder::{FfmpegTranscoder, TRANSCODE_TIMEOUT_SECS};
