//! Decoded PCM buffer
//!
//! The unit of exchange between the decode strategy and the playback
//! pipeline: interleaved 32-bit-float stereo samples, immutable after
//! creation.

/// Fixed channel count for all decoded audio. Mono sources are duplicated,
/// wider layouts keep their first two channels.
pub const CHANNELS: u16 = 2;

/// Owned, decoded PCM audio.
///
/// Samples are interleaved stereo f32 (`[L, R, L, R, ...]`). The buffer is
/// never mutated after decode; the playback pipeline shares it between the
/// control thread and the audio callback as `Arc<DecodedBuffer>`.
#[derive(Debug, Clone)]
pub struct DecodedBuffer {
    /// Interleaved stereo samples
    pub samples: Vec<f32>,
    /// Source sample rate in Hz
    pub sample_rate: u32,
    /// Channel count (always [`CHANNELS`])
    pub channels: u16,
}

impl DecodedBuffer {
    /// Create a buffer from interleaved stereo samples.
    ///
    /// Truncates a trailing partial frame so that
    /// `samples.len() % channels == 0` always holds.
    pub fn new(mut samples: Vec<f32>, sample_rate: u32) -> Self {
        let rem = samples.len() % CHANNELS as usize;
        if rem != 0 {
            samples.truncate(samples.len() - rem);
        }
        Self {
            samples,
            sample_rate,
            channels: CHANNELS,
        }
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Total duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.frames() as u64 * 1000) / self.sample_rate as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_and_duration() {
        let buf = DecodedBuffer::new(vec![0.0; 44100 * 2], 44100);
        assert_eq!(buf.frames(), 44100);
        assert_eq!(buf.duration_ms(), 1000);
    }

    #[test]
    fn test_partial_frame_truncated() {
        let buf = DecodedBuffer::new(vec![0.0; 5], 44100);
        assert_eq!(buf.samples.len(), 4);
        assert_eq!(buf.frames(), 2);
    }

    #[test]
    fn test_zero_rate_duration() {
        let buf = DecodedBuffer::new(vec![], 0);
        assert_eq!(buf.duration_ms(), 0);
    }
}
