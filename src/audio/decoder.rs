//! Audio decoding via symphonia
//!
//! Implements the two-path decode strategy: formats in the native set are
//! decoded directly with symphonia; everything else (or a failed native
//! attempt) goes through the external ffmpeg transcoder and the resulting
//! WAV payload is decoded in memory. When both paths fail the error is
//! terminal for that file.

use crate::audio::buffer::{DecodedBuffer, CHANNELS};
use crate::audio::transcoder::FfmpegTranscoder;
use crate::error::{Error, Result};
use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info, warn};

/// Extensions the native symphonia build decodes directly.
///
/// Matches the enabled symphonia features (mp3, flac, aac, isomp4, vorbis
/// plus the royalty-free defaults). Everything else takes the transcode
/// path.
pub const NATIVE_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "oga", "m4a", "mp4", "aac"];

/// Two-path audio decoder.
///
/// The target sample rate only affects the transcode path: ffmpeg output is
/// produced at this rate. Native decodes keep the source rate (the engine
/// recreates its device to match; nothing here resamples).
pub struct AudioDecoder {
    target_sample_rate: u32,
}

impl AudioDecoder {
    pub fn new(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }

    /// Whether a file's extension is in the native decode set.
    pub fn is_native_format(path: &Path) -> bool {
        let ext = file_extension(path);
        NATIVE_EXTENSIONS.contains(&ext.trim_start_matches('.'))
    }

    /// Decode a file to an in-memory PCM buffer.
    ///
    /// Strategy:
    /// 1. Native symphonia decode for extensions in the native set. A
    ///    failure is recorded and decoding continues — no fail-fast.
    /// 2. ffmpeg transcode to f32 WAV, decoded in memory, when the
    ///    transcoder is available.
    /// 3. `UnsupportedFormat` carrying the first recorded error.
    pub fn decode(&self, path: &Path) -> Result<DecodedBuffer> {
        let extension = file_extension(path);
        let is_native = NATIVE_EXTENSIONS.contains(&extension.trim_start_matches('.'));

        let mut decode_error: Option<Error> = None;

        if is_native {
            match Self::decode_native(path) {
                Ok(buffer) => return Ok(buffer),
                Err(e) => {
                    debug!("native decode failed for {}: {}", path.display(), e);
                    decode_error = Some(e);
                }
            }
        }

        if FfmpegTranscoder::is_available() {
            let transcoded = FfmpegTranscoder::transcode_to_wav(path, self.target_sample_rate)
                .and_then(Self::decode_wav_bytes);
            match transcoded {
                Ok(buffer) => {
                    info!("decoded via ffmpeg transcode: {}", path.display());
                    return Ok(buffer);
                }
                Err(e) => {
                    warn!("ffmpeg transcode failed for {}: {}", path.display(), e);
                    if decode_error.is_none() {
                        decode_error = Some(e);
                    }
                }
            }
        }

        let reason = decode_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no decode path available".to_string());

        Err(Error::UnsupportedFormat {
            path: path.to_path_buf(),
            extension,
            reason,
        })
    }

    /// Decode a file directly with symphonia.
    pub fn decode_native(path: &Path) -> Result<DecodedBuffer> {
        debug!("decoding natively: {}", path.display());

        let file = std::fs::File::open(path)
            .map_err(|e| Error::Decode(format!("failed to open {}: {}", path.display(), e)))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        Self::decode_stream(mss, hint)
    }

    /// Decode a transcoded WAV payload held in memory.
    fn decode_wav_bytes(data: Vec<u8>) -> Result<DecodedBuffer> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());
        let mut hint = Hint::new();
        hint.with_extension("wav");
        Self::decode_stream(mss, hint)
    }

    /// Shared decode loop: probe the container, pick the first audio track,
    /// and convert every packet to interleaved stereo f32.
    fn decode_stream(mss: MediaSourceStream, hint: Hint) -> Result<DecodedBuffer> {
        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::Decode(format!("failed to probe format: {}", e)))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("no audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| Error::Decode("sample rate not found".to_string()))?;
        let src_channels = codec_params
            .channels
            .map(|c| c.count())
            .ok_or_else(|| Error::Decode("channel count not found".to_string()))?;
        if src_channels == 0 {
            return Err(Error::Decode("zero channels in stream".to_string()));
        }

        debug!(
            "audio format: sample_rate={}, channels={}",
            sample_rate, src_channels
        );

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("failed to create decoder: {}", e)))?;

        let mut samples: Vec<f32> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    warn!("error reading packet: {}", e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let capacity = decoded.capacity() as u64;
                    let mut buf = SampleBuffer::<f32>::new(capacity, spec);
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
                Err(e) => {
                    // Corrupt packets are skipped, not fatal.
                    warn!("decode error, skipping packet: {}", e);
                    continue;
                }
            }
        }

        if samples.is_empty() {
            return Err(Error::Decode("no samples decoded".to_string()));
        }

        let stereo = to_stereo(samples, src_channels);
        let buffer = DecodedBuffer::new(stereo, sample_rate);

        debug!(
            "decoded {} frames at {} Hz",
            buffer.frames(),
            buffer.sample_rate
        );
        Ok(buffer)
    }
}

/// Force an interleaved sample block to the fixed stereo layout.
///
/// Mono is duplicated into both channels; layouts wider than stereo keep
/// their first two channels.
fn to_stereo(samples: Vec<f32>, src_channels: usize) -> Vec<f32> {
    match src_channels {
        2 => samples,
        1 => {
            let mut out = Vec::with_capacity(samples.len() * 2);
            for s in samples {
                out.push(s);
                out.push(s);
            }
            out
        }
        n => {
            let mut out = Vec::with_capacity(samples.len() / n * CHANNELS as usize);
            for frame in samples.chunks_exact(n) {
                out.push(frame[0]);
                out.push(frame[1]);
            }
            out
        }
    }
}

/// Lower-cased extension including the leading dot, or empty.
fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_to_stereo() {
        let out = to_stereo(vec![0.1, 0.2, 0.3], 1);
        assert_eq!(out, vec![0.1, 0.1, 0.2, 0.2, 0.3, 0.3]);
    }

    #[test]
    fn test_stereo_passthrough() {
        let samples = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(to_stereo(samples.clone(), 2), samples);
    }

    #[test]
    fn test_surround_keeps_front_pair() {
        // 5.1 frame: FL FR FC LFE RL RR
        let samples = vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0, 1.1, 1.2];
        assert_eq!(to_stereo(samples, 6), vec![0.1, 0.2, 0.7, 0.8]);
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension(Path::new("/music/a.MP3")), ".mp3");
        assert_eq!(file_extension(Path::new("/music/noext")), "");
    }

    #[test]
    fn test_native_format_detection() {
        assert!(AudioDecoder::is_native_format(Path::new("x.flac")));
        assert!(AudioDecoder::is_native_format(Path::new("x.OGG")));
        assert!(!AudioDecoder::is_native_format(Path::new("x.wma")));
    }
}
