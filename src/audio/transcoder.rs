//! External ffmpeg transcoder
//!
//! Converts formats the native decoder cannot handle into 32-bit-float WAV
//! that the native decoder can consume. The child process is time-bounded;
//! on timeout it is killed and the decode strategy proceeds to failure.
//!
//! The ffmpeg binary is located once per process: the `TONEARM_FFMPEG`
//! environment variable takes precedence, otherwise `ffmpeg` is probed on
//! `PATH`.

use crate::error::{Error, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Time budget for one transcode run
pub const TRANSCODE_TIMEOUT_SECS: u64 = 60;

/// Maximum length of captured transcoder diagnostics
const STDERR_TRUNCATE: usize = 200;

/// Poll interval while waiting for the child process
const WAIT_POLL: Duration = Duration::from_millis(50);

static FFMPEG_PATH: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Locate the ffmpeg binary, caching the result for the process lifetime.
fn ffmpeg_path() -> Option<&'static Path> {
    FFMPEG_PATH
        .get_or_init(|| {
            if let Ok(path) = std::env::var("TONEARM_FFMPEG") {
                let candidate = PathBuf::from(path);
                if candidate.is_file() {
                    debug!("ffmpeg found via TONEARM_FFMPEG: {}", candidate.display());
                    return Some(candidate);
                }
            }

            // Probe PATH by asking for the version banner.
            let probe = Command::new("ffmpeg")
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();

            match probe {
                Ok(status) if status.success() => {
                    debug!("ffmpeg found on PATH");
                    Some(PathBuf::from("ffmpeg"))
                }
                _ => {
                    debug!("ffmpeg not found");
                    None
                }
            }
        })
        .as_deref()
}

/// ffmpeg-backed audio transcoder.
///
/// Stateless; all methods are associated functions mirroring the one-shot
/// nature of each transcode run.
pub struct FfmpegTranscoder;

impl FfmpegTranscoder {
    /// Whether an ffmpeg binary is available to this process.
    pub fn is_available() -> bool {
        ffmpeg_path().is_some()
    }

    /// Transcode `path` to 32-bit-float stereo WAV at `target_sample_rate`,
    /// returning the WAV payload read from the child's stdout.
    ///
    /// # Errors
    /// - `Error::Transcode` when ffmpeg is missing, fails to spawn, or exits
    ///   non-zero (diagnostics truncated to a bounded length)
    /// - `Error::TranscodeTimeout` when the child exceeds its time budget
    pub fn transcode_to_wav(path: &Path, target_sample_rate: u32) -> Result<Vec<u8>> {
        let ffmpeg = ffmpeg_path()
            .ok_or_else(|| Error::Transcode("ffmpeg is unavailable".to_string()))?;

        if !path.is_file() {
            return Err(Error::Transcode(format!(
                "file does not exist: {}",
                path.display()
            )));
        }

        let mut child = Command::new(ffmpeg)
            .arg("-v")
            .arg("error")
            .arg("-i")
            .arg(path)
            .arg("-f")
            .arg("wav")
            .arg("-acodec")
            .arg("pcm_f32le")
            .arg("-ar")
            .arg(target_sample_rate.to_string())
            .arg("-ac")
            .arg("2")
            .arg("-y")
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Transcode(format!("failed to spawn ffmpeg: {}", e)))?;

        // Drain both pipes on background threads so the child never blocks
        // on a full pipe while we wait for it.
        let (Some(mut stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take())
        else {
            let _ = child.kill();
            return Err(Error::Transcode("ffmpeg pipes missing".to_string()));
        };

        let stdout_thread = thread::spawn(move || {
            let mut data = Vec::new();
            let _ = stdout.read_to_end(&mut data);
            data
        });
        let stderr_thread = thread::spawn(move || {
            let mut data = Vec::new();
            let _ = stderr.read_to_end(&mut data);
            data
        });

        let deadline = Instant::now() + Duration::from_secs(TRANSCODE_TIMEOUT_SECS);
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        warn!("ffmpeg transcode timed out: {}", path.display());
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(Error::TranscodeTimeout(TRANSCODE_TIMEOUT_SECS));
                    }
                    thread::sleep(WAIT_POLL);
                }
                Err(e) => {
                    let _ = child.kill();
                    return Err(Error::Transcode(format!("failed to wait on ffmpeg: {}", e)));
                }
            }
        };

        let wav_data = stdout_thread.join().unwrap_or_default();
        let stderr_data = stderr_thread.join().unwrap_or_default();

        if !status.success() {
            let diag = truncate_diagnostics(&stderr_data);
            warn!("ffmpeg transcode failed: {}", diag);
            return Err(Error::Transcode(format!("ffmpeg failed: {}", diag)));
        }

        debug!(
            "ffmpeg transcode succeeded: {} -> {} bytes",
            path.display(),
            wav_data.len()
        );
        Ok(wav_data)
    }
}

/// Bound the captured stderr to a displayable length.
fn truncate_diagnostics(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "no diagnostic output".to_string();
    }
    let mut out: String = trimmed.chars().take(STDERR_TRUNCATE).collect();
    if trimmed.chars().count() > STDERR_TRUNCATE {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability_probe_is_stable() {
        // The cached probe must return the same answer on repeat calls.
        let first = FfmpegTranscoder::is_available();
        let second = FfmpegTranscoder::is_available();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_file_is_rejected() {
        if !FfmpegTranscoder::is_available() {
            return;
        }
        let result =
            FfmpegTranscoder::transcode_to_wav(Path::new("/nonexistent/file.m4a"), 44100);
        assert!(matches!(result, Err(Error::Transcode(_))));
    }

    #[test]
    fn test_truncate_diagnostics() {
        assert_eq!(truncate_diagnostics(b""), "no diagnostic output");
        assert_eq!(truncate_diagnostics(b"  short error  "), "short error");

        let long = "x".repeat(500);
        let truncated = truncate_diagnostics(long.as_bytes());
        assert_eq!(truncated.len(), STDERR_TRUNCATE + 3);
        assert!(truncated.ends_with("..."));
    }
}
