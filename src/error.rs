//! Error types for tonearm
//!
//! Defines the playback-engine error taxonomy using thiserror. Decode
//! failures never cross the real-time boundary as panics; the engine
//! converts them to boolean returns plus an error callback.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for tonearm
#[derive(Error, Debug)]
pub enum Error {
    /// Both decode paths (native and transcode) exhausted for a file.
    /// Terminal per file; repeated identical attempts are not retried.
    #[error("unsupported format {extension:?}: {path} ({reason})")]
    UnsupportedFormat {
        /// File that failed to decode
        path: PathBuf,
        /// Lower-cased extension, including the dot
        extension: String,
        /// Last underlying error from either decode path
        reason: String,
    },

    /// Audio decoding errors (native path)
    #[error("audio decode error: {0}")]
    Decode(String),

    /// External transcoder process errors
    #[error("transcode error: {0}")]
    Transcode(String),

    /// External transcoder exceeded its time budget
    #[error("transcoder timed out after {0} s")]
    TranscodeTimeout(u64),

    /// Audio output device could not be created or recreated
    #[error("audio device error: {0}")]
    Device(String),

    /// Playback engine errors
    #[error("playback error: {0}")]
    Playback(String),

    /// No engine backend could be constructed
    #[error("no audio backend available")]
    NoBackend,

    /// Configuration file loading errors
    #[error("configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using the tonearm Error
pub type Result<T> = std::result::Result<T, Error>;
