//! Error types for worker process operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while starting or controlling FFmpeg workers.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg binary not found: {0}")]
    FfmpegNotFound(String),

    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open worker log {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to signal process {pid}: {message}")]
    SignalFailed { pid: u32, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create a spawn failure error.
    pub fn spawn_failed(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::SpawnFailed {
            program: program.into(),
            source,
        }
    }

    /// Create a signal delivery failure error.
    pub fn signal_failed(pid: u32, message: impl Into<String>) -> Self {
        Self::SignalFailed {
            pid,
            message: message.into(),
        }
    }
}
