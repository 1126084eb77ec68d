//! Supervisor error types.
//!
//! Only [`SupervisorError`] is fatal, and only at boot. Every other error is
//! scoped to a single source and is logged where it happens.

use std::path::PathBuf;

use camstream_media::{MediaError, WorkerExit};
use thiserror::Error;

pub type SupervisorResult<T> = Result<T, SupervisorError>;

/// Fatal boot conditions.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("No sources configured in {0}")]
    EmptyRegistry(String),

    #[error("FFmpeg unavailable: {0}")]
    FfmpegUnavailable(#[source] MediaError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),
}

/// A worker could not be brought up.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("Worker died during startup ({exit})")]
    ImmediateExit {
        exit: WorkerExit,
        /// Last lines of the worker's stderr log
        tail: Vec<String>,
    },

    #[error("Failed to spawn worker: {0}")]
    Spawn(#[source] MediaError),

    #[error("Failed to poll worker after spawn: {0}")]
    Poll(#[source] MediaError),
}

impl StartError {
    /// Diagnostic log tail, when one was captured.
    pub fn tail(&self) -> &[String] {
        match self {
            StartError::ImmediateExit { tail, .. } => tail,
            _ => &[],
        }
    }
}

/// The output artifact could not be inspected.
#[derive(Debug, Error)]
#[error("Failed to stat {path}: {source}")]
pub struct ProbeError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// A worker could not be confirmed dead.
#[derive(Debug, Error)]
#[error("Failed to kill worker{}: {source}", .pid.map(|p| format!(" (pid {})", p)).unwrap_or_default())]
pub struct StopError {
    pub pid: Option<u32>,
    #[source]
    pub source: MediaError,
}

/// The source registry could not be read.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Source registry not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read source registry {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in source registry {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Source registry {0} must be a JSON object of id → URL")]
    InvalidFormat(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_error_tail() {
        let err = StartError::ImmediateExit {
            exit: WorkerExit::from_code(1),
            tail: vec!["Connection refused".to_string()],
        };
        assert_eq!(err.to_string(), "Worker died during startup (exit code 1)");
        assert_eq!(err.tail(), ["Connection refused"]);

        let err = StartError::Spawn(MediaError::FfmpegNotFound("ffmpeg".into()));
        assert!(err.tail().is_empty());
    }

    #[test]
    fn test_stop_error_display() {
        let err = StopError {
            pid: Some(42),
            source: MediaError::signal_failed(42, "EPERM"),
        };
        assert!(err.to_string().starts_with("Failed to kill worker (pid 42)"));
    }
}
