//! Per-source output and log paths.

use std::path::{Path, PathBuf};

use camstream_models::SourceId;
use tokio::fs;

use crate::error::MediaResult;

/// Directory layout shared by every worker.
///
/// Each source writes `<output_dir>/<id>.m3u8` plus `<id>_NNN.ts` segments,
/// and its FFmpeg stderr is appended to `<log_dir>/ffmpeg_<id>_error.log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkLayout {
    output_dir: PathBuf,
    log_dir: PathBuf,
}

impl SinkLayout {
    pub fn new(output_dir: impl Into<PathBuf>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            log_dir: log_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// HLS playlist the worker keeps rewriting while healthy.
    pub fn playlist_path(&self, source: &SourceId) -> PathBuf {
        self.output_dir.join(format!("{}.m3u8", source))
    }

    /// FFmpeg segment filename pattern.
    pub fn segment_pattern(&self, source: &SourceId) -> PathBuf {
        self.output_dir.join(format!("{}_%03d.ts", source))
    }

    /// Append-only stderr log of the worker.
    pub fn log_path(&self, source: &SourceId) -> PathBuf {
        self.log_dir.join(format!("ffmpeg_{}_error.log", source))
    }

    /// Create the output and log directories if they don't exist.
    pub async fn ensure_dirs(&self) -> MediaResult<()> {
        fs::create_dir_all(&self.output_dir).await?;
        fs::create_dir_all(&self.log_dir).await?;
        Ok(())
    }
}
