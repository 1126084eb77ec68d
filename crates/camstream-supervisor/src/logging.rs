//! Structured per-source logging.
//!
//! Provides consistent, structured log lines for one worker's lifecycle
//! with the source id attached to every event.

use std::path::Path;

use camstream_media::WorkerExit;
use camstream_models::SourceId;
use tracing::{error, info, warn, Span};

use crate::error::{StartError, StopError};
use crate::health::RestartReason;
use crate::shutdown::StopOutcome;

/// Logger scoped to one source.
#[derive(Debug, Clone)]
pub struct WorkerLogger {
    source_id: String,
}

impl WorkerLogger {
    pub fn new(source: &SourceId) -> Self {
        Self {
            source_id: source.to_string(),
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Log a worker that survived its startup check.
    pub fn log_started(&self, pid: Option<u32>, log_path: &Path) {
        info!(
            source_id = %self.source_id,
            pid = ?pid,
            log = %log_path.display(),
            "FFmpeg started"
        );
    }

    /// Log a failed start, including any captured stderr tail.
    pub fn log_start_failed(&self, err: &StartError) {
        error!(source_id = %self.source_id, "FFmpeg failed to start: {}", err);
        self.log_tail("FFmpeg error output", err.tail());
    }

    /// Log a worker that exited while supervised.
    pub fn log_exit(&self, exit: WorkerExit) {
        warn!(source_id = %self.source_id, exit = %exit, "FFmpeg process has died");
    }

    /// Log diagnostic lines one per event.
    pub fn log_tail(&self, heading: &str, lines: &[String]) {
        if lines.is_empty() {
            return;
        }
        error!(source_id = %self.source_id, lines = lines.len(), "{}:", heading);
        for line in lines {
            error!(source_id = %self.source_id, "  {}", line);
        }
    }

    pub fn log_restart(&self, reason: &RestartReason) {
        warn!(
            source_id = %self.source_id,
            reason = reason.as_label(),
            "Restarting FFmpeg: {}", reason
        );
    }

    pub fn log_decommissioned(&self) {
        info!(
            source_id = %self.source_id,
            "Source no longer in registry, stopping without relaunch"
        );
    }

    pub fn log_stopped(&self, outcome: StopOutcome) {
        match outcome {
            StopOutcome::Killed => {
                warn!(source_id = %self.source_id, "Force killed FFmpeg")
            }
            StopOutcome::Terminated | StopOutcome::AlreadyExited => {
                info!(source_id = %self.source_id, outcome = outcome.as_str(), "Stopped FFmpeg")
            }
        }
    }

    pub fn log_stop_failed(&self, err: &StopError) {
        error!(source_id = %self.source_id, "Error stopping FFmpeg: {}", err);
    }

    /// Create a tracing span for this source.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("worker", source_id = %self.source_id)
    }
}
