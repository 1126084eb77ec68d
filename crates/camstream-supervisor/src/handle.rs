//! Bookkeeping for one running worker.

use std::fmt;
use std::path::{Path, PathBuf};

use camstream_media::{MediaResult, WorkerExit, WorkerProcess};
use camstream_models::SourceId;
use chrono::{DateTime, Utc};

/// The supervisor's record of one live worker.
pub struct WorkerHandle {
    source_id: SourceId,
    url: String,
    process: Box<dyn WorkerProcess>,
    pid: Option<u32>,
    spawned_at: DateTime<Utc>,
    started_at: DateTime<Utc>,
    last_healthy: DateTime<Utc>,
    output_path: PathBuf,
    log_path: PathBuf,
    exit: Option<WorkerExit>,
}

impl WorkerHandle {
    pub fn new(
        source_id: SourceId,
        url: impl Into<String>,
        process: Box<dyn WorkerProcess>,
        spawned_at: DateTime<Utc>,
        started_at: DateTime<Utc>,
        output_path: PathBuf,
        log_path: PathBuf,
    ) -> Self {
        let pid = process.pid();
        Self {
            source_id,
            url: url.into(),
            process,
            pid,
            spawned_at,
            started_at,
            last_healthy: started_at,
            output_path,
            log_path,
            exit: None,
        }
    }

    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    /// URL the worker was started with.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Pid recorded at spawn time.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// When the process was spawned, before the startup check.
    pub fn spawned_at(&self) -> DateTime<Utc> {
        self.spawned_at
    }

    /// When the worker passed its startup check.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn last_healthy(&self) -> DateTime<Utc> {
        self.last_healthy
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Exit observed by a previous poll.
    pub fn exit(&self) -> Option<WorkerExit> {
        self.exit
    }

    /// Record that the output was confirmed fresh at `now`.
    pub fn mark_healthy(&mut self, now: DateTime<Utc>) {
        if now > self.last_healthy {
            self.last_healthy = now;
        }
    }

    /// Non-blocking liveness poll; remembers the exit once seen.
    pub fn poll_exit(&mut self) -> MediaResult<Option<WorkerExit>> {
        if self.exit.is_some() {
            return Ok(self.exit);
        }
        let exit = self.process.try_wait()?;
        self.exit = exit;
        Ok(exit)
    }

    pub(crate) fn process_mut(&mut self) -> &mut dyn WorkerProcess {
        self.process.as_mut()
    }

    pub(crate) fn set_exit(&mut self, exit: WorkerExit) {
        self.exit = Some(exit);
    }
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("source_id", &self.source_id)
            .field("url", &self.url)
            .field("pid", &self.pid)
            .field("spawned_at", &self.spawned_at)
            .field("started_at", &self.started_at)
            .field("last_healthy", &self.last_healthy)
            .field("output_path", &self.output_path)
            .field("exit", &self.exit)
            .finish()
    }
}
