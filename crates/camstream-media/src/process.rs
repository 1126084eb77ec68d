//! Worker process spawning and control.
//!
//! The supervisor only needs four capabilities from a worker: a non-blocking
//! liveness poll, a graceful terminate request, a hard kill, and a bounded
//! wait for exit. [`WorkerProcess`] captures exactly those, [`Spawner`]
//! creates them, and [`ProcessSpawner`] / [`ChildProcess`] implement both on
//! top of `tokio::process`.

use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// How a worker process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    /// Exit code, if the process exited normally
    pub code: Option<i32>,
    /// Terminating signal, if the process was killed by one (unix only)
    pub signal: Option<i32>,
}

impl WorkerExit {
    pub fn from_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn from_signal(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }
}

impl From<ExitStatus> for WorkerExit {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "signal {}", signal),
            (None, None) => write!(f, "unknown exit status"),
        }
    }
}

/// A spawned worker the supervisor can observe and stop.
#[async_trait]
pub trait WorkerProcess: Send {
    /// OS process id, while the process has not been reaped.
    fn pid(&self) -> Option<u32>;

    /// Non-blocking liveness poll. `Some` once the process has exited.
    fn try_wait(&mut self) -> MediaResult<Option<WorkerExit>>;

    /// Ask the process to exit (SIGTERM on unix).
    fn terminate(&mut self) -> MediaResult<()>;

    /// Force the process to exit and reap it.
    async fn kill(&mut self) -> MediaResult<()>;

    /// Wait for exit for at most `timeout`. `None` if still running.
    async fn wait_timeout(&mut self, timeout: Duration) -> MediaResult<Option<WorkerExit>>;
}

/// Creates worker processes.
pub trait Spawner: Send + Sync {
    /// Spawn `program args...` with stderr appended to `stderr_log`.
    fn spawn(
        &self,
        program: &Path,
        args: &[String],
        stderr_log: &Path,
    ) -> MediaResult<Box<dyn WorkerProcess>>;
}

/// [`WorkerProcess`] backed by a `tokio::process::Child`.
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
    exit: Option<WorkerExit>,
}

impl ChildProcess {
    pub fn new(child: Child) -> Self {
        Self { child, exit: None }
    }

    fn record(&mut self, status: ExitStatus) -> WorkerExit {
        let exit = WorkerExit::from(status);
        self.exit = Some(exit);
        exit
    }
}

#[async_trait]
impl WorkerProcess for ChildProcess {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    fn try_wait(&mut self) -> MediaResult<Option<WorkerExit>> {
        if let Some(exit) = self.exit {
            return Ok(Some(exit));
        }

        Ok(self.child.try_wait()?.map(|status| self.record(status)))
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> MediaResult<()> {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        // Already reaped
        let Some(pid) = self.child.id() else {
            return Ok(());
        };

        let raw = i32::try_from(pid)
            .map_err(|_| MediaError::signal_failed(pid, "pid out of range"))?;

        match kill(Pid::from_raw(raw), Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(MediaError::signal_failed(pid, e.to_string())),
        }
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> MediaResult<()> {
        if self.try_wait()?.is_some() {
            return Ok(());
        }
        self.child.start_kill()?;
        Ok(())
    }

    async fn kill(&mut self) -> MediaResult<()> {
        if self.try_wait()?.is_some() {
            return Ok(());
        }

        self.child.kill().await?;
        if let Some(status) = self.child.try_wait()? {
            self.record(status);
        }
        Ok(())
    }

    async fn wait_timeout(&mut self, timeout: Duration) -> MediaResult<Option<WorkerExit>> {
        if let Some(exit) = self.exit {
            return Ok(Some(exit));
        }

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(status) => Ok(Some(self.record(status?))),
            Err(_) => Ok(None),
        }
    }
}

/// Spawns real OS processes.
///
/// Children are killed if their handle is dropped, so a supervisor that
/// loses a handle can never leave a worker running.
#[derive(Debug, Clone, Default)]
pub struct ProcessSpawner;

impl ProcessSpawner {
    pub fn new() -> Self {
        Self
    }
}

impl Spawner for ProcessSpawner {
    fn spawn(
        &self,
        program: &Path,
        args: &[String],
        stderr_log: &Path,
    ) -> MediaResult<Box<dyn WorkerProcess>> {
        if let Some(parent) = stderr_log.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| MediaError::LogFile {
                    path: stderr_log.to_path_buf(),
                    source,
                })?;
            }
        }

        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(stderr_log)
            .map_err(|source| MediaError::LogFile {
                path: stderr_log.to_path_buf(),
                source,
            })?;

        debug!(
            "Spawning: {} {}",
            program.display(),
            args.join(" ")
        );

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::spawn_failed(program.display().to_string(), e))?;

        Ok(Box::new(ChildProcess::new(child)))
    }
}
