//! Stopping workers and waiting for OS termination signals.
//!
//! ## Signals
//! **Unix platforms:** `SIGINT`, `SIGTERM` and `SIGQUIT` all request shutdown.
//!
//! **Other platforms:** `Ctrl-C`.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::StopError;
use crate::handle::WorkerHandle;
use crate::logging::WorkerLogger;
use crate::monitor::Supervisor;

/// How a worker ended up stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The worker had already exited before the stop began
    AlreadyExited,
    /// The worker exited after the polite termination request
    Terminated,
    /// The worker ignored termination and was killed
    Killed,
}

impl StopOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopOutcome::AlreadyExited => "already_exited",
            StopOutcome::Terminated => "terminated",
            StopOutcome::Killed => "killed",
        }
    }
}

/// Stop one worker: terminate, wait up to `timeout`, then kill.
///
/// Failures while terminating or waiting escalate to a kill. Only a failed
/// kill is reported as an error.
pub async fn stop_handle(
    handle: &mut WorkerHandle,
    timeout: Duration,
) -> Result<StopOutcome, StopError> {
    match handle.poll_exit() {
        Ok(Some(_)) => return Ok(StopOutcome::AlreadyExited),
        Ok(None) => {}
        Err(e) => {
            warn!(source_id = %handle.source_id(), "Liveness poll failed before stop: {}", e);
        }
    }

    let pid = handle.pid();
    match handle.process_mut().terminate() {
        Ok(()) => match handle.process_mut().wait_timeout(timeout).await {
            Ok(Some(exit)) => {
                handle.set_exit(exit);
                return Ok(StopOutcome::Terminated);
            }
            Ok(None) => {
                warn!(
                    source_id = %handle.source_id(),
                    timeout_secs = timeout.as_secs_f64(),
                    "FFmpeg did not exit after terminate, killing"
                );
            }
            Err(e) => {
                warn!(source_id = %handle.source_id(), "Wait after terminate failed: {}", e);
            }
        },
        Err(e) => {
            warn!(source_id = %handle.source_id(), "Terminate failed: {}", e);
        }
    }

    handle
        .process_mut()
        .kill()
        .await
        .map_err(|source| StopError { pid, source })?;
    if let Ok(Some(exit)) = handle.process_mut().try_wait() {
        handle.set_exit(exit);
    }
    Ok(StopOutcome::Killed)
}

impl Supervisor {
    /// Stop every active worker and forget pending relaunches.
    ///
    /// Individual failures are logged and do not abort the sweep. Calling
    /// this on an already empty supervisor does nothing.
    pub async fn stop_all(&mut self) {
        self.pending.clear();
        if self.active.is_empty() {
            return;
        }

        info!(count = self.active.len(), "Stopping all FFmpeg processes");
        let active = std::mem::take(&mut self.active);
        for (source, mut handle) in active {
            let logger = WorkerLogger::new(&source);
            match stop_handle(&mut handle, self.stop_timeout).await {
                Ok(outcome) => logger.log_stopped(outcome),
                Err(e) => logger.log_stop_failed(&e),
            }
        }
        crate::metrics::set_worker_counts(0, 0);
        info!("All FFmpeg processes stopped");
    }
}

/// Register termination signal handlers and return a future that completes
/// on the first signal.
///
/// Handlers are live as soon as this returns, so a signal that arrives
/// before the future is first polled is not lost and does not kill the
/// process. Install this before any worker is spawned.
#[cfg(unix)]
pub fn install_shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    Ok(async move {
        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT"),
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigquit.recv() => info!("Received SIGQUIT"),
        }
    })
}

/// Register the Ctrl-C handler and return a future that completes when it fires.
#[cfg(not(unix))]
pub fn install_shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    let mut ctrl_c = tokio::signal::windows::ctrl_c()?;

    Ok(async move {
        ctrl_c.recv().await;
        info!("Received Ctrl-C");
    })
}
