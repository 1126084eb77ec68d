//! Restart policy.
//!
//! A restart always re-reads the registry, so a source removed by the
//! operator is stopped for good and an edited URL is picked up. If the
//! registry cannot be read the source is parked in the pending set and the
//! relaunch is retried once the registry is readable again.

use camstream_models::SourceId;
use tracing::{info, warn, Instrument};

use crate::error::StartError;
use crate::health::RestartReason;
use crate::logging::WorkerLogger;
use crate::metrics::{self, LaunchResult};
use crate::monitor::Supervisor;
use crate::registry::try_load;
use crate::shutdown::stop_handle;

/// Result of [`Supervisor::restart`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartOutcome {
    /// A new worker is running
    Relaunched,
    /// The source left the registry and was not relaunched
    Decommissioned,
    /// The new worker did not start; the source is pending
    RelaunchFailed,
    /// The registry could not be read; the source is pending
    Deferred,
}

impl Supervisor {
    /// Stop the worker for `source` and bring it back with its current URL.
    pub async fn restart(&mut self, source: &SourceId, reason: RestartReason) -> RestartOutcome {
        let logger = WorkerLogger::new(source);
        logger.log_restart(&reason);

        self.stop_source(source, &logger).await;

        let Some(sources) = try_load(self.registry.as_ref()) else {
            warn!(source_id = %source, "Relaunch deferred until the registry can be read");
            metrics::record_restart(source, &reason);
            self.pending.insert(source.clone(), self.clock.now());
            return RestartOutcome::Deferred;
        };
        let Some(url) = sources.get(source) else {
            self.pending.remove(source);
            logger.log_decommissioned();
            metrics::record_decommission(source);
            return RestartOutcome::Decommissioned;
        };

        metrics::record_restart(source, &reason);
        let settle = if reason.is_exit() {
            self.crash_settle_delay
        } else {
            self.settle_delay
        };
        self.clock.sleep(settle).await;

        if self.launch(source, url).await {
            RestartOutcome::Relaunched
        } else {
            RestartOutcome::RelaunchFailed
        }
    }

    /// Remove and stop the active worker for `source`, if any.
    async fn stop_source(&mut self, source: &SourceId, logger: &WorkerLogger) {
        let Some(mut handle) = self.active.remove(source) else {
            return;
        };
        match stop_handle(&mut handle, self.stop_timeout).await {
            Ok(outcome) => logger.log_stopped(outcome),
            Err(e) => logger.log_stop_failed(&e),
        }
    }

    /// Start a worker and record it as active, or as pending on failure.
    ///
    /// Returns whether the worker is running.
    pub(crate) async fn launch(&mut self, source: &SourceId, url: &str) -> bool {
        let logger = WorkerLogger::new(source);
        info!(source_id = %source, "Starting FFmpeg");

        let result = self
            .launcher
            .start(source, url)
            .instrument(logger.create_span())
            .await;

        match result {
            Ok(handle) => {
                logger.log_started(handle.pid(), handle.log_path());
                metrics::record_launch(source, LaunchResult::Started);
                self.pending.remove(source);
                self.active.insert(source.clone(), handle);
                true
            }
            Err(e) => {
                logger.log_start_failed(&e);
                let result = match &e {
                    StartError::ImmediateExit { .. } => LaunchResult::ImmediateExit,
                    StartError::Spawn(_) => LaunchResult::SpawnFailed,
                    StartError::Poll(_) => LaunchResult::PollFailed,
                };
                metrics::record_launch(source, result);
                self.pending.insert(source.clone(), self.clock.now());
                false
            }
        }
    }
}
