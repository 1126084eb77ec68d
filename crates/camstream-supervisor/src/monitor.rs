//! Health monitor: the single control loop that owns every worker.
//!
//! All bookkeeping lives in [`Supervisor`] and is only touched from the task
//! that drives [`Supervisor::run`]. A tick evaluates handles one at a time in
//! source-id order, and any restart finishes before the next handle is looked
//! at.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use camstream_media::{read_log_tail, Spawner};
use camstream_models::SourceId;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::clock::{elapsed, Clock};
use crate::config::SupervisorConfig;
use crate::error::{SupervisorError, SupervisorResult};
use crate::handle::WorkerHandle;
use crate::health::{classify, Health, HealthThresholds, Liveness, Observation, OutputObservation};
use crate::launcher::{LaunchSettings, Launcher};
use crate::logging::WorkerLogger;
use crate::metrics;
use crate::probe::OutputProbe;
use crate::registry::{load_or_empty, try_load, SourceRegistry};
use crate::restart::RestartOutcome;

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Handles whose output was confirmed fresh
    pub refreshed: usize,
    /// Handles stopped for a restart, whether or not a new worker came up
    pub restarted: usize,
    /// Restarts left pending because the registry could not be read
    pub deferred: usize,
    /// Sources stopped for good because the registry dropped them
    pub decommissioned: usize,
    /// Pending sources brought back up
    pub relaunched: usize,
    /// Launch attempts that failed and were left pending
    pub relaunch_failures: usize,
    /// Handles whose state could not be determined
    pub inconclusive: usize,
}

/// Result of [`Supervisor::boot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    /// Every source was attempted; `running` workers are up
    Started { running: usize },
    /// Shutdown arrived mid-boot and every started worker was stopped
    Interrupted,
}

/// Owns the active worker set and drives boot, monitoring and shutdown.
pub struct Supervisor {
    pub(crate) registry: Arc<dyn SourceRegistry>,
    pub(crate) probe: Arc<dyn OutputProbe>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) launcher: Launcher,
    pub(crate) thresholds: HealthThresholds,
    pub(crate) tick_interval: Duration,
    pub(crate) settle_delay: Duration,
    pub(crate) crash_settle_delay: Duration,
    pub(crate) stop_timeout: Duration,
    pub(crate) launch_stagger: Duration,
    pub(crate) relaunch_backoff: Duration,
    pub(crate) crash_tail_lines: usize,
    pub(crate) active: BTreeMap<SourceId, WorkerHandle>,
    /// Sources whose last launch failed, with the failure time
    pub(crate) pending: BTreeMap<SourceId, DateTime<Utc>>,
}

impl Supervisor {
    pub fn new(
        config: &SupervisorConfig,
        registry: Arc<dyn SourceRegistry>,
        probe: Arc<dyn OutputProbe>,
        clock: Arc<dyn Clock>,
        spawner: Arc<dyn Spawner>,
    ) -> Self {
        let launcher = Launcher::new(
            spawner,
            Arc::clone(&clock),
            LaunchSettings {
                ffmpeg_bin: config.ffmpeg_bin.clone(),
                hls: config.hls.clone(),
                layout: config.layout(),
                startup_grace: config.startup_grace,
                startup_tail_lines: config.startup_tail_lines,
            },
        );

        Self {
            registry,
            probe,
            clock,
            launcher,
            thresholds: config.thresholds,
            tick_interval: config.tick_interval,
            settle_delay: config.settle_delay,
            crash_settle_delay: config.crash_settle_delay,
            stop_timeout: config.stop_timeout,
            launch_stagger: config.launch_stagger,
            relaunch_backoff: config.relaunch_backoff,
            crash_tail_lines: config.crash_tail_lines,
            active: BTreeMap::new(),
            pending: BTreeMap::new(),
        }
    }

    /// Sources with a live worker, in id order.
    pub fn active_sources(&self) -> Vec<SourceId> {
        self.active.keys().cloned().collect()
    }

    /// Sources waiting for a relaunch retry, in id order.
    pub fn pending_sources(&self) -> Vec<SourceId> {
        self.pending.keys().cloned().collect()
    }

    pub fn handle(&self, source: &SourceId) -> Option<&WorkerHandle> {
        self.active.get(source)
    }

    /// Launch a worker for every registered source.
    ///
    /// Sources that fail to start are left pending for the monitor to retry.
    /// `shutdown` is checked before every launch; once it completes the
    /// workers started so far are stopped and boot returns
    /// [`BootOutcome::Interrupted`].
    pub async fn boot<F>(&mut self, shutdown: &mut F) -> SupervisorResult<BootOutcome>
    where
        F: Future<Output = ()> + Unpin,
    {
        let sources = load_or_empty(self.registry.as_ref());
        if sources.is_empty() {
            return Err(SupervisorError::EmptyRegistry(self.registry.describe()));
        }

        info!(count = sources.len(), "Starting FFmpeg processes");
        for (i, (source, url)) in sources.iter().enumerate() {
            let stagger = async {
                if i > 0 {
                    self.clock.sleep(self.launch_stagger).await;
                }
            };
            let interrupted = tokio::select! {
                biased;
                _ = &mut *shutdown => true,
                _ = stagger => false,
            };
            if interrupted {
                info!(launched = i, "Shutdown requested during boot");
                self.stop_all().await;
                return Ok(BootOutcome::Interrupted);
            }
            self.launch(source, url).await;
        }

        metrics::set_worker_counts(self.active.len(), self.pending.len());
        info!(
            running = self.active.len(),
            pending = self.pending.len(),
            "Boot complete"
        );
        Ok(BootOutcome::Started {
            running: self.active.len(),
        })
    }

    /// Evaluate every worker once and act on the result.
    pub async fn tick(&mut self) -> TickReport {
        let started = Instant::now();
        let mut report = TickReport::default();

        // Workers relaunched from the pending set are first evaluated next tick
        let sources = self.active_sources();
        self.retry_pending(&mut report).await;

        for source in sources {
            let Some(handle) = self.active.get_mut(&source) else {
                continue;
            };

            let liveness = match handle.poll_exit() {
                Ok(None) => Liveness::Running,
                Ok(Some(exit)) => Liveness::Exited(exit),
                Err(e) => Liveness::Unknown(e.to_string()),
            };
            let output = match self.probe.probe(handle.output_path()).await {
                Ok(state) => OutputObservation::Observed(state),
                Err(e) => OutputObservation::Unreadable(e.to_string()),
            };

            let now = self.clock.now();
            let observation = Observation {
                liveness,
                output,
                now,
                spawned_at: handle.spawned_at(),
                started_at: handle.started_at(),
                last_healthy: handle.last_healthy(),
            };

            let health = classify(&observation, &self.thresholds);
            debug!(source_id = %source, health = health.as_str(), "Health classified");
            match &health {
                Health::Healthy { refresh: true } => {
                    handle.mark_healthy(now);
                    report.refreshed += 1;
                    continue;
                }
                Health::Healthy { refresh: false } | Health::Starting => continue,
                Health::Inconclusive { reason } => {
                    warn!(source_id = %source, "Health check inconclusive: {}", reason);
                    report.inconclusive += 1;
                    continue;
                }
                Health::Dead { exit } => {
                    let logger = WorkerLogger::new(&source);
                    logger.log_exit(*exit);
                    let log_path = handle.log_path().to_path_buf();
                    match read_log_tail(&log_path, self.crash_tail_lines).await {
                        Ok(tail) => logger.log_tail("Last FFmpeg error output", &tail),
                        Err(e) => warn!(source_id = %source, "Could not read worker log: {}", e),
                    }
                }
                Health::Stalled { .. } | Health::Silent { .. } | Health::Unresponsive { .. } => {}
            }

            let Some(reason) = health.restart_reason() else {
                continue;
            };
            match self.restart(&source, reason).await {
                RestartOutcome::Relaunched => report.restarted += 1,
                RestartOutcome::RelaunchFailed => {
                    report.restarted += 1;
                    report.relaunch_failures += 1;
                }
                RestartOutcome::Deferred => {
                    report.restarted += 1;
                    report.deferred += 1;
                }
                RestartOutcome::Decommissioned => report.decommissioned += 1,
            }
        }

        metrics::set_worker_counts(self.active.len(), self.pending.len());
        metrics::record_tick_duration(started.elapsed().as_secs_f64());
        debug!(
            active = self.active.len(),
            pending = self.pending.len(),
            refreshed = report.refreshed,
            restarted = report.restarted,
            deferred = report.deferred,
            decommissioned = report.decommissioned,
            relaunched = report.relaunched,
            relaunch_failures = report.relaunch_failures,
            inconclusive = report.inconclusive,
            "Tick complete"
        );
        report
    }

    /// Retry pending launches whose backoff has elapsed.
    async fn retry_pending(&mut self, report: &mut TickReport) {
        let now = self.clock.now();
        let due: Vec<SourceId> = self
            .pending
            .iter()
            .filter(|(_, failed_at)| elapsed(**failed_at, now) >= self.relaunch_backoff)
            .map(|(source, _)| source.clone())
            .collect();
        if due.is_empty() {
            return;
        }

        // Pending sources wait for a readable registry rather than being dropped
        let Some(sources) = try_load(self.registry.as_ref()) else {
            return;
        };
        for source in due {
            match sources.get(&source) {
                Some(url) => {
                    if self.launch(&source, url).await {
                        report.relaunched += 1;
                    } else {
                        report.relaunch_failures += 1;
                    }
                }
                None => {
                    self.pending.remove(&source);
                    WorkerLogger::new(&source).log_decommissioned();
                    metrics::record_decommission(&source);
                    report.decommissioned += 1;
                }
            }
        }
    }

    /// Tick every `tick_interval` until `shutdown` completes, then stop all workers.
    ///
    /// Shutdown is only observed between ticks.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let clock = Arc::clone(&self.clock);
        let interval = self.tick_interval;

        info!(
            interval_secs = interval.as_secs_f64(),
            workers = self.active.len(),
            "Monitoring FFmpeg processes"
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = clock.sleep(interval) => {
                    self.tick().await;
                }
            }
        }

        self.stop_all().await;
    }
}
