//! Worker health classification.
//!
//! [`classify`] is the single decision point for every "is this worker
//! broken" heuristic. It is a pure function of one [`Observation`], so the
//! precedence between the checks is fixed here and nowhere else:
//!
//! ```text
//! exited ─────────────────────────────────────────────► Dead
//! poll/probe failed ──────────────────────────────────► Inconclusive
//! no output, running > missing_output_grace ──────────► Silent
//! no output ──────────────────────────────────────────► Starting
//! output, last healthy > update_grace ago ────────────► Unresponsive
//! output older than staleness_threshold ──────────────► Stalled
//! output within freshness_window ─────────────────────► Healthy { refresh: true }
//! otherwise ──────────────────────────────────────────► Healthy { refresh: false }
//! ```
//!
//! "No output" includes a playlist last written before the worker was
//! spawned, since that file belongs to the worker it replaced.

use std::fmt;
use std::time::Duration;

use camstream_media::WorkerExit;
use chrono::{DateTime, Utc};

use crate::clock::elapsed;
use crate::probe::OutputState;

/// Thresholds driving [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthThresholds {
    /// A running worker with no output after this long is `Silent`
    pub missing_output_grace: Duration,
    /// A worker not confirmed healthy for this long is `Unresponsive`
    pub update_grace: Duration,
    /// Output older than this is `Stalled`
    pub staleness_threshold: Duration,
    /// Output younger than this refreshes the healthy timestamp
    pub freshness_window: Duration,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            missing_output_grace: Duration::from_secs(30),
            update_grace: Duration::from_secs(300),
            staleness_threshold: Duration::from_secs(15),
            freshness_window: Duration::from_secs(5),
        }
    }
}

/// Result of the liveness poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Liveness {
    Running,
    Exited(WorkerExit),
    /// The poll itself failed
    Unknown(String),
}

/// Result of the output probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputObservation {
    Observed(OutputState),
    /// The probe failed; nothing is known about the artifact
    Unreadable(String),
}

/// Everything [`classify`] looks at for one handle in one tick.
#[derive(Debug, Clone)]
pub struct Observation {
    pub liveness: Liveness,
    pub output: OutputObservation,
    pub now: DateTime<Utc>,
    pub spawned_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub last_healthy: DateTime<Utc>,
}

/// Health of one worker at one tick. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Health {
    /// Running, no output yet, still inside the startup grace
    Starting,
    /// Running with output inside the staleness threshold
    Healthy { refresh: bool },
    /// Running but the output stopped advancing
    Stalled { output_age: Duration },
    /// Running but never produced output
    Silent { running_for: Duration },
    /// Running but not confirmed healthy for too long
    Unresponsive { since_healthy: Duration },
    /// The process exited
    Dead { exit: WorkerExit },
    /// Liveness or output could not be determined this tick
    Inconclusive { reason: String },
}

impl Health {
    /// Why this state requires a restart, if it does.
    pub fn restart_reason(&self) -> Option<RestartReason> {
        match self {
            Health::Dead { exit } => Some(RestartReason::Exited(*exit)),
            Health::Silent { running_for } => Some(RestartReason::NoOutput {
                running_for: *running_for,
            }),
            Health::Unresponsive { since_healthy } => Some(RestartReason::NoProgress {
                since_healthy: *since_healthy,
            }),
            Health::Stalled { output_age } => Some(RestartReason::Stalled {
                output_age: *output_age,
            }),
            Health::Starting | Health::Healthy { .. } | Health::Inconclusive { .. } => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Health::Starting => "starting",
            Health::Healthy { .. } => "healthy",
            Health::Stalled { .. } => "stalled",
            Health::Silent { .. } => "silent",
            Health::Unresponsive { .. } => "unresponsive",
            Health::Dead { .. } => "dead",
            Health::Inconclusive { .. } => "inconclusive",
        }
    }
}

/// Why a worker is being restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    Exited(WorkerExit),
    NoOutput { running_for: Duration },
    NoProgress { since_healthy: Duration },
    Stalled { output_age: Duration },
}

impl RestartReason {
    /// Metric label.
    pub fn as_label(&self) -> &'static str {
        match self {
            RestartReason::Exited(_) => "exited",
            RestartReason::NoOutput { .. } => "no_output",
            RestartReason::NoProgress { .. } => "no_progress",
            RestartReason::Stalled { .. } => "stalled",
        }
    }

    /// Whether the worker ended on its own.
    pub fn is_exit(&self) -> bool {
        matches!(self, RestartReason::Exited(_))
    }
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartReason::Exited(exit) => write!(f, "worker exited ({})", exit),
            RestartReason::NoOutput { running_for } => write!(
                f,
                "running for {:.1}s without an output file",
                running_for.as_secs_f64()
            ),
            RestartReason::NoProgress { since_healthy } => write!(
                f,
                "no healthy output for {:.1}s",
                since_healthy.as_secs_f64()
            ),
            RestartReason::Stalled { output_age } => write!(
                f,
                "output hasn't updated in {:.1}s",
                output_age.as_secs_f64()
            ),
        }
    }
}

/// Classify one observation.
pub fn classify(obs: &Observation, thresholds: &HealthThresholds) -> Health {
    match &obs.liveness {
        Liveness::Exited(exit) => return Health::Dead { exit: *exit },
        Liveness::Unknown(reason) => {
            return Health::Inconclusive {
                reason: format!("liveness poll failed: {}", reason),
            }
        }
        Liveness::Running => {}
    }

    let modified = match &obs.output {
        OutputObservation::Unreadable(reason) => {
            return Health::Inconclusive {
                reason: format!("output probe failed: {}", reason),
            }
        }
        OutputObservation::Observed(OutputState::Present { modified })
            if *modified >= obs.spawned_at =>
        {
            *modified
        }
        // A playlist older than the process was left by a previous worker
        OutputObservation::Observed(_) => {
            let running_for = elapsed(obs.started_at, obs.now);
            return if running_for > thresholds.missing_output_grace {
                Health::Silent { running_for }
            } else {
                Health::Starting
            };
        }
    };

    let since_healthy = elapsed(obs.last_healthy, obs.now);
    if since_healthy > thresholds.update_grace {
        return Health::Unresponsive { since_healthy };
    }

    let output_age = elapsed(modified, obs.now);
    if output_age > thresholds.staleness_threshold {
        return Health::Stalled { output_age };
    }

    Health::Healthy {
        refresh: output_age <= thresholds.freshness_window,
    }
}
