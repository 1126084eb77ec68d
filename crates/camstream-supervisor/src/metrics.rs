//! Prometheus metrics for the supervisor.

use std::net::SocketAddr;

use camstream_models::SourceId;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::health::RestartReason;

/// Install the Prometheus recorder with an HTTP listener on `addr`.
///
/// Must be called inside a tokio runtime. Without a recorder every
/// function in this module is a no-op.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const WORKER_RESTARTS_TOTAL: &str = "camstream_worker_restarts_total";
    pub const WORKER_LAUNCHES_TOTAL: &str = "camstream_worker_launches_total";
    pub const WORKERS_DECOMMISSIONED_TOTAL: &str = "camstream_workers_decommissioned_total";
    pub const WORKERS_ACTIVE: &str = "camstream_workers_active";
    pub const WORKERS_PENDING: &str = "camstream_workers_pending";
    pub const TICK_DURATION_SECONDS: &str = "camstream_tick_duration_seconds";
}

/// Outcome label of a launch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchResult {
    Started,
    ImmediateExit,
    SpawnFailed,
    PollFailed,
}

impl LaunchResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            LaunchResult::Started => "started",
            LaunchResult::ImmediateExit => "immediate_exit",
            LaunchResult::SpawnFailed => "spawn_failed",
            LaunchResult::PollFailed => "poll_failed",
        }
    }
}

pub fn record_restart(source: &SourceId, reason: &RestartReason) {
    let labels = [
        ("source", source.to_string()),
        ("reason", reason.as_label().to_string()),
    ];
    counter!(names::WORKER_RESTARTS_TOTAL, &labels).increment(1);
}

pub fn record_launch(source: &SourceId, result: LaunchResult) {
    let labels = [
        ("source", source.to_string()),
        ("result", result.as_str().to_string()),
    ];
    counter!(names::WORKER_LAUNCHES_TOTAL, &labels).increment(1);
}

pub fn record_decommission(source: &SourceId) {
    let labels = [("source", source.to_string())];
    counter!(names::WORKERS_DECOMMISSIONED_TOTAL, &labels).increment(1);
}

pub fn set_worker_counts(active: usize, pending: usize) {
    gauge!(names::WORKERS_ACTIVE).set(active as f64);
    gauge!(names::WORKERS_PENDING).set(pending as f64);
}

pub fn record_tick_duration(duration_secs: f64) {
    histogram!(names::TICK_DURATION_SECONDS).record(duration_secs);
}
