//! Supervisor for per-source FFmpeg RTSP → HLS workers.
//!
//! This crate provides:
//! - Boot of one worker per registered source
//! - Periodic health classification from process liveness and output freshness
//! - Restart with a fresh registry read, and decommissioning of removed sources
//! - Bounded graceful shutdown of every worker on termination signals

pub mod clock;
pub mod config;
pub mod error;
pub mod handle;
pub mod health;
pub mod launcher;
pub mod logging;
pub mod metrics;
pub mod monitor;
pub mod probe;
pub mod registry;
pub mod restart;
pub mod shutdown;

#[cfg(test)]
mod testing;

pub use clock::{Clock, SystemClock};
pub use config::SupervisorConfig;
pub use error::{StartError, StopError, SupervisorError, SupervisorResult};
pub use handle::WorkerHandle;
pub use health::{classify, Health, HealthThresholds, RestartReason};
pub use launcher::Launcher;
pub use logging::WorkerLogger;
pub use monitor::{BootOutcome, Supervisor, TickReport};
pub use probe::{FsProbe, OutputProbe, OutputState};
pub use registry::{JsonFileRegistry, SourceRegistry};
pub use restart::RestartOutcome;
pub use shutdown::{install_shutdown_signal, stop_handle, StopOutcome};
