#![deny(unreachable_patterns)]
//! FFmpeg worker plumbing for the camstream supervisor.
//!
//! This crate provides:
//! - Type-safe RTSP → HLS FFmpeg command building
//! - Deterministic per-source output and log paths
//! - Process spawning with stderr redirected to an append-only log
//! - Liveness polling, terminate/kill and bounded waits behind a trait seam
//! - Diagnostic log tail reading for post-mortems

pub mod command;
pub mod error;
pub mod layout;
pub mod log_tail;
pub mod process;

pub use command::{check_ffmpeg, HlsCommand, HlsSettings};
pub use error::{MediaError, MediaResult};
pub use layout::SinkLayout;
pub use log_tail::read_log_tail;
pub use process::{ChildProcess, ProcessSpawner, Spawner, WorkerExit, WorkerProcess};
