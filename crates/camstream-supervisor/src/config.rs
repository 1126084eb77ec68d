//! Supervisor configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use camstream_media::{HlsSettings, SinkLayout};

use crate::health::HealthThresholds;

/// Supervisor configuration.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// JSON file mapping source id → stream URL
    pub registry_path: PathBuf,
    /// Directory the HLS playlists and segments are written to
    pub output_dir: PathBuf,
    /// Directory for per-source FFmpeg stderr logs
    pub log_dir: PathBuf,
    /// FFmpeg binary (name looked up in PATH, or a path)
    pub ffmpeg_bin: PathBuf,
    /// HLS output settings passed to every worker
    pub hls: HlsSettings,
    /// Period of the health monitor
    pub tick_interval: Duration,
    /// How long a fresh worker must survive to count as started
    pub startup_grace: Duration,
    /// Health classification thresholds
    pub thresholds: HealthThresholds,
    /// Pause between stopping a worker and relaunching it
    pub settle_delay: Duration,
    /// Pause before relaunching a worker that exited on its own
    pub crash_settle_delay: Duration,
    /// Grace period between terminate and kill
    pub stop_timeout: Duration,
    /// Pause between launches at boot
    pub launch_stagger: Duration,
    /// Minimum time before a failed launch is attempted again
    pub relaunch_backoff: Duration,
    /// Log lines reported when a worker dies during startup
    pub startup_tail_lines: usize,
    /// Log lines reported when a running worker exits
    pub crash_tail_lines: usize,
    /// Prometheus listener address (disabled when unset)
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            registry_path: PathBuf::from("camera_config.json"),
            output_dir: PathBuf::from("/var/www/html/hls"),
            log_dir: PathBuf::from("logs"),
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            hls: HlsSettings::default(),
            tick_interval: Duration::from_secs(5),
            startup_grace: Duration::from_secs(3),
            thresholds: HealthThresholds::default(),
            settle_delay: Duration::from_secs(3),
            crash_settle_delay: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            launch_stagger: Duration::from_secs(1),
            relaunch_backoff: Duration::from_secs(30),
            startup_tail_lines: 30,
            crash_tail_lines: 20,
            metrics_addr: None,
        }
    }
}

impl SupervisorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup; unset or unparsable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parse = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let secs = |key: &str, default: Duration| {
            parse(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        let hls_defaults = HlsSettings::default();
        let hls = HlsSettings {
            log_level: parse("CAMSTREAM_FFMPEG_LOG_LEVEL").unwrap_or(hls_defaults.log_level),
            segment_secs: parsed(parse("CAMSTREAM_HLS_SEGMENT_SECS"), hls_defaults.segment_secs),
            list_size: parsed(parse("CAMSTREAM_HLS_LIST_SIZE"), hls_defaults.list_size),
            ..hls_defaults
        };

        let t = defaults.thresholds;
        let thresholds = HealthThresholds {
            missing_output_grace: secs("CAMSTREAM_MISSING_OUTPUT_GRACE_SECS", t.missing_output_grace),
            update_grace: secs("CAMSTREAM_UPDATE_GRACE_SECS", t.update_grace),
            staleness_threshold: secs("CAMSTREAM_STALENESS_SECS", t.staleness_threshold),
            freshness_window: secs("CAMSTREAM_FRESHNESS_SECS", t.freshness_window),
        };

        Self {
            registry_path: parse("CAMSTREAM_REGISTRY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.registry_path),
            output_dir: parse("CAMSTREAM_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            log_dir: parse("CAMSTREAM_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            ffmpeg_bin: parse("CAMSTREAM_FFMPEG_BIN")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg_bin),
            hls,
            tick_interval: secs("CAMSTREAM_TICK_INTERVAL_SECS", defaults.tick_interval),
            startup_grace: secs("CAMSTREAM_STARTUP_GRACE_SECS", defaults.startup_grace),
            thresholds,
            settle_delay: secs("CAMSTREAM_SETTLE_DELAY_SECS", defaults.settle_delay),
            crash_settle_delay: secs(
                "CAMSTREAM_CRASH_SETTLE_DELAY_SECS",
                defaults.crash_settle_delay,
            ),
            stop_timeout: secs("CAMSTREAM_STOP_TIMEOUT_SECS", defaults.stop_timeout),
            launch_stagger: secs("CAMSTREAM_LAUNCH_STAGGER_SECS", defaults.launch_stagger),
            relaunch_backoff: secs("CAMSTREAM_RELAUNCH_BACKOFF_SECS", defaults.relaunch_backoff),
            startup_tail_lines: parsed(
                parse("CAMSTREAM_STARTUP_TAIL_LINES"),
                defaults.startup_tail_lines,
            ),
            crash_tail_lines: parsed(parse("CAMSTREAM_CRASH_TAIL_LINES"), defaults.crash_tail_lines),
            metrics_addr: parse("CAMSTREAM_METRICS_ADDR").and_then(|v| v.trim().parse().ok()),
        }
    }

    /// Output/log path layout derived from this config.
    pub fn layout(&self) -> SinkLayout {
        SinkLayout::new(&self.output_dir, &self.log_dir)
    }
}

fn parsed<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
