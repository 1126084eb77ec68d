//! camstream supervisor binary.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use camstream_media::{check_ffmpeg, ProcessSpawner};
use camstream_supervisor::{
    install_shutdown_signal, BootOutcome, FsProbe, JsonFileRegistry, Supervisor,
    SupervisorConfig, SupervisorError, SystemClock,
};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("camstream_supervisor=info".parse().unwrap())
        .add_directive("camstream_media=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting camstream-supervisor");

    // Before any worker exists, so no signal can orphan one
    let shutdown = match install_shutdown_signal() {
        Ok(shutdown) => shutdown,
        Err(e) => {
            error!("Failed to listen for shutdown signals: {}", e);
            std::process::exit(1);
        }
    };
    tokio::pin!(shutdown);

    let config = SupervisorConfig::from_env();
    info!("Supervisor config: {:?}", config);

    let mut supervisor = match prepare(&config).await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to start supervisor: {:#}", e);
            std::process::exit(1);
        }
    };

    match supervisor.boot(&mut shutdown).await {
        Ok(BootOutcome::Started { running }) => {
            info!(running, "Supervisor booted");
            supervisor.run(shutdown).await;
        }
        Ok(BootOutcome::Interrupted) => {}
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }

    info!("Supervisor shutdown complete");
}

/// Check the environment and wire up the production seams.
async fn prepare(config: &SupervisorConfig) -> anyhow::Result<Supervisor> {
    if let Some(addr) = config.metrics_addr {
        camstream_supervisor::metrics::init_metrics(addr).context("Failed to install Prometheus exporter")?;
        info!("Metrics exporter listening on {}", addr);
    }

    let ffmpeg = check_ffmpeg(&config.ffmpeg_bin).map_err(SupervisorError::FfmpegUnavailable)?;
    info!("Using FFmpeg at {}", ffmpeg.display());

    let layout = config.layout();
    layout
        .ensure_dirs()
        .await
        .map_err(SupervisorError::from)
        .context("Failed to create output directories")?;
    info!(
        output_dir = %config.output_dir.display(),
        log_dir = %config.log_dir.display(),
        "Output directories ready"
    );

    Ok(Supervisor::new(
        config,
        Arc::new(JsonFileRegistry::new(&config.registry_path)),
        Arc::new(FsProbe),
        Arc::new(SystemClock),
        Arc::new(ProcessSpawner::new()),
    ))
}
