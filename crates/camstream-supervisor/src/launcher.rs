//! Worker launcher.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use camstream_media::{read_log_tail, HlsCommand, HlsSettings, SinkLayout, Spawner};
use camstream_models::SourceId;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::StartError;
use crate::handle::WorkerHandle;

/// Launcher settings.
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    pub ffmpeg_bin: PathBuf,
    pub hls: HlsSettings,
    pub layout: SinkLayout,
    /// How long a new worker must survive to count as started
    pub startup_grace: Duration,
    /// Log lines captured when a worker dies during startup
    pub startup_tail_lines: usize,
}

/// Starts one worker per source and checks it survives startup.
pub struct Launcher {
    spawner: Arc<dyn Spawner>,
    clock: Arc<dyn Clock>,
    settings: LaunchSettings,
}

impl Launcher {
    pub fn new(spawner: Arc<dyn Spawner>, clock: Arc<dyn Clock>, settings: LaunchSettings) -> Self {
        Self {
            spawner,
            clock,
            settings,
        }
    }

    /// Spawn a worker for `source`, wait the startup grace, and poll once.
    ///
    /// A worker that has already exited is reported with the tail of its
    /// stderr log and no handle is returned.
    pub async fn start(&self, source: &SourceId, url: &str) -> Result<WorkerHandle, StartError> {
        let layout = &self.settings.layout;
        let playlist = layout.playlist_path(source);
        let log_path = layout.log_path(source);

        let command = HlsCommand::from_settings(
            url,
            &playlist,
            layout.segment_pattern(source),
            &self.settings.hls,
        );
        let args = command.build_args();
        debug!(source_id = %source, "Command: {} {}", self.settings.ffmpeg_bin.display(), args.join(" "));

        let spawned_at = self.clock.now();
        let mut process = self
            .spawner
            .spawn(&self.settings.ffmpeg_bin, &args, &log_path)
            .map_err(StartError::Spawn)?;

        self.clock.sleep(self.settings.startup_grace).await;

        match process.try_wait() {
            Ok(None) => {}
            Ok(Some(exit)) => {
                let tail = match read_log_tail(&log_path, self.settings.startup_tail_lines).await {
                    Ok(tail) => tail,
                    Err(e) => {
                        warn!(source_id = %source, "Could not read worker log: {}", e);
                        Vec::new()
                    }
                };
                return Err(StartError::ImmediateExit { exit, tail });
            }
            Err(e) => {
                if let Err(kill_err) = process.kill().await {
                    warn!(source_id = %source, "Failed to kill unpollable worker: {}", kill_err);
                }
                return Err(StartError::Poll(e));
            }
        }

        Ok(WorkerHandle::new(
            source.clone(),
            url,
            process,
            spawned_at,
            self.clock.now(),
            playlist,
            log_path,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{id, FakeClock, FakeSpawner, SpawnPlan};
    use camstream_media::WorkerExit;
    use tokio_test::assert_ok;

    fn launcher(spawner: Arc<FakeSpawner>, clock: Arc<FakeClock>, layout: SinkLayout) -> Launcher {
        Launcher::new(
            spawner,
            clock,
            LaunchSettings {
                ffmpeg_bin: PathBuf::from("ffmpeg"),
                hls: HlsSettings::default(),
                layout,
                startup_grace: Duration::from_secs(3),
                startup_tail_lines: 30,
            },
        )
    }

    #[tokio::test]
    async fn test_start_returns_handle_after_grace() {
        let spawner = FakeSpawner::new();
        let clock = FakeClock::new();
        let launcher = launcher(
            spawner.clone(),
            clock.clone(),
            SinkLayout::new("/hls", "/logs"),
        );
        let t0 = clock.now();

        let handle = assert_ok!(launcher.start(&id("camA"), "rtsp://10.0.0.5/s1").await);

        assert_eq!(clock.sleeps(), [Duration::from_secs(3)]);
        assert_eq!(handle.source_id(), &id("camA"));
        assert_eq!(handle.url(), "rtsp://10.0.0.5/s1");
        assert_eq!(handle.spawned_at(), t0);
        assert_eq!(handle.started_at(), t0 + chrono::Duration::seconds(3));
        assert_eq!(handle.last_healthy(), handle.started_at());
        assert_eq!(handle.output_path(), PathBuf::from("/hls/camA.m3u8"));
        assert_eq!(handle.log_path(), PathBuf::from("/logs/ffmpeg_camA_error.log"));

        let spawns = spawner.spawns();
        assert_eq!(spawns.len(), 1);
        assert_eq!(spawns[0].program, PathBuf::from("ffmpeg"));
        assert_eq!(spawns[0].input(), Some("rtsp://10.0.0.5/s1"));
        assert_eq!(spawns[0].args.last().map(String::as_str), Some("/hls/camA.m3u8"));
        assert_eq!(spawns[0].log_path, PathBuf::from("/logs/ffmpeg_camA_error.log"));
    }

    #[tokio::test]
    async fn test_immediate_exit_reports_log_tail() {
        let temp_dir = tempfile::tempdir().unwrap();
        let spawner = FakeSpawner::new();
        let clock = FakeClock::new();
        let launcher = launcher(
            spawner.clone(),
            clock,
            SinkLayout::new(temp_dir.path(), temp_dir.path()),
        );

        let stderr: Vec<String> = (0..40).map(|i| format!("err {}", i)).collect();
        spawner.plan(
            "rtsp://bad",
            SpawnPlan::ExitImmediately {
                code: 1,
                stderr: stderr.clone(),
            },
        );

        match launcher.start(&id("camB"), "rtsp://bad").await {
            Err(StartError::ImmediateExit { exit, tail }) => {
                assert_eq!(exit, WorkerExit::from_code(1));
                assert_eq!(tail.len(), 30);
                assert_eq!(tail.first().map(String::as_str), Some("err 10"));
                assert_eq!(tail.last().map(String::as_str), Some("err 39"));
            }
            other => panic!("expected immediate exit, got {:?}", other.map(|h| h.pid())),
        }
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let spawner = FakeSpawner::new();
        let clock = FakeClock::new();
        let launcher = launcher(spawner.clone(), clock.clone(), SinkLayout::new("/hls", "/logs"));
        spawner.plan("rtsp://a", SpawnPlan::FailSpawn);

        let err = launcher.start(&id("camA"), "rtsp://a").await.unwrap_err();
        assert!(matches!(err, StartError::Spawn(_)));
        // No startup wait for a worker that never started
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_unpollable_worker_is_killed() {
        struct PollFailSpawner(Arc<FakeSpawner>);

        impl Spawner for PollFailSpawner {
            fn spawn(
                &self,
                program: &std::path::Path,
                args: &[String],
                stderr_log: &std::path::Path,
            ) -> camstream_media::MediaResult<Box<dyn camstream_media::WorkerProcess>> {
                let process = self.0.spawn(program, args, stderr_log)?;
                self.0.latest("rtsp://a").fail_polls("ECHILD");
                Ok(process)
            }
        }

        let inner = FakeSpawner::new();
        let launcher = Launcher::new(
            Arc::new(PollFailSpawner(inner.clone())),
            FakeClock::new(),
            LaunchSettings {
                ffmpeg_bin: PathBuf::from("ffmpeg"),
                hls: HlsSettings::default(),
                layout: SinkLayout::new("/hls", "/logs"),
                startup_grace: Duration::from_secs(3),
                startup_tail_lines: 30,
            },
        );

        let err = launcher.start(&id("camA"), "rtsp://a").await.unwrap_err();
        assert!(matches!(err, StartError::Poll(_)));
        assert_eq!(inner.latest("rtsp://a").kill_calls(), 1);
    }
}
