//! In-memory fakes for the supervisor's seams.

use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use camstream_media::{MediaError, MediaResult, Spawner, WorkerExit, WorkerProcess};
use camstream_models::{SourceId, SourceMap};
use chrono::{DateTime, TimeZone, Utc};

use crate::clock::Clock;
use crate::error::{ProbeError, RegistryError};
use crate::probe::{OutputProbe, OutputState};
use crate::registry::SourceRegistry;

pub fn id(s: &str) -> SourceId {
    SourceId::parse(s).unwrap()
}

// ---- Clock ----

/// Manual clock; `sleep` advances time instantly and is recorded.
pub struct FakeClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl FakeClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
            sleeps: Mutex::new(Vec::new()),
        })
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(duration).unwrap();
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn clear_sleeps(&self) {
        self.sleeps.lock().unwrap().clear();
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(duration);
    }
}

// ---- Process ----

#[derive(Debug, Default)]
struct ProcessState {
    pid: u32,
    exit: Option<WorkerExit>,
    ignores_terminate: bool,
    poll_error: Option<String>,
    kill_fails: bool,
    terminate_calls: usize,
    kill_calls: usize,
}

/// Scriptable worker process.
pub struct FakeProcess {
    state: Arc<Mutex<ProcessState>>,
}

/// Test-side handle onto a [`FakeProcess`].
#[derive(Clone)]
pub struct ProcessControl {
    state: Arc<Mutex<ProcessState>>,
}

impl FakeProcess {
    pub fn running(pid: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(ProcessState {
                pid,
                ..Default::default()
            })),
        }
    }

    pub fn control(&self) -> ProcessControl {
        ProcessControl {
            state: Arc::clone(&self.state),
        }
    }
}

impl ProcessControl {
    pub fn exit_with(&self, exit: WorkerExit) {
        self.state.lock().unwrap().exit = Some(exit);
    }

    pub fn ignore_terminate(&self) {
        self.state.lock().unwrap().ignores_terminate = true;
    }

    pub fn fail_polls(&self, reason: &str) {
        self.state.lock().unwrap().poll_error = Some(reason.to_string());
    }

    pub fn fail_kill(&self) {
        self.state.lock().unwrap().kill_fails = true;
    }

    pub fn is_alive(&self) -> bool {
        self.state.lock().unwrap().exit.is_none()
    }

    pub fn terminate_calls(&self) -> usize {
        self.state.lock().unwrap().terminate_calls
    }

    pub fn kill_calls(&self) -> usize {
        self.state.lock().unwrap().kill_calls
    }
}

#[async_trait]
impl WorkerProcess for FakeProcess {
    fn pid(&self) -> Option<u32> {
        let state = self.state.lock().unwrap();
        state.exit.is_none().then_some(state.pid)
    }

    fn try_wait(&mut self) -> MediaResult<Option<WorkerExit>> {
        let state = self.state.lock().unwrap();
        if let Some(reason) = &state.poll_error {
            return Err(MediaError::Io(std::io::Error::other(reason.clone())));
        }
        Ok(state.exit)
    }

    fn terminate(&mut self) -> MediaResult<()> {
        let mut state = self.state.lock().unwrap();
        state.terminate_calls += 1;
        if !state.ignores_terminate && state.exit.is_none() {
            state.exit = Some(WorkerExit::from_signal(15));
        }
        Ok(())
    }

    async fn kill(&mut self) -> MediaResult<()> {
        let mut state = self.state.lock().unwrap();
        state.kill_calls += 1;
        if state.kill_fails {
            return Err(MediaError::signal_failed(state.pid, "EPERM"));
        }
        if state.exit.is_none() {
            state.exit = Some(WorkerExit::from_signal(9));
        }
        Ok(())
    }

    async fn wait_timeout(&mut self, _timeout: Duration) -> MediaResult<Option<WorkerExit>> {
        Ok(self.state.lock().unwrap().exit)
    }
}

// ---- Spawner ----

/// What the next spawn for a URL does.
#[derive(Debug, Clone)]
pub enum SpawnPlan {
    Run,
    /// Exits before the startup check, after writing `stderr` to the log
    ExitImmediately { code: i32, stderr: Vec<String> },
    FailSpawn,
}

#[derive(Debug, Clone)]
pub struct SpawnRecord {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub log_path: PathBuf,
}

impl SpawnRecord {
    /// The `-i` input URL.
    pub fn input(&self) -> Option<&str> {
        let pos = self.args.iter().position(|a| a == "-i")?;
        self.args.get(pos + 1).map(String::as_str)
    }
}

#[derive(Default)]
struct SpawnerState {
    plans: HashMap<String, VecDeque<SpawnPlan>>,
    spawns: Vec<SpawnRecord>,
    processes: Vec<(String, ProcessControl)>,
    next_pid: u32,
}

/// Spawner that hands out [`FakeProcess`]es, scripted per input URL.
#[derive(Default)]
pub struct FakeSpawner {
    state: Mutex<SpawnerState>,
}

impl FakeSpawner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a plan for the next spawn of `url`; unplanned spawns `Run`.
    pub fn plan(&self, url: &str, plan: SpawnPlan) {
        self.state
            .lock()
            .unwrap()
            .plans
            .entry(url.to_string())
            .or_default()
            .push_back(plan);
    }

    pub fn spawns(&self) -> Vec<SpawnRecord> {
        self.state.lock().unwrap().spawns.clone()
    }

    pub fn spawn_count(&self, url: &str) -> usize {
        self.spawns()
            .iter()
            .filter(|s| s.input() == Some(url))
            .count()
    }

    /// Control of the latest process spawned for `url`.
    pub fn latest(&self, url: &str) -> ProcessControl {
        self.state
            .lock()
            .unwrap()
            .processes
            .iter()
            .rev()
            .find(|(u, _)| u == url)
            .map(|(_, c)| c.clone())
            .unwrap_or_else(|| panic!("no process spawned for {}", url))
    }
}

impl Spawner for FakeSpawner {
    fn spawn(
        &self,
        program: &Path,
        args: &[String],
        stderr_log: &Path,
    ) -> MediaResult<Box<dyn WorkerProcess>> {
        let mut state = self.state.lock().unwrap();
        let record = SpawnRecord {
            program: program.to_path_buf(),
            args: args.to_vec(),
            log_path: stderr_log.to_path_buf(),
        };
        let url = record.input().unwrap_or_default().to_string();
        state.spawns.push(record);

        let plan = state
            .plans
            .get_mut(&url)
            .and_then(VecDeque::pop_front)
            .unwrap_or(SpawnPlan::Run);

        state.next_pid += 1;
        let process = FakeProcess::running(1000 + state.next_pid);

        match plan {
            SpawnPlan::Run => {}
            SpawnPlan::ExitImmediately { code, stderr } => {
                if !stderr.is_empty() {
                    let mut log = std::fs::OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(stderr_log)
                        .unwrap();
                    for line in stderr {
                        writeln!(log, "{}", line).unwrap();
                    }
                }
                process.control().exit_with(WorkerExit::from_code(code));
            }
            SpawnPlan::FailSpawn => {
                return Err(MediaError::spawn_failed(
                    program.display().to_string(),
                    std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
                ));
            }
        }

        state.processes.push((url, process.control()));
        Ok(Box::new(process))
    }
}

// ---- Probe ----

#[derive(Debug, Clone)]
enum ProbeScript {
    Modified(DateTime<Utc>),
    Error,
}

/// Output probe with per-path scripted results; unknown paths are missing.
#[derive(Default)]
pub struct FakeProbe {
    paths: Mutex<HashMap<PathBuf, ProbeScript>>,
    calls: AtomicUsize,
}

impl FakeProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_modified(&self, path: impl Into<PathBuf>, modified: DateTime<Utc>) {
        self.paths
            .lock()
            .unwrap()
            .insert(path.into(), ProbeScript::Modified(modified));
    }

    pub fn set_missing(&self, path: impl AsRef<Path>) {
        self.paths.lock().unwrap().remove(path.as_ref());
    }

    pub fn set_error(&self, path: impl Into<PathBuf>) {
        self.paths
            .lock()
            .unwrap()
            .insert(path.into(), ProbeScript::Error);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OutputProbe for FakeProbe {
    async fn probe(&self, path: &Path) -> Result<OutputState, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.paths.lock().unwrap().get(path) {
            None => Ok(OutputState::Missing),
            Some(ProbeScript::Modified(modified)) => Ok(OutputState::Present {
                modified: *modified,
            }),
            Some(ProbeScript::Error) => Err(ProbeError {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "EACCES"),
            }),
        }
    }
}

// ---- Registry ----

/// Mutable in-memory registry that counts loads.
#[derive(Default)]
pub struct FakeRegistry {
    sources: Mutex<SourceMap>,
    broken: Mutex<bool>,
    loads: AtomicUsize,
}

impl FakeRegistry {
    pub fn with(entries: &[(&str, &str)]) -> Arc<Self> {
        let registry = Self::default();
        for (source, url) in entries {
            registry.insert(source, url);
        }
        Arc::new(registry)
    }

    pub fn insert(&self, source: &str, url: &str) {
        self.sources
            .lock()
            .unwrap()
            .insert(id(source), url.to_string());
    }

    pub fn remove(&self, source: &str) {
        self.sources.lock().unwrap().remove(&id(source));
    }

    pub fn set_broken(&self, broken: bool) {
        *self.broken.lock().unwrap() = broken;
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl SourceRegistry for FakeRegistry {
    fn load(&self) -> Result<SourceMap, RegistryError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if *self.broken.lock().unwrap() {
            return Err(RegistryError::InvalidFormat(PathBuf::from("fake.json")));
        }
        Ok(self.sources.lock().unwrap().clone())
    }

    fn describe(&self) -> String {
        "fake registry".to_string()
    }
}
