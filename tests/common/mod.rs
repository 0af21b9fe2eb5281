//! In-memory backends so supervisor tests never touch real processes or ports.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use svc_supervisor::config::HealthCheck;
use svc_supervisor::healthcheck::HealthChecker;
use svc_supervisor::port::PortReservation;
use svc_supervisor::process::{ProcessBackend, SpawnRequest};
use svc_supervisor::{Error, Registry, Result, Settings, Supervisor};
use tempfile::TempDir;

/// Fake process table. PIDs start at 10_000 and never repeat.
#[derive(Default)]
pub struct MockProcesses {
    inner: Mutex<ProcessTable>,
}

#[derive(Default)]
struct ProcessTable {
    next_pid: u32,
    alive: HashMap<u32, String>,
    spawned: Vec<String>,
    ignore_sigterm: HashSet<String>,
    dies_at_launch: HashSet<String>,
    refuse_spawn: HashSet<String>,
    terminated: Vec<u32>,
    killed: Vec<u32>,
}

impl MockProcesses {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Names in spawn order.
    pub fn spawned(&self) -> Vec<String> {
        self.inner.lock().spawned.clone()
    }

    pub fn spawn_count(&self, name: &str) -> usize {
        self.inner
            .lock()
            .spawned
            .iter()
            .filter(|n| n.as_str() == name)
            .count()
    }

    pub fn ignore_sigterm(&self, name: &str) {
        self.inner.lock().ignore_sigterm.insert(name.to_string());
    }

    /// The process spawns but is gone before the settle window ends.
    pub fn die_at_launch(&self, name: &str) {
        self.inner.lock().dies_at_launch.insert(name.to_string());
    }

    pub fn refuse_spawn(&self, name: &str) {
        self.inner.lock().refuse_spawn.insert(name.to_string());
    }

    /// Simulate the process exiting on its own.
    pub fn crash(&self, pid: u32) {
        self.inner.lock().alive.remove(&pid);
    }

    pub fn killed(&self) -> Vec<u32> {
        self.inner.lock().killed.clone()
    }

    pub fn terminated(&self) -> Vec<u32> {
        self.inner.lock().terminated.clone()
    }
}

#[async_trait]
impl ProcessBackend for MockProcesses {
    async fn spawn(&self, request: &SpawnRequest) -> Result<u32> {
        let mut table = self.inner.lock();
        if table.refuse_spawn.contains(&request.name) {
            return Err(Error::Process(format!(
                "Failed to spawn '{}': no such file",
                request.command
            )));
        }
        table.next_pid += 1;
        let pid = 10_000 + table.next_pid;
        table.spawned.push(request.name.clone());
        if !table.dies_at_launch.contains(&request.name) {
            table.alive.insert(pid, request.name.clone());
        }
        Ok(pid)
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.inner.lock().alive.contains_key(&pid)
    }

    fn terminate(&self, name: &str, pid: u32) -> Result<()> {
        let mut table = self.inner.lock();
        table.terminated.push(pid);
        if !table.ignore_sigterm.contains(name) {
            table.alive.remove(&pid);
        }
        Ok(())
    }

    fn kill(&self, _name: &str, pid: u32) -> Result<()> {
        let mut table = self.inner.lock();
        table.killed.push(pid);
        table.alive.remove(&pid);
        Ok(())
    }
}

/// Health answers keyed by URL. Unknown URLs are healthy.
#[derive(Default)]
pub struct MockHealth {
    answers: Mutex<HashMap<String, bool>>,
    calls: Mutex<u32>,
}

impl MockHealth {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, url: &str, healthy: bool) {
        self.answers.lock().insert(url.to_string(), healthy);
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock()
    }
}

#[async_trait]
impl HealthChecker for MockHealth {
    async fn check(&self, target: &HealthCheck) -> Result<bool> {
        *self.calls.lock() += 1;
        Ok(self.answers.lock().get(&target.url).copied().unwrap_or(true))
    }
}

/// Ports that look occupied until cleared.
#[derive(Default)]
pub struct MockPorts {
    occupied: Mutex<HashSet<u16>>,
    stubborn: Mutex<HashSet<u16>>,
    cleared: Mutex<Vec<u16>>,
}

impl MockPorts {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn occupy(&self, port: u16) {
        self.occupied.lock().insert(port);
    }

    /// Clearing this port always fails.
    pub fn occupy_stubbornly(&self, port: u16) {
        self.occupy(port);
        self.stubborn.lock().insert(port);
    }

    pub fn cleared(&self) -> Vec<u16> {
        self.cleared.lock().clone()
    }
}

#[async_trait]
impl PortReservation for MockPorts {
    fn is_occupied(&self, port: u16) -> bool {
        self.occupied.lock().contains(&port)
    }

    async fn clear(&self, port: u16) -> Result<()> {
        if self.stubborn.lock().contains(&port) {
            return Err(Error::PortConflict {
                port,
                pid: Some(4242),
                process_name: Some("squatter".to_string()),
            });
        }
        self.occupied.lock().remove(&port);
        self.cleared.lock().push(port);
        Ok(())
    }
}

/// Settings tuned for fast tests, rooted in `dir`.
pub fn fast_settings(dir: &TempDir) -> Settings {
    let mut settings = Settings::defaults(dir.path());
    settings.settle_window = Duration::from_millis(0);
    settings.grace_period = Duration::from_millis(50);
    settings.port_clear_wait = Duration::from_millis(1);
    settings.monitor_interval = Duration::from_millis(20);
    settings.failure_threshold = 3;
    settings
}

/// A supervisor over `registry` with every backend mocked.
pub struct Harness {
    pub dir: TempDir,
    pub supervisor: Supervisor,
    pub processes: Arc<MockProcesses>,
    pub health: Arc<MockHealth>,
    pub ports: Arc<MockPorts>,
}

impl Harness {
    pub fn new(registry: impl FnOnce(&TempDir) -> Registry) -> Self {
        Self::with_mocks(registry, MockProcesses::new(), MockHealth::new(), MockPorts::new())
    }

    pub fn with_mocks(
        registry: impl FnOnce(&TempDir) -> Registry,
        processes: Arc<MockProcesses>,
        health: Arc<MockHealth>,
        ports: Arc<MockPorts>,
    ) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let supervisor = Supervisor::builder()
            .registry(registry(&dir))
            .settings(fast_settings(&dir))
            .process_backend(processes.clone())
            .health_checker(health.clone())
            .port_reservation(ports.clone())
            .build()
            .expect("build supervisor");
        Self {
            dir,
            supervisor,
            processes,
            health,
            ports,
        }
    }
}

/// Health check that answers once with no pauses.
pub fn quick_check(url: &str) -> HealthCheck {
    let mut check = HealthCheck::new(url);
    check.retries = 1;
    check.interval = 0;
    check
}
