use super::{ProbeResult, StartOutcome, StopOutcome, Supervisor};
use crate::error::{Error, Result};
use crate::healthcheck::check_with_retry;
use crate::process::SpawnRequest;
use crate::state::RuntimeRecord;
use std::path::Path;
use std::time::Duration;
use tracing::Instrument;

/// Lines of the service log quoted in a launch failure.
const LAUNCH_FAILURE_TAIL: usize = 10;

/// How long to wait for a SIGKILLed process to disappear.
const KILL_CONFIRM_TIMEOUT: Duration = Duration::from_secs(5);
const KILL_CONFIRM_POLL: Duration = Duration::from_millis(100);

impl Supervisor {
    /// Start one service if it is not running, enabled, and its direct
    /// dependencies are up.
    ///
    /// Every expected refusal is reported through [`StartOutcome`]; `Err` is
    /// reserved for unknown names and state-directory failures.
    pub async fn start(&self, name: &str) -> Result<StartOutcome> {
        async {
            let def = self.definition(name)?;

            if let Some(pid) = self.running_pid(name)? {
                tracing::debug!("Service '{}' already running (PID {})", name, pid);
                return Ok(StartOutcome::AlreadyRunning { pid });
            }

            if !def.enabled {
                tracing::debug!("Service '{}' is disabled, not starting", name);
                return Ok(StartOutcome::Disabled);
            }

            let mut missing = Vec::new();
            for dep in &def.dependencies {
                if !self.registry.contains(dep) || !self.is_running(dep)? {
                    missing.push(dep.clone());
                }
            }
            if !missing.is_empty() {
                tracing::info!(
                    "Service '{}' waiting on dependencies: {}",
                    name,
                    missing.join(", ")
                );
                return Ok(StartOutcome::DependenciesUnready { missing });
            }

            for &port in &def.ports {
                if self.ports.is_occupied(port) {
                    tracing::info!("Port {} for '{}' is occupied, clearing", port, name);
                    if let Err(e) = self.ports.clear(port).await {
                        return Ok(StartOutcome::LaunchFailed {
                            reason: e.to_string(),
                        });
                    }
                }
            }

            self.launch(name).await
        }
        .instrument(tracing::info_span!("start_service", service.name = %name))
        .await
    }

    async fn launch(&self, name: &str) -> Result<StartOutcome> {
        let def = self.definition(name)?;
        self.store.clear_exit_code(name)?;

        let request = SpawnRequest {
            name: name.to_string(),
            command: def.command.clone(),
            working_dir: def.resolve_working_dir(self.registry.base_dir()),
            environment: def.environment.clone(),
            log_path: self.store.log_path(name),
            exit_file: self.store.exit_file_path(name),
        };

        let pid = match self.processes.spawn(&request).await {
            Ok(pid) => pid,
            Err(e) => {
                tracing::error!("Failed to launch '{}': {}", name, e);
                return Ok(StartOutcome::LaunchFailed {
                    reason: e.to_string(),
                });
            }
        };

        let record = RuntimeRecord::new(name, pid, &def.command);
        self.store.write_record(&record)?;
        tracing::info!("Launched '{}' (PID {})", name, pid);

        tokio::time::sleep(self.settings.settle_window).await;
        if !self.processes.is_alive(pid) {
            self.discard_record(name)?;
            let mut reason = format!(
                "process exited within {:?} of launch",
                self.settings.settle_window
            );
            let tail = read_log_tail(&request.log_path, LAUNCH_FAILURE_TAIL);
            if !tail.is_empty() {
                reason.push('\n');
                reason.push_str(&tail.join("\n"));
            }
            tracing::error!("Service '{}' died during startup", name);
            return Ok(StartOutcome::LaunchFailed { reason });
        }

        self.store.reset_failures(name)?;

        let healthy = match &def.health_check {
            Some(check) => {
                let ok = check_with_retry(self.health.as_ref(), check).await;
                if ok {
                    tracing::info!("Service '{}' is healthy", name);
                } else {
                    tracing::warn!(
                        "Service '{}' launched but its health check is not passing",
                        name
                    );
                }
                Some(ok)
            }
            None => None,
        };

        Ok(StartOutcome::Started { pid, healthy })
    }

    /// Stop one service: SIGTERM, wait out the grace period, then SIGKILL.
    ///
    /// `force` skips straight to SIGKILL. The runtime record is only removed
    /// once the process is confirmed gone.
    pub async fn stop(&self, name: &str, force: bool) -> Result<StopOutcome> {
        async {
            let def = self.registry.get(name);
            let record = self.store.read_record(name)?;
            if def.is_none() && record.is_none() {
                return Err(Error::ServiceNotFound(name.to_string()));
            }

            let Some(record) = self.live_record(name)? else {
                if record.is_some() {
                    tracing::debug!("Removing stale record for '{}'", name);
                    self.discard_record(name)?;
                }
                self.store.reset_failures(name)?;
                return Ok(StopOutcome::AlreadyStopped);
            };
            let pid = record.pid;

            let mut forced = force;
            if !force {
                self.processes.terminate(name, pid)?;
                let poll = self
                    .settings
                    .grace_period
                    .clamp(Duration::from_millis(10), Duration::from_secs(1));
                if self.wait_for_exit(pid, self.settings.grace_period, poll).await {
                    tracing::info!("Stopped '{}' (PID {})", name, pid);
                } else {
                    tracing::warn!(
                        "Service '{}' ignored SIGTERM for {:?}, sending SIGKILL",
                        name,
                        self.settings.grace_period
                    );
                    forced = true;
                }
            }

            if forced {
                self.processes.kill(name, pid)?;
                let gone = self
                    .wait_for_exit(pid, KILL_CONFIRM_TIMEOUT, KILL_CONFIRM_POLL)
                    .await;
                if !gone {
                    return Err(Error::StopFailed {
                        name: name.to_string(),
                        reason: format!("PID {} survived SIGKILL", pid),
                    });
                }
                tracing::info!("Killed '{}' (PID {})", name, pid);
            }

            if let Some(def) = def {
                for &port in &def.ports {
                    if self.ports.is_occupied(port) {
                        if let Err(e) = self.ports.clear(port).await {
                            tracing::warn!(
                                "Port {} still held after stopping '{}': {}",
                                port,
                                name,
                                e
                            );
                        }
                    }
                }
            }

            self.discard_record(name)?;
            self.store.reset_failures(name)?;
            Ok(StopOutcome::Stopped { pid, forced })
        }
        .instrument(tracing::info_span!("stop_service", service.name = %name))
        .await
    }

    /// Poll until `pid` is gone or `timeout` passes. Returns whether it exited.
    async fn wait_for_exit(&self, pid: u32, timeout: Duration, poll: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if !self.processes.is_alive(pid) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(poll).await;
        }
    }

    pub async fn restart(&self, name: &str) -> Result<StartOutcome> {
        self.definition(name)?;
        self.stop(name, false).await?;
        self.start(name).await
    }

    /// One health probe, no retries. A service that is not running is unhealthy.
    pub async fn probe(&self, name: &str) -> Result<ProbeResult> {
        let def = self.definition(name)?;
        if !self.is_running(name)? {
            return Ok(ProbeResult::Unhealthy);
        }
        let Some(check) = &def.health_check else {
            return Ok(ProbeResult::Healthy);
        };
        match self.health.check(check).await {
            Ok(true) => Ok(ProbeResult::Healthy),
            Ok(false) => Ok(ProbeResult::Unhealthy),
            Err(e) => {
                tracing::debug!("Health check for '{}' errored: {}", name, e);
                Ok(ProbeResult::Unhealthy)
            }
        }
    }
}

/// The last `lines` lines of a log file. Missing or unreadable logs give nothing.
pub fn read_log_tail(path: &Path, lines: usize) -> Vec<String> {
    let Ok(bytes) = read_tail_bytes(path, lines) else {
        return Vec::new();
    };
    let content = String::from_utf8_lossy(&bytes);
    let all: Vec<&str> = content.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].iter().map(|l| l.to_string()).collect()
}

/// Reads backwards in chunks until the buffer holds more than `lines` newlines.
fn read_tail_bytes(path: &Path, lines: usize) -> std::io::Result<Vec<u8>> {
    use std::io::{Read, Seek, SeekFrom};

    const CHUNK: u64 = 8 * 1024;

    let mut file = std::fs::File::open(path)?;
    let mut pos = file.metadata()?.len();
    let mut buf: Vec<u8> = Vec::new();
    while pos > 0 && buf.iter().filter(|&&b| b == b'\n').count() <= lines {
        let step = CHUNK.min(pos);
        pos -= step;
        file.seek(SeekFrom::Start(pos))?;
        let mut chunk = vec![0u8; step as usize];
        file.read_exact(&mut chunk)?;
        chunk.extend_from_slice(&buf);
        buf = chunk;
    }
    Ok(buf)
}
