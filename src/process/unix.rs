use super::{process_group, validate_pid_start_time, ProcessBackend, SpawnRequest, SERVICE_NAME_ENV};
use crate::error::{validate_pid, validate_pid_for_check, Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nix::sys::signal::{self, killpg, Signal};
use shell_escape::escape;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::process::Command;

const PID_READ_TIMEOUT: Duration = Duration::from_secs(3);

/// Launches services as detached `nohup` shells in their own process group.
///
/// The outer shell backgrounds a wrapper and exits. The wrapper prints its
/// own PID, redirects output to the service log, runs the command and, when
/// the command returns, writes its exit status next to the runtime record.
/// The recorded PID is the wrapper's, so liveness tracks the command and a
/// group signal reaches every child.
#[derive(Debug, Clone, Default)]
pub struct UnixProcessBackend;

impl UnixProcessBackend {
    pub fn new() -> Self {
        Self
    }

    fn wrapper_script(request: &SpawnRequest) -> String {
        let log = escape_for_single_quotes(&escape(request.log_path.to_string_lossy()));
        let exit_file = escape_for_single_quotes(&escape(request.exit_file.to_string_lossy()));
        // The service command comes in through the environment so it never
        // needs re-quoting. The no-op trap keeps the wrapper alive until the
        // command itself exits; children get default dispositions back on exec.
        format!(
            "nohup bash -c 'echo $$; exec >> {log} 2>&1 < /dev/null; trap : TERM INT; \
             bash -c \"$SVCTL_COMMAND\"; echo $? > {exit_file}' &",
        )
    }

    fn signal_group(&self, name: &str, pid: u32, sig: Signal) -> Result<()> {
        let target = validate_pid(pid, name)?;
        let pgid = process_group(pid).unwrap_or(target);

        // Never signal our own group.
        let own_group = nix::unistd::getpgrp();
        let group_result = if pgid == own_group {
            Err(nix::errno::Errno::EPERM)
        } else {
            killpg(pgid, sig)
        };

        match group_result.or_else(|_| signal::kill(target, sig)) {
            Ok(()) => Ok(()),
            Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(e) => Err(Error::Process(format!(
                "Failed to send {} to '{}' (PID {}): {}",
                sig, name, pid, e
            ))),
        }
    }
}

/// Make a shell-escaped word safe to embed inside a single-quoted script.
fn escape_for_single_quotes(word: &str) -> String {
    word.replace('\'', "'\\''")
}

#[async_trait]
impl ProcessBackend for UnixProcessBackend {
    async fn spawn(&self, request: &SpawnRequest) -> Result<u32> {
        if let Some(parent) = request.log_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tracing::debug!(
            "Spawning '{}' in {:?}: {}",
            request.name,
            request.working_dir,
            request.command
        );

        let mut cmd = Command::new("/bin/bash");
        cmd.arg("-c")
            .arg(Self::wrapper_script(request))
            .current_dir(&request.working_dir)
            .envs(&request.environment)
            .env("SVCTL_COMMAND", &request.command)
            .env(SERVICE_NAME_ENV, &request.name)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(false)
            .process_group(0);

        let mut child = cmd.spawn().map_err(|e| {
            Error::Process(format!(
                "Failed to spawn '{}' in {}: {}",
                request.name,
                request.working_dir.display(),
                e
            ))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Process("Launcher stdout was not captured".to_string()))?;
        let mut reader = tokio::io::BufReader::new(stdout);
        let mut line = String::new();

        let read = tokio::time::timeout(PID_READ_TIMEOUT, reader.read_line(&mut line)).await;
        // the outer shell exits as soon as the wrapper is backgrounded
        let _ = child.wait().await;

        match read {
            Ok(Ok(_)) => line.trim().parse::<u32>().map_err(|_| {
                Error::Process(format!(
                    "Launcher for '{}' printed '{}' instead of a PID",
                    request.name,
                    line.trim()
                ))
            }),
            Ok(Err(e)) => Err(Error::Process(format!(
                "Failed to read PID for '{}': {}",
                request.name, e
            ))),
            Err(_) => Err(Error::Process(format!(
                "Timed out reading PID for '{}'",
                request.name
            ))),
        }
    }

    fn is_alive(&self, pid: u32) -> bool {
        let Some(target) = validate_pid_for_check(pid) else {
            return false;
        };
        if signal::kill(target, None).is_err() {
            return false;
        }
        !is_zombie(pid)
    }

    fn matches_start_time(&self, pid: u32, started_at: DateTime<Utc>) -> bool {
        validate_pid_start_time(pid, started_at)
    }

    #[tracing::instrument(skip(self))]
    fn terminate(&self, name: &str, pid: u32) -> Result<()> {
        self.signal_group(name, pid, Signal::SIGTERM)
    }

    #[tracing::instrument(skip(self))]
    fn kill(&self, name: &str, pid: u32) -> Result<()> {
        self.signal_group(name, pid, Signal::SIGKILL)
    }
}

/// A zombie still answers `kill(pid, 0)` but is not running.
#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    std::fs::read_to_string(format!("/proc/{}/stat", pid))
        .ok()
        .and_then(|stat| {
            let rest = stat.get(stat.rfind(')')? + 2..)?;
            rest.chars().next()
        })
        .is_some_and(|state| state == 'Z')
}

#[cfg(not(target_os = "linux"))]
fn is_zombie(_pid: u32) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn request(dir: &std::path::Path, command: &str) -> SpawnRequest {
        SpawnRequest {
            name: "svc".to_string(),
            command: command.to_string(),
            working_dir: dir.to_path_buf(),
            environment: HashMap::from([("GREETING".to_string(), "hello".to_string())]),
            log_path: dir.join("logs").join("svc.log"),
            exit_file: dir.join("svc.exit"),
        }
    }

    async fn wait_dead(backend: &UnixProcessBackend, pid: u32) -> bool {
        for _ in 0..50 {
            if !backend.is_alive(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        false
    }

    async fn wait_for_log(path: &std::path::Path, needle: &str) -> bool {
        for _ in 0..50 {
            if std::fs::read_to_string(path).is_ok_and(|log| log.contains(needle)) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        false
    }

    #[tokio::test]
    async fn spawn_runs_detached_and_terminates() {
        let dir = tempfile::tempdir().unwrap();
        let backend = UnixProcessBackend::new();

        let pid = backend.spawn(&request(dir.path(), "sleep 30")).await.unwrap();
        assert!(backend.is_alive(pid));
        assert!(backend.matches_start_time(pid, Utc::now()));

        backend.terminate("svc", pid).unwrap();
        assert!(wait_dead(&backend, pid).await);
    }

    #[tokio::test]
    async fn output_goes_to_log_and_exit_code_is_captured() {
        let dir = tempfile::tempdir().unwrap();
        let backend = UnixProcessBackend::new();
        let req = request(dir.path(), "echo \"$GREETING from $SVCTL_SERVICE\"; exit 3");

        let pid = backend.spawn(&req).await.unwrap();
        assert!(wait_dead(&backend, pid).await);
        // give the wrapper a moment to flush the exit file
        tokio::time::sleep(Duration::from_millis(200)).await;

        let log = std::fs::read_to_string(&req.log_path).unwrap();
        assert!(log.contains("hello from svc"));
        let code = std::fs::read_to_string(&req.exit_file).unwrap();
        assert_eq!(code.trim(), "3");
    }

    #[tokio::test]
    async fn kill_stops_a_process_ignoring_sigterm() {
        let dir = tempfile::tempdir().unwrap();
        let backend = UnixProcessBackend::new();
        let req = request(
            dir.path(),
            "trap '' TERM; echo ready; while true; do sleep 1; done",
        );
        let pid = backend.spawn(&req).await.unwrap();
        // SIGTERM before the trap is installed would just kill it
        assert!(wait_for_log(&req.log_path, "ready").await);

        backend.terminate("svc", pid).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(backend.is_alive(pid));

        backend.kill("svc", pid).unwrap();
        assert!(wait_dead(&backend, pid).await);
    }

    #[test]
    fn dead_pid_is_not_alive() {
        let backend = UnixProcessBackend::new();
        assert!(!backend.is_alive(0));
        assert!(!backend.is_alive(u32::MAX - 1));
    }
}
