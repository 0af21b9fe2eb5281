//! The long-running monitor: exclusive per state directory, serving the
//! control socket while the monitor loop runs.

use crate::control::ControlServer;
use crate::error::{Error, Result};
use crate::state::{MonitorRecord, StateStore};
use crate::supervisor::{run_monitor_loop, MonitorOptions, Supervisor, SupervisorActor};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use tokio_util::sync::CancellationToken;

/// Proof that this process is the state directory's only monitor.
///
/// Holds the advisory lock on `monitor.lock` and owns `monitor.json`; both are
/// released on drop.
#[derive(Debug)]
pub struct MonitorGuard {
    store: StateStore,
    _lock: File,
}

impl MonitorGuard {
    pub fn acquire(store: &StateStore) -> Result<Self> {
        let lock_path = store.monitor_lock_path();
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| Error::Filesystem(format!("Failed to open lock file: {}", e)))?;

        if let Err(e) = FileExt::try_lock_exclusive(&file) {
            tracing::debug!("Monitor lock acquisition failed: {}", e);
            let pid = store.read_monitor()?.map(|r| r.pid).unwrap_or(0);
            return Err(Error::MonitorAlreadyRunning { pid });
        }
        if let Err(e) = write_lock_owner(&mut file, std::process::id()) {
            tracing::debug!("Failed to write PID to {}: {}", lock_path.display(), e);
        }

        // a live PID in monitor.json still counts without the lock
        if let Some(existing) = store.read_monitor()? {
            let me = std::process::id();
            if existing.pid != me && pid_alive(existing.pid) {
                return Err(Error::MonitorAlreadyRunning { pid: existing.pid });
            }
            tracing::debug!("Replacing stale monitor record (PID {})", existing.pid);
        }

        store.write_monitor(&MonitorRecord::for_current_process(store.socket_path()))?;
        Ok(Self {
            store: store.clone(),
            _lock: file,
        })
    }
}

impl Drop for MonitorGuard {
    fn drop(&mut self) {
        if let Err(e) = self.store.remove_monitor() {
            tracing::warn!("Failed to remove monitor record: {}", e);
        }
    }
}

/// Replace the lock file's contents with the holder's PID.
fn write_lock_owner(file: &mut File, pid: u32) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{}", pid)?;
    file.flush()
}

fn pid_alive(pid: u32) -> bool {
    match crate::error::validate_pid_for_check(pid) {
        Some(pid) => nix::sys::signal::kill(pid, None).is_ok(),
        None => false,
    }
}

/// Run the monitor until `shutdown` fires.
///
/// Services keep running after the monitor exits; only the monitor's own
/// record and socket are removed.
pub async fn run_monitor(supervisor: Supervisor, shutdown: CancellationToken) -> Result<()> {
    let store = supervisor.store().clone();
    let guard = MonitorGuard::acquire(&store)?;

    let settings = supervisor.settings().clone();
    let (handle, actor_task) = SupervisorActor::spawn(supervisor)?;

    let server = ControlServer::bind(&store.socket_path(), handle.clone())?;
    tracing::info!("Control socket at {}", server.path().display());
    let server_task = tokio::spawn(server.serve(shutdown.child_token()));

    let mut options = MonitorOptions::new(settings.monitor_interval);
    options.backup_interval = settings.backup_interval;
    run_monitor_loop(handle, options, shutdown.clone()).await;

    shutdown.cancel();
    if let Err(e) = server_task.await {
        tracing::debug!("Control server task ended abnormally: {}", e);
    }
    actor_task.abort();
    drop(guard);

    tracing::info!("Monitor stopped; services left running");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_owner_replaces_previous_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("monitor.lock");
        std::fs::write(&path, "1234567\n").unwrap();

        let mut file = OpenOptions::new().write(true).open(&path).unwrap();
        write_lock_owner(&mut file, 42).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "42\n");
    }

    #[test]
    fn acquire_stamps_the_lock_with_this_process() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::open(dir.path().join("state")).unwrap();

        let _guard = MonitorGuard::acquire(&store).unwrap();
        let owner = std::fs::read_to_string(store.monitor_lock_path()).unwrap();
        assert_eq!(owner.trim(), std::process::id().to_string());
    }
}
