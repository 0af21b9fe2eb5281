//! The supervisor actor: one task, one command queue.
//!
//! Every state-changing request, from the CLI, the control socket or the
//! monitor loop, is a [`SupervisorCommand`] handled to completion before the
//! next one is read. Two restarts of the same service can therefore never
//! interleave.

use super::monitoring::{decide, MonitorAction};
use super::{
    CleanReport, ProbeResult, RestartAllReport, ServiceStatus, StartAllReport, StartOutcome,
    StopAllReport, StopOutcome, Supervisor,
};
use crate::error::{Error, Result};
use futures::FutureExt;
use std::collections::{BTreeSet, HashMap};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const QUEUE_DEPTH: usize = 64;

type Reply<T> = oneshot::Sender<Result<T>>;

#[derive(Debug)]
pub enum SupervisorCommand {
    Start { name: String, reply: Reply<StartOutcome> },
    Stop { name: String, force: bool, reply: Reply<StopOutcome> },
    Restart { name: String, reply: Reply<StartOutcome> },
    StartAll { reply: Reply<StartAllReport> },
    StopAll { reply: Reply<StopAllReport> },
    RestartAll { reply: Reply<RestartAllReport> },
    Status { name: Option<String>, reply: Reply<Vec<ServiceStatus>> },
    Probe { name: String, reply: Reply<ProbeResult> },
    Clean { reply: Reply<CleanReport> },
    Snapshot { reply: Reply<PathBuf> },
    /// Services the monitor watches.
    Tracked { reply: oneshot::Sender<Vec<String>> },
    /// One monitor observation for a service, applied in place.
    Supervise { name: String, reply: Reply<MonitorAction> },
    /// Crash relaunch after the monitor's delay. `None` when no longer needed.
    Relaunch { name: String, reply: Reply<Option<StartOutcome>> },
}

/// Cloneable sender side of the actor.
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    tx: mpsc::Sender<SupervisorCommand>,
}

impl SupervisorHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SupervisorCommand,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| Error::SupervisorUnavailable)?;
        rx.await.map_err(|_| Error::SupervisorUnavailable)
    }

    pub async fn start(&self, name: &str) -> Result<StartOutcome> {
        let name = name.to_string();
        self.request(|reply| SupervisorCommand::Start { name, reply })
            .await?
    }

    pub async fn stop(&self, name: &str, force: bool) -> Result<StopOutcome> {
        let name = name.to_string();
        self.request(|reply| SupervisorCommand::Stop { name, force, reply })
            .await?
    }

    pub async fn restart(&self, name: &str) -> Result<StartOutcome> {
        let name = name.to_string();
        self.request(|reply| SupervisorCommand::Restart { name, reply })
            .await?
    }

    pub async fn start_all(&self) -> Result<StartAllReport> {
        self.request(|reply| SupervisorCommand::StartAll { reply })
            .await?
    }

    pub async fn stop_all(&self) -> Result<StopAllReport> {
        self.request(|reply| SupervisorCommand::StopAll { reply })
            .await?
    }

    pub async fn restart_all(&self) -> Result<RestartAllReport> {
        self.request(|reply| SupervisorCommand::RestartAll { reply })
            .await?
    }

    pub async fn status(&self, name: Option<&str>) -> Result<Vec<ServiceStatus>> {
        let name = name.map(str::to_string);
        self.request(|reply| SupervisorCommand::Status { name, reply })
            .await?
    }

    pub async fn probe(&self, name: &str) -> Result<ProbeResult> {
        let name = name.to_string();
        self.request(|reply| SupervisorCommand::Probe { name, reply })
            .await?
    }

    pub async fn clean(&self) -> Result<CleanReport> {
        self.request(|reply| SupervisorCommand::Clean { reply })
            .await?
    }

    pub async fn snapshot(&self) -> Result<PathBuf> {
        self.request(|reply| SupervisorCommand::Snapshot { reply })
            .await?
    }

    pub async fn tracked(&self) -> Result<Vec<String>> {
        self.request(|reply| SupervisorCommand::Tracked { reply })
            .await
    }

    pub async fn supervise(&self, name: &str) -> Result<MonitorAction> {
        let name = name.to_string();
        self.request(|reply| SupervisorCommand::Supervise { name, reply })
            .await?
    }

    pub async fn relaunch(&self, name: &str) -> Result<Option<StartOutcome>> {
        let name = name.to_string();
        self.request(|reply| SupervisorCommand::Relaunch { name, reply })
            .await?
    }
}

/// Owns the [`Supervisor`] and works through its queue.
pub struct SupervisorActor {
    supervisor: Supervisor,
    rx: mpsc::Receiver<SupervisorCommand>,
    /// Services the monitor is responsible for.
    tracked: BTreeSet<String>,
    /// Crash relaunches since each service was last seen healthy.
    crash_attempts: HashMap<String, u32>,
}

impl SupervisorActor {
    /// Spawn the actor on the current runtime.
    ///
    /// Services with a runtime record at spawn time start out tracked, so a
    /// monitor started after `start-all` watches them.
    pub fn spawn(supervisor: Supervisor) -> Result<(SupervisorHandle, JoinHandle<()>)> {
        let tracked = supervisor
            .store()
            .list_records()?
            .into_iter()
            .map(|r| r.name)
            .filter(|name| supervisor.registry().contains(name))
            .collect();

        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let mut actor = SupervisorActor {
            supervisor,
            rx,
            tracked,
            crash_attempts: HashMap::new(),
        };
        let task = tokio::spawn(async move { actor.run().await });
        Ok((SupervisorHandle { tx }, task))
    }

    async fn run(&mut self) {
        tracing::debug!("Supervisor actor started");

        while let Some(command) = self.rx.recv().await {
            let handled = AssertUnwindSafe(self.handle(command)).catch_unwind().await;
            if let Err(panic_info) = handled {
                let msg = panic_info
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic_info.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "Unknown panic".to_string());
                tracing::error!("Supervisor command panicked: {}", msg);
            }
        }

        tracing::debug!("Supervisor actor stopped");
    }

    async fn handle(&mut self, command: SupervisorCommand) {
        // a dropped receiver just means the caller went away
        match command {
            SupervisorCommand::Start { name, reply } => {
                let result = self.supervisor.start(&name).await;
                if matches!(&result, Ok(outcome) if outcome.is_running()) {
                    self.tracked.insert(name);
                }
                let _ = reply.send(result);
            }
            SupervisorCommand::Stop { name, force, reply } => {
                let result = self.supervisor.stop(&name, force).await;
                if result.is_ok() {
                    self.untrack(&name);
                }
                let _ = reply.send(result);
            }
            SupervisorCommand::Restart { name, reply } => {
                let result = self.supervisor.restart(&name).await;
                self.crash_attempts.remove(&name);
                if matches!(&result, Ok(outcome) if outcome.is_running()) {
                    self.tracked.insert(name);
                }
                let _ = reply.send(result);
            }
            SupervisorCommand::StartAll { reply } => {
                let result = self.supervisor.start_all().await;
                if let Ok(report) = &result {
                    self.tracked.extend(report.started.iter().cloned());
                }
                let _ = reply.send(result);
            }
            SupervisorCommand::StopAll { reply } => {
                let result = self.supervisor.stop_all().await;
                if let Ok(report) = &result {
                    for name in &report.stopped {
                        self.untrack(name);
                    }
                }
                let _ = reply.send(result);
            }
            SupervisorCommand::RestartAll { reply } => {
                let result = self.supervisor.restart_all().await;
                if let Ok(report) = &result {
                    for name in &report.stop.stopped {
                        self.untrack(name);
                    }
                    self.tracked.extend(report.start.started.iter().cloned());
                }
                let _ = reply.send(result);
            }
            SupervisorCommand::Status { name, reply } => {
                let _ = reply.send(self.supervisor.status(name.as_deref()).await);
            }
            SupervisorCommand::Probe { name, reply } => {
                let _ = reply.send(self.supervisor.probe(&name).await);
            }
            SupervisorCommand::Clean { reply } => {
                let _ = reply.send(self.supervisor.clean());
            }
            SupervisorCommand::Snapshot { reply } => {
                let _ = reply.send(self.supervisor.snapshot().await);
            }
            SupervisorCommand::Tracked { reply } => {
                let _ = reply.send(self.tracked.iter().cloned().collect());
            }
            SupervisorCommand::Supervise { name, reply } => {
                let _ = reply.send(self.supervise(&name).await);
            }
            SupervisorCommand::Relaunch { name, reply } => {
                let _ = reply.send(self.relaunch(&name).await);
            }
        }
    }

    fn untrack(&mut self, name: &str) {
        self.tracked.remove(name);
        self.crash_attempts.remove(name);
    }

    async fn supervise(&mut self, name: &str) -> Result<MonitorAction> {
        let Some(def) = self.supervisor.registry().get(name) else {
            self.untrack(name);
            return Err(Error::ServiceNotFound(name.to_string()));
        };
        let policy = def.restart_policy.clone();

        let observation = self.supervisor.observe(name).await?;
        let store = self.supervisor.store();
        let action = decide(
            observation,
            &policy,
            self.supervisor.settings().failure_threshold,
            store.failure_count(name),
            self.crash_attempts.get(name).copied().unwrap_or(0),
        );

        match action {
            MonitorAction::Reset => {
                if store.failure_count(name) > 0 {
                    tracing::info!("Service '{}' recovered", name);
                }
                store.reset_failures(name)?;
                self.crash_attempts.remove(name);
            }
            MonitorAction::RecordFailure { failures } => {
                store.increment_failures(name)?;
                tracing::warn!(
                    "Service '{}' failed its health check ({}/{})",
                    name,
                    failures,
                    self.supervisor.settings().failure_threshold
                );
            }
            MonitorAction::Restart => {
                tracing::warn!(
                    "Service '{}' failed {} consecutive health checks, restarting",
                    name,
                    self.supervisor.settings().failure_threshold
                );
                self.supervisor.stop(name, false).await?;
                let outcome = self.supervisor.start(name).await?;
                self.supervisor.store().reset_failures(name)?;
                tracing::info!("Restarted '{}': {}", name, outcome);
            }
            MonitorAction::Relaunch { .. } => {}
            MonitorAction::LeaveStopped => {
                tracing::info!(
                    "Service '{}' exited and its restart policy is {}, leaving it stopped",
                    name,
                    policy.mode
                );
                self.supervisor.discard_record(name)?;
                self.untrack(name);
            }
            MonitorAction::GiveUp => {
                tracing::error!(
                    "Service '{}' keeps crashing, giving up after {} relaunch(es). Check logs with: svctl logs {}",
                    name,
                    self.crash_attempts.get(name).copied().unwrap_or(0),
                    name
                );
                self.supervisor.discard_record(name)?;
                self.untrack(name);
            }
        }

        Ok(action)
    }

    async fn relaunch(&mut self, name: &str) -> Result<Option<StartOutcome>> {
        if !self.tracked.contains(name) || self.supervisor.is_running(name)? {
            return Ok(None);
        }
        *self.crash_attempts.entry(name.to_string()).or_insert(0) += 1;
        let outcome = self.supervisor.start(name).await?;
        Ok(Some(outcome))
    }
}
