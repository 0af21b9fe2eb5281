//! Health monitoring and automatic restart.
//!
//! The per-service decision is the pure function [`decide`]; the actor applies
//! it (see [`SupervisorActor`](super::SupervisorActor)), and
//! [`run_monitor_loop`] drives the actor on a timer.

use super::{ProbeResult, Supervisor, SupervisorHandle};
use crate::config::{RestartMode, RestartPolicy};
use crate::error::Result;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What one monitor pass saw for a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Healthy,
    Unhealthy,
    /// No live process. `exit_code` comes from the wrapper's exit file.
    Crashed { exit_code: Option<i32> },
}

/// What the monitor should do about an [`Observation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorAction {
    /// Healthy: clear the failure counter and crash attempts.
    Reset,
    /// Unhealthy, below the threshold (or never restarted): store the new count.
    RecordFailure { failures: u32 },
    /// Unhealthy at the threshold: stop, start, reset the counter.
    Restart,
    /// Crashed and eligible: start again after `delay`.
    Relaunch { delay: Duration },
    /// Crashed and left down: policy `never` or a clean exit under `on-failure`.
    LeaveStopped,
    /// Crashed and out of relaunch attempts.
    GiveUp,
}

/// Decide what to do for one service.
///
/// `failures` is the stored counter before this observation; `crash_attempts`
/// counts relaunches since the service was last seen healthy.
pub fn decide(
    observation: Observation,
    policy: &RestartPolicy,
    threshold: u32,
    failures: u32,
    crash_attempts: u32,
) -> MonitorAction {
    match observation {
        Observation::Healthy => MonitorAction::Reset,
        Observation::Unhealthy => {
            let failures = failures.saturating_add(1);
            if failures >= threshold && policy.restarts() {
                MonitorAction::Restart
            } else {
                MonitorAction::RecordFailure { failures }
            }
        }
        Observation::Crashed { exit_code } => match policy.mode {
            RestartMode::Never => MonitorAction::LeaveStopped,
            RestartMode::OnFailure if exit_code == Some(0) => MonitorAction::LeaveStopped,
            _ if policy.should_relaunch(exit_code, crash_attempts) => MonitorAction::Relaunch {
                delay: policy.retry_delay(),
            },
            _ => MonitorAction::GiveUp,
        },
    }
}

impl Supervisor {
    /// One monitor observation: liveness first, then a single health probe.
    pub async fn observe(&self, name: &str) -> Result<Observation> {
        self.definition(name)?;
        if self.live_record(name)?.is_none() {
            return Ok(Observation::Crashed {
                exit_code: self.store.exit_code(name),
            });
        }
        Ok(match self.probe(name).await? {
            ProbeResult::Healthy => Observation::Healthy,
            ProbeResult::Unhealthy => Observation::Unhealthy,
        })
    }
}

/// Timing for [`run_monitor_loop`].
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub interval: Duration,
    /// Upper bound on the random delay added to each tick.
    pub jitter: Duration,
    /// Periodic state snapshots. `None` disables them.
    pub backup_interval: Option<Duration>,
}

impl MonitorOptions {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            jitter: Duration::from_millis(500),
            backup_interval: None,
        }
    }
}

async fn apply_jitter(max: Duration) {
    use rand::Rng;
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return;
    }
    let jitter_ms = {
        let mut rng = rand::thread_rng();
        rng.gen_range(0..=max_ms)
    };
    tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
}

/// Run monitor passes until `cancel` fires.
///
/// Each pass asks the actor to supervise every tracked service in turn.
/// Crash relaunches wait out their delay in a separate task so one slow
/// relaunch never holds up the others. A panic inside a pass is logged and
/// the loop carries on.
pub async fn run_monitor_loop(
    handle: SupervisorHandle,
    options: MonitorOptions,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(options.interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut relaunching: HashMap<String, JoinHandle<()>> = HashMap::new();
    let mut last_backup = tokio::time::Instant::now();

    tracing::info!("Monitor started, checking every {:?}", options.interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Monitor loop shutting down");
                break;
            }
            _ = interval.tick() => {
                apply_jitter(options.jitter).await;

                let pass = AssertUnwindSafe(monitor_pass(&handle, &cancel, &mut relaunching))
                    .catch_unwind()
                    .await;
                if let Err(panic_info) = pass {
                    let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        s.to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "Unknown panic".to_string()
                    };
                    tracing::error!("Monitor pass panicked: {}. Continuing...", panic_msg);
                }

                if let Some(every) = options.backup_interval {
                    if last_backup.elapsed() >= every {
                        last_backup = tokio::time::Instant::now();
                        match handle.snapshot().await {
                            Ok(path) => tracing::info!("Wrote snapshot {}", path.display()),
                            Err(e) => tracing::warn!("Periodic snapshot failed: {}", e),
                        }
                    }
                }
            }
        }
    }

    for (_, task) in relaunching.drain() {
        task.abort();
    }
}

async fn monitor_pass(
    handle: &SupervisorHandle,
    cancel: &CancellationToken,
    relaunching: &mut HashMap<String, JoinHandle<()>>,
) {
    relaunching.retain(|_, task| !task.is_finished());

    let tracked = match handle.tracked().await {
        Ok(names) => names,
        Err(e) => {
            tracing::error!("Monitor lost the supervisor: {}", e);
            cancel.cancel();
            return;
        }
    };

    for name in tracked {
        if cancel.is_cancelled() {
            return;
        }
        if relaunching.contains_key(&name) {
            continue;
        }

        match handle.supervise(&name).await {
            Ok(MonitorAction::Relaunch { delay }) => {
                tracing::warn!(
                    "Service '{}' is down, relaunching in {:?}",
                    name,
                    delay
                );
                let task = tokio::spawn(delayed_relaunch(
                    handle.clone(),
                    name.clone(),
                    delay,
                    cancel.clone(),
                ));
                relaunching.insert(name, task);
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Monitoring '{}' failed: {}", name, e),
        }
    }
}

async fn delayed_relaunch(
    handle: SupervisorHandle,
    name: String,
    delay: Duration,
    cancel: CancellationToken,
) {
    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = tokio::time::sleep(delay) => {}
    }
    match handle.relaunch(&name).await {
        Ok(Some(outcome)) => tracing::info!("Relaunched '{}': {}", name, outcome),
        Ok(None) => tracing::debug!("Relaunch of '{}' no longer needed", name),
        Err(e) => tracing::error!("Relaunch of '{}' failed: {}", name, e),
    }
}
