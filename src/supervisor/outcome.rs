use crate::config::RestartMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of asking for one service to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum StartOutcome {
    /// Launched and survived the settle window. `healthy` is `None` when the
    /// service declares no health check.
    Started { pid: u32, healthy: Option<bool> },
    AlreadyRunning { pid: u32 },
    Disabled,
    DependenciesUnready { missing: Vec<String> },
    LaunchFailed { reason: String },
}

impl StartOutcome {
    /// The service is up after this outcome.
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            StartOutcome::Started { .. } | StartOutcome::AlreadyRunning { .. }
        )
    }
}

impl fmt::Display for StartOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartOutcome::Started { pid, healthy } => {
                write!(f, "started (PID {})", pid)?;
                match healthy {
                    Some(true) => write!(f, ", healthy"),
                    Some(false) => write!(f, ", health check not passing yet"),
                    None => Ok(()),
                }
            }
            StartOutcome::AlreadyRunning { pid } => write!(f, "already running (PID {})", pid),
            StartOutcome::Disabled => write!(f, "disabled"),
            StartOutcome::DependenciesUnready { missing } => {
                write!(f, "waiting on dependencies: {}", missing.join(", "))
            }
            StartOutcome::LaunchFailed { reason } => write!(f, "launch failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum StopOutcome {
    Stopped { pid: u32, forced: bool },
    AlreadyStopped,
}

impl fmt::Display for StopOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopOutcome::Stopped { pid, forced: false } => write!(f, "stopped (PID {})", pid),
            StopOutcome::Stopped { pid, forced: true } => write!(f, "killed (PID {})", pid),
            StopOutcome::AlreadyStopped => write!(f, "already stopped"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeResult {
    Healthy,
    Unhealthy,
}

/// A service `start_all`/`stop_all` could not handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFailure {
    pub name: String,
    pub reason: String,
}

impl ServiceFailure {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartAllReport {
    /// In launch order. Includes services that were already running.
    pub started: Vec<String>,
    pub failed: Vec<ServiceFailure>,
    /// Disabled services: neither started nor failed.
    pub skipped: Vec<String>,
}

impl StartAllReport {
    pub fn failed_names(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopAllReport {
    /// In stop order; only services that were actually running.
    pub stopped: Vec<String>,
    pub failed: Vec<ServiceFailure>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartAllReport {
    pub stop: StopAllReport,
    pub start: StartAllReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceState {
    Running,
    Stopped,
    /// A record exists but its process is gone.
    Crashed,
    Disabled,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceState::Running => "running",
            ServiceState::Stopped => "stopped",
            ServiceState::Crashed => "crashed",
            ServiceState::Disabled => "disabled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub name: String,
    pub state: ServiceState,
    pub pid: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
    pub failures: u32,
    /// Probe result for running services that declare a health check.
    pub healthy: Option<bool>,
    pub restart: RestartMode,
    /// False for a recorded process whose service left the registry.
    pub registered: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanReport {
    pub records_removed: Vec<String>,
    pub counters_removed: Vec<String>,
    pub monitor_removed: bool,
}

impl CleanReport {
    pub fn is_empty(&self) -> bool {
        self.records_removed.is_empty() && self.counters_removed.is_empty() && !self.monitor_removed
    }
}
