use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Persisted link between a service name and its OS process.
///
/// Written as `run/<name>.json` right after a launch and removed once the
/// process is confirmed stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeRecord {
    pub name: String,
    pub pid: u32,
    /// Used to detect PID reuse before signalling.
    pub started_at: DateTime<Utc>,
    pub command: String,
}

impl RuntimeRecord {
    pub fn new(name: impl Into<String>, pid: u32, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pid,
            started_at: Utc::now(),
            command: command.into(),
        }
    }

    pub fn uptime(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.started_at)
    }
}

/// The running monitor, written as `monitor.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorRecord {
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub socket: PathBuf,
}

impl MonitorRecord {
    pub fn for_current_process(socket: PathBuf) -> Self {
        Self {
            pid: std::process::id(),
            started_at: Utc::now(),
            socket,
        }
    }
}
